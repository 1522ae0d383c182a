/// Lazy loading tests
///
/// Synchronous and background resolution of relation properties.
/// Run with: cargo test --test lazy_load_tests

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracked_persist::lazy::OnLoaded;
use tracked_persist::metadata::RelationKind;
use tracked_persist::tracking::{Entity, ValueSlot};
use tracked_persist::{
    DataType, DbError, EntityGraph, EntityKey, EntityMetadata, EntityState, LazyResolver,
    LoaderRegistry, PropertyMetadata, Value,
};

fn author() -> Arc<EntityMetadata> {
    Arc::new(
        EntityMetadata::new("Author", "authors")
            .with_property(PropertyMetadata::new("id", DataType::Integer).primary_key())
            .with_property(
                PropertyMetadata::relation("books", RelationKind::OneToMany, "Book")
                    .loader("books_by_author"),
            )
            .with_property(PropertyMetadata::relation("agent", RelationKind::ManyToOne, "Agent")),
    )
}

fn resolver_returning(books: Vec<EntityKey>) -> LazyResolver {
    let registry = LoaderRegistry::new();
    registry
        .register(
            "books_by_author",
            move |_: &Entity, _: &PropertyMetadata| -> tracked_persist::Result<ValueSlot> {
                Ok(ValueSlot::of(Value::References(books.clone())))
            },
        )
        .unwrap();
    LazyResolver::new(Arc::new(registry))
}

fn loaded_author(graph: &mut EntityGraph) -> EntityKey {
    let key = graph.track(author());
    graph.load_value(key, "id", Some(Value::Integer(1))).unwrap();
    key
}

#[test]
fn test_load_returns_loader_value() {
    let books = vec![EntityKey::new(), EntityKey::new()];
    let resolver = resolver_returning(books.clone());
    let mut graph = EntityGraph::new();
    let key = loaded_author(&mut graph);

    let slot = resolver.load(graph.entity(key).unwrap(), "books").unwrap();
    assert_eq!(slot.value(), Some(&Value::References(books)));
}

#[test]
fn test_missing_loader_reports_entity_and_property() {
    let resolver = resolver_returning(Vec::new());
    let mut graph = EntityGraph::new();
    let key = loaded_author(&mut graph);

    match resolver.load(graph.entity(key).unwrap(), "agent") {
        Err(DbError::LazyLoadUnavailable { entity, key: entity_key, property }) => {
            assert_eq!(entity, "Author");
            assert_eq!(entity_key, key.to_string());
            assert_eq!(property, "agent");
        }
        other => panic!("expected LazyLoadUnavailable, got {:?}", other),
    }
}

#[test]
fn test_empty_loader_result_is_an_empty_slot() {
    let registry = LoaderRegistry::new();
    registry
        .register(
            "books_by_author",
            |_: &Entity, _: &PropertyMetadata| -> tracked_persist::Result<ValueSlot> {
                Ok(ValueSlot::empty())
            },
        )
        .unwrap();
    let resolver = LazyResolver::new(Arc::new(registry));
    let mut graph = EntityGraph::new();
    let key = loaded_author(&mut graph);

    let slot = resolver.load_into(&mut graph, key, "books").unwrap();
    assert!(slot.is_empty());
    assert_eq!(graph.entity(key).unwrap().state(), EntityState::Unchanged);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_load_invokes_callback() {
    let books = vec![EntityKey::new()];
    let resolver = resolver_returning(books.clone());
    let mut graph = EntityGraph::new();
    let key = loaded_author(&mut graph);
    let graph = graph.into_shared();

    let (tx, rx) = oneshot::channel();
    let on_loaded: OnLoaded = Box::new(move |result| {
        let _ = tx.send(result);
    });
    resolver.async_load(&graph, key, "books", Some(on_loaded)).unwrap();

    let slot = rx.await.unwrap().unwrap();
    assert_eq!(slot.value(), Some(&Value::References(books)));

    // The hook owns the value; the entity is untouched.
    let guard = graph.lock().unwrap();
    assert!(guard.entity(key).unwrap().value("books").is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_load_writes_back_without_callback() {
    let books = vec![EntityKey::new(), EntityKey::new()];
    let resolver = resolver_returning(books.clone());
    let mut graph = EntityGraph::new();
    let key = loaded_author(&mut graph);
    let graph = graph.into_shared();

    resolver.async_load(&graph, key, "books", None).unwrap();

    let mut written = None;
    for _ in 0..200 {
        {
            let guard = graph.lock().unwrap();
            if let Ok(slot) = guard.entity(key).unwrap().value("books") {
                written = slot.value().cloned();
            }
        }
        if written.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(written, Some(Value::References(books)));
    let guard = graph.lock().unwrap();
    let entity = guard.entity(key).unwrap();
    assert_eq!(entity.state(), EntityState::Modified);
    assert!(entity.changes().is_modified("books"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_write_back_notifies_parent() {
    let books = vec![EntityKey::new()];
    let resolver = resolver_returning(books.clone());
    let publisher = Arc::new(
        EntityMetadata::new("Publisher", "publishers")
            .with_property(PropertyMetadata::relation("authors", RelationKind::OneToMany, "Author")),
    );

    let mut graph = EntityGraph::new();
    let key = loaded_author(&mut graph);
    let parent = graph.track(publisher);
    graph.add_to_collection(parent, "authors", key).unwrap();
    graph.accept_all();
    let graph = graph.into_shared();

    resolver.async_load(&graph, key, "books", None).unwrap();

    let mut parent_marked = false;
    for _ in 0..200 {
        {
            let guard = graph.lock().unwrap();
            parent_marked = guard.entity(parent).unwrap().changes().is_modified("authors");
        }
        if parent_marked {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(parent_marked);
    let guard = graph.lock().unwrap();
    assert_eq!(
        guard.entity(key).unwrap().value("books").unwrap().value(),
        Some(&Value::References(books))
    );
}

#[test]
fn test_async_load_fails_fast_without_loader() {
    let resolver = resolver_returning(Vec::new());
    let mut graph = EntityGraph::new();
    let key = loaded_author(&mut graph);
    let graph = graph.into_shared();

    tokio_test::block_on(async {
        let result = resolver.async_load(&graph, key, "agent", None);
        assert!(matches!(result, Err(DbError::LazyLoadUnavailable { .. })));
    });
}
