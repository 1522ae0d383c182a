/// Unit of work tests
///
/// Saving a graph through a transaction scope, an ambient database context,
/// or a freshly opened handle.
/// Run with: cargo test --test unit_of_work_tests


use fake_db::{Call, CallLog, FakeDatabase, open};
use std::cell::Cell;
use std::sync::Arc;
use tracked_persist::tracking::PendingChanges;
use tracked_persist::transaction::DEFAULT_INSTANCE;
use tracked_persist::{
    DataType, DatabaseContext, DatabaseHandle, DbError, EntityGraph, EntityMetadata, EntityState,
    IsolationLevel, PropertyMetadata, Result, TransactionScope, UnitOfWork, Value,
};

fn product() -> Arc<EntityMetadata> {
    Arc::new(
        EntityMetadata::new("Product", "products")
            .with_property(PropertyMetadata::new("id", DataType::Integer).primary_key())
            .with_property(PropertyMetadata::new("title", DataType::Text)),
    )
}

fn dirty_graph() -> EntityGraph {
    let mut graph = EntityGraph::new();
    let key = graph.track(product());
    graph.load_value(key, "id", Some(Value::Integer(1))).unwrap();
    graph.set_value(key, "title", Some("Lamp".into())).unwrap();
    graph
}

#[test]
fn test_save_inside_scope_defers_to_scope() {
    let log = CallLog::new();
    let opened = Cell::new(0);
    let unit = UnitOfWork::new("catalog", || {
        opened.set(opened.get() + 1);
        Ok(open(&log, "catalog"))
    });
    let mut graph = dirty_graph();

    let mut scope = TransactionScope::new().unwrap();
    let mut writes = 0;
    let mut writer = |handle: &mut dyn DatabaseHandle, changes: &PendingChanges| -> Result<()> {
        assert!(handle.in_transaction());
        assert_eq!(changes.len(), 1);
        writes += 1;
        Ok(())
    };

    assert_eq!(unit.save_changes(&mut graph, &mut writer).unwrap(), 1);
    assert!(graph.pending_changes().is_empty());

    let mut second = dirty_graph();
    unit.save_changes(&mut second, &mut writer).unwrap();
    assert_eq!(writes, 2);
    assert_eq!(opened.get(), 1);

    // Only the scope's own begin so far.
    let calls = log.calls("catalog");
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::Begin(_)));

    scope.complete().unwrap();
    let calls = log.calls("catalog");
    assert_eq!(&calls[1..], &[Call::Commit, Call::Dispose]);
}

#[test]
fn test_save_inside_context_runs_local_transaction_without_disposing() {
    let log = CallLog::new();
    let _context = DatabaseContext::enter("catalog", open(&log, "ambient"));
    let unit = UnitOfWork::new("catalog", || Ok(open(&log, "fresh")))
        .isolation_level(IsolationLevel::Serializable);
    let mut graph = dirty_graph();

    let mut writer = |_: &mut dyn DatabaseHandle, _: &PendingChanges| -> Result<()> { Ok(()) };
    unit.save_changes(&mut graph, &mut writer).unwrap();

    assert_eq!(
        log.calls("ambient"),
        vec![Call::Begin(IsolationLevel::Serializable), Call::Commit]
    );
    assert!(log.calls("fresh").is_empty());
}

#[test]
fn test_failed_commit_keeps_pending_changes() {
    let log = CallLog::new();
    let unit = UnitOfWork::new("catalog", || {
        Ok(FakeDatabase::new(&log, "catalog").failing_commit().shared())
    });
    let mut graph = dirty_graph();

    let mut writer = |_: &mut dyn DatabaseHandle, _: &PendingChanges| -> Result<()> { Ok(()) };
    match unit.save_changes(&mut graph, &mut writer) {
        Err(DbError::PartialCommit { failed }) => assert_eq!(failed, vec!["catalog".to_string()]),
        other => panic!("expected PartialCommit, got {:?}", other),
    }

    assert_eq!(log.count("catalog", &Call::Rollback), 1);
    assert_eq!(log.count("catalog", &Call::Dispose), 1);
    let pending = graph.pending_changes();
    assert_eq!(pending.with_state(EntityState::Modified).count(), 1);
}

#[test]
fn test_scope_abandon_discards_saved_writes() {
    let log = CallLog::new();
    let unit = UnitOfWork::new(DEFAULT_INSTANCE, || Ok(open(&log, "main")));
    let mut graph = dirty_graph();

    {
        let _scope = TransactionScope::new().unwrap();
        let mut writer = |_: &mut dyn DatabaseHandle, _: &PendingChanges| -> Result<()> { Ok(()) };
        unit.save_changes(&mut graph, &mut writer).unwrap();
    }

    let calls = log.calls("main");
    assert_eq!(&calls[1..], &[Call::Rollback, Call::Dispose]);
}

#[test]
fn test_failed_begin_disposes_opened_handle() {
    let log = CallLog::new();
    let unit = UnitOfWork::new("catalog", || {
        Ok(FakeDatabase::new(&log, "catalog").failing_begin().shared())
    });
    let mut graph = dirty_graph();

    let mut writes = 0;
    let mut writer = |_: &mut dyn DatabaseHandle, _: &PendingChanges| -> Result<()> {
        writes += 1;
        Ok(())
    };
    assert!(matches!(
        unit.save_changes(&mut graph, &mut writer),
        Err(DbError::ExecutionError(_))
    ));

    assert_eq!(writes, 0);
    assert_eq!(log.calls("catalog"), vec![Call::Dispose]);
    assert_eq!(graph.pending_changes().len(), 1);
}

#[test]
fn test_failed_begin_leaves_ambient_handle_open() {
    let log = CallLog::new();
    let _context = DatabaseContext::enter(
        "catalog",
        FakeDatabase::new(&log, "ambient").failing_begin().shared(),
    );
    let unit = UnitOfWork::new("catalog", || Ok(open(&log, "fresh")));
    let mut graph = dirty_graph();

    let mut writer = |_: &mut dyn DatabaseHandle, _: &PendingChanges| -> Result<()> { Ok(()) };
    assert!(unit.save_changes(&mut graph, &mut writer).is_err());

    assert!(log.calls("ambient").is_empty());
    assert!(log.calls("fresh").is_empty());
}
