// ============================================================================
// Context Factory
// ============================================================================
//
// Pooled contexts are built by constructors registered per type at setup.
// Each constructor declares its parameters as a tuple; every element must be
// one of the satisfiable kinds:
//
//   Arc<dyn ServiceProvider>   the provider the pool was created with
//   ContextOptions             the pool's options
//   Service<T>                 a service resolvable from the provider
//
// At construction time the widest constructor whose parameters all resolve
// wins. When none resolves, construction fails permanently.
//
// ============================================================================

use super::config::ContextOptions;
use crate::core::{DbError, Result};
use crate::instance::ServiceProvider;
use std::any::{Any, type_name};
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// What a constructor may draw its parameters from.
pub struct ConstructionContext<'a> {
    pub services: &'a Arc<dyn ServiceProvider>,
    pub options: &'a ContextOptions,
}

/// A constructor parameter kind.
pub trait ResolveParam: Sized {
    fn resolve(cx: &ConstructionContext<'_>) -> Option<Self>;

    fn describe() -> String;
}

impl ResolveParam for Arc<dyn ServiceProvider> {
    fn resolve(cx: &ConstructionContext<'_>) -> Option<Self> {
        Some(cx.services.clone())
    }

    fn describe() -> String {
        "ServiceProvider".to_string()
    }
}

impl ResolveParam for ContextOptions {
    fn resolve(cx: &ConstructionContext<'_>) -> Option<Self> {
        Some(cx.options.clone())
    }

    fn describe() -> String {
        "ContextOptions".to_string()
    }
}

/// A constructor parameter resolved from the service provider.
#[derive(Debug)]
pub struct Service<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Clone for Service<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> Deref for Service<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Any + Send + Sync> ResolveParam for Service<T> {
    fn resolve(cx: &ConstructionContext<'_>) -> Option<Self> {
        cx.services.get::<T>().map(Service)
    }

    fn describe() -> String {
        format!("Service<{}>", type_name::<T>())
    }
}

/// The full parameter list of a constructor.
pub trait ConstructorArgs: Sized {
    const ARITY: usize;

    fn resolve(cx: &ConstructionContext<'_>) -> Option<Self>;

    fn signature() -> String;
}

macro_rules! impl_constructor_args {
    ($arity:expr; $($param:ident),*) => {
        impl<$($param: ResolveParam),*> ConstructorArgs for ($($param,)*) {
            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn resolve(cx: &ConstructionContext<'_>) -> Option<Self> {
                Some(($($param::resolve(cx)?,)*))
            }

            fn signature() -> String {
                let params: Vec<String> = vec![$($param::describe()),*];
                format!("({})", params.join(", "))
            }
        }
    };
}

impl_constructor_args!(0;);
impl_constructor_args!(1; A);
impl_constructor_args!(2; A, B);
impl_constructor_args!(3; A, B, C);
impl_constructor_args!(4; A, B, C, D);

type Build<C> = Box<dyn Fn(&ConstructionContext<'_>) -> Option<Result<C>> + Send + Sync>;

struct Constructor<C> {
    arity: usize,
    signature: String,
    build: Build<C>,
}

/// Registered construction paths for one pooled type.
pub struct ContextFactory<C> {
    constructors: Vec<Constructor<C>>,
}

impl<C: 'static> ContextFactory<C> {
    pub fn new() -> Self {
        Self {
            constructors: Vec::new(),
        }
    }

    /// Registers a constructor taking the tuple `A` of parameter kinds.
    ///
    /// ```ignore
    /// let factory = ContextFactory::new()
    ///     .constructor(|(options,): (ContextOptions,)| Ok(AppContext::new(options)))
    ///     .constructor(|(options, clock): (ContextOptions, Service<Clock>)| {
    ///         Ok(AppContext::with_clock(options, clock))
    ///     });
    /// ```
    pub fn constructor<A, F>(mut self, build: F) -> Self
    where
        A: ConstructorArgs + 'static,
        F: Fn(A) -> Result<C> + Send + Sync + 'static,
    {
        self.constructors.push(Constructor {
            arity: A::ARITY,
            signature: A::signature(),
            build: Box::new(move |cx: &ConstructionContext<'_>| A::resolve(cx).map(&build)),
        });
        // Stable: among equal arities, registration order decides.
        self.constructors.sort_by(|a, b| b.arity.cmp(&a.arity));
        self
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Builds a context with the widest satisfiable constructor.
    pub fn create(&self, cx: &ConstructionContext<'_>) -> Result<C> {
        for constructor in &self.constructors {
            if let Some(result) = (constructor.build)(cx) {
                debug!(
                    context = type_name::<C>(),
                    signature = %constructor.signature,
                    "constructed pooled context"
                );
                return result;
            }
        }

        let tried: Vec<&str> = self
            .constructors
            .iter()
            .map(|constructor| constructor.signature.as_str())
            .collect();
        Err(DbError::ConstructionUnsatisfiable(format!(
            "no constructor of {} can be satisfied (tried: [{}])",
            type_name::<C>(),
            tried.join(", ")
        )))
    }
}

impl<C: 'static> Default for ContextFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}
