//! On-demand population of relation-valued properties.

pub mod loader;
pub mod resolver;

pub use loader::{Loader, LoaderRegistry};
pub use resolver::{LazyResolver, OnLoaded};
