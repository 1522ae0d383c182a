//! Service location and instance deduplication.

pub mod registry;
pub mod services;

pub use registry::{InstanceIdentification, InstanceRegistry};
pub use services::{ScopeCounters, ServiceContainer, ServiceProvider};
