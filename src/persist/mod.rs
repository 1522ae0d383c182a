//! Typed accessors and the save flow built on the tracking core.

mod macros;
pub mod session;

pub use session::{ChangeWriter, UnitOfWork};
