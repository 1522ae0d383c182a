pub mod convert;
pub mod error;
pub mod types;
pub mod value;

pub use convert::TrackedValue;
pub use error::{DbError, Result};
pub use types::{EntityKey, IsolationLevel};
pub use value::{DataType, Value};
