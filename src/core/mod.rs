pub mod context;
pub mod error;
pub mod value;

pub use context::Context;
pub use error::{Capability, DbError, Result, SERIALIZATION_FAILURE};
pub use value::{NamedValue, NamedValueCheck, Value, default_check_named_value};
