//! Typed, schema-checked representations of CRUD arguments.
//!
//! Everything here is produced by argument validation and consumed by the
//! SQL query builder: filters, orderings, pagination, field selections and
//! write arguments.

mod aggregation;
mod default_value;
mod filter;
mod order_by;
mod query_arguments;
mod selection;
mod write_args;

pub mod coerce;

pub use aggregation::*;
pub use coerce::{coerce_element, coerce_field, coerce_scalar, CoercionError};
pub use default_value::generate_default;
pub use filter::*;
pub use order_by::*;
pub use query_arguments::*;
pub use selection::*;
pub use write_args::*;
