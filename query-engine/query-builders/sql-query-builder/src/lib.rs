//! Translates validated CRUD arguments into `bastion-sql` query trees and
//! reads the results back into values.
//!
//! Reads are a single statement per operation: related records are nested
//! as JSON by the active [`Dialect`], either through correlated subqueries
//! (SQLite) or lateral joins (PostgreSQL, MySQL).

mod aggregate;
mod alias;
mod context;
mod cursor_condition;
mod dialect;
mod error;
mod filter;
mod model_extensions;
mod ordering;
mod row;
mod select;
mod value;
mod write;

pub use aggregate::{aggregate, group_by, AggregateColumn};
pub use alias::Alias;
pub use context::{ComputedField, ComputedFields, Context};
pub use dialect::{dialect_for, Dialect, LateralDialect, SqliteDialect};
pub use error::{QueryBuilderError, Result};
pub use filter::{escape_like, filter_condition, FilterVisitor};
pub use model_extensions::{field_column, model_table, relation_condition, select_model};
pub use ordering::{order_expression, OrderSpec};
pub use row::{apply_in_memory, read_aggregate_row, read_records, read_scalar_row};
pub use select::{select_records, ReadQuery};
pub use write::{
    create_record, create_records, delete_join_rows, delete_records, id_condition, insert_join_rows,
    limited_condition, split_inherited, update_records,
};

/// Key of the JSON column produced for a nested relation inside a subquery.
pub const JSON_DATA_IDENT: &str = "__bastion_data__";

/// Result column holding the relation counts of a record.
pub const COUNT_KEY: &str = "_count";

/// Prefix of the result keys that carry the fields of a delegate sub-model.
pub const DELEGATE_KEY_PREFIX: &str = "$delegate$";
