//! An abstract syntax tree for SQL queries.
//!
//! The ast module handles everything related to building abstract SQL queries
//! without going into database-level specifics. Everything related to the
//! actual query rendering is in the [visitor](../visitor/index.html) module.
mod column;
mod compare;
mod conditions;
mod conjunctive;
mod delete;
mod expression;
mod function;
mod insert;
mod join;
mod ops;
mod ordering;
mod query;
mod select;
mod table;
mod update;

pub use column::Column;
pub use compare::{exists, not_exists, Comparable, Compare, LikeOptions, ListQuantifier};
pub use conditions::ConditionTree;
pub use conjunctive::Conjunctive;
pub use delete::Delete;
pub use expression::*;
pub use function::*;
pub use insert::{Insert, OnConflict};
pub use join::{Join, JoinData, Joinable};
pub use ops::SqlOp;
pub use ordering::{Order, OrderDefinition, Orderable, Ordering};
pub use query::Query;
pub use select::{DistinctType, Select};
pub use table::{Aliasable, Table, TableType};
pub use update::Update;

pub use bastion_value::Value;
