//! A "prelude" for users of the `bastion-sql` crate.
pub use crate::ast::*;
pub use crate::connector::{
    ConnectionInfo, IsolationLevel, Provider, Queryable, ResultRow, ResultSet, Transaction, TransactionCapable,
};
pub use crate::visitor::Visitor;
