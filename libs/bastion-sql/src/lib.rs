//! A dialect-neutral SQL abstraction.
//!
//! Queries are built as trees with the types in [`ast`], rendered into SQL and
//! parameters by one of the [`visitor`]s, and executed through the
//! [`connector`] traits. The query tree is owned and `'static` so that it can
//! be handed to interception hooks and rewritten before it reaches the wire.

pub mod ast;
pub mod connector;
pub mod error;
pub mod prelude;
pub mod visitor;
pub mod walk;

pub use bastion_value::Value;
pub use error::{Error, ErrorKind};

pub type Result<T> = std::result::Result<T, error::Error>;
