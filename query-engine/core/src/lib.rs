//! The CRUD runtime: validates model operations, turns them into SQL and
//! runs them through the plugins of a [`Client`].
//!
//! ```no_run
//! # async fn demo(schema: bastion_schema::Schema) -> Result<(), bastion_core::CrudError> {
//! use bastion_core::Client;
//! use serde_json::json;
//!
//! let client = Client::connect(schema, "sqlite::memory:")?;
//! let user = client.model("User").create(json!({ "data": { "email": "a@b.c" } })).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod crud;
mod error;
mod operation;
mod options;
mod plugin;
mod query_document;
mod request_context;

pub use client::{Client, ModelClient, OperationRequest};
pub use error::{CrudError, ErrorKind, RejectionReason, Violation};
pub use operation::Operation;
pub use options::ClientOptions;
pub use plugin::{CrudNext, CrudRequest, ExpressionFunction, Origin, Plugin, QueryResult, SqlContext, SqlNext};
pub use query_document::{
    AggregateArgs, CountArgs, CountSelection, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs, FindArgs,
    GroupByArgs, ParsedArgs, UpdateArgs, UpdateManyArgs, UpsertArgs, Validator,
};
pub use request_context::request_now;

pub type CrudResult<T> = Result<T, CrudError>;
