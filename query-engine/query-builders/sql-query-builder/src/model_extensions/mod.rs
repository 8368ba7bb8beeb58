mod column;
mod relation;
mod table;

pub use self::{column::*, relation::*, table::*};
