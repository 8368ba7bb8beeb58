use bastion_schema::PolicyOperation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A model operation of the client API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    FindUnique,
    FindUniqueOrThrow,
    FindFirst,
    FindFirstOrThrow,
    FindMany,
    Create,
    CreateMany,
    CreateManyAndReturn,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
    Count,
    Aggregate,
    GroupBy,
}

impl Operation {
    pub const ALL: [Operation; 16] = [
        Operation::FindUnique,
        Operation::FindUniqueOrThrow,
        Operation::FindFirst,
        Operation::FindFirstOrThrow,
        Operation::FindMany,
        Operation::Create,
        Operation::CreateMany,
        Operation::CreateManyAndReturn,
        Operation::Update,
        Operation::UpdateMany,
        Operation::Upsert,
        Operation::Delete,
        Operation::DeleteMany,
        Operation::Count,
        Operation::Aggregate,
        Operation::GroupBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FindUnique => "findUnique",
            Operation::FindUniqueOrThrow => "findUniqueOrThrow",
            Operation::FindFirst => "findFirst",
            Operation::FindFirstOrThrow => "findFirstOrThrow",
            Operation::FindMany => "findMany",
            Operation::Create => "create",
            Operation::CreateMany => "createMany",
            Operation::CreateManyAndReturn => "createManyAndReturn",
            Operation::Update => "update",
            Operation::UpdateMany => "updateMany",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
            Operation::DeleteMany => "deleteMany",
            Operation::Count => "count",
            Operation::Aggregate => "aggregate",
            Operation::GroupBy => "groupBy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Operation::FindUnique
                | Operation::FindUniqueOrThrow
                | Operation::FindFirst
                | Operation::FindFirstOrThrow
                | Operation::FindMany
                | Operation::Count
                | Operation::Aggregate
                | Operation::GroupBy
        )
    }

    pub fn is_write(&self) -> bool {
        !self.is_read()
    }

    /// Operations whose `where` must name a unique criterion.
    pub fn requires_unique_filter(&self) -> bool {
        matches!(
            self,
            Operation::FindUnique
                | Operation::FindUniqueOrThrow
                | Operation::Update
                | Operation::Upsert
                | Operation::Delete
        )
    }

    /// The variants that fail with `NotFound` instead of returning null.
    pub fn throws_if_not_found(&self) -> bool {
        matches!(self, Operation::FindUniqueOrThrow | Operation::FindFirstOrThrow)
    }

    /// The access policy operation the call is checked against first.
    pub fn policy_operation(&self) -> PolicyOperation {
        match self {
            Operation::Create | Operation::CreateMany | Operation::CreateManyAndReturn => PolicyOperation::Create,
            Operation::Update | Operation::UpdateMany | Operation::Upsert => PolicyOperation::Update,
            Operation::Delete | Operation::DeleteMany => PolicyOperation::Delete,
            _ => PolicyOperation::Read,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Some(op), Operation::parse(op.as_str()));
        }

        assert_eq!(None, Operation::parse("findAll"));
    }
}
