//! Access policy rules and the expression language they are written in.
//!
//! Expressions arrive fully resolved: field references name fields of the
//! model the rule is declared on, or of the related model inside a collection
//! predicate.

use serde::{Deserialize, Serialize};
use std::{fmt, ops::Not};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyOperation {
    Create,
    Read,
    Update,
    PostUpdate,
    Delete,
    /// Shorthand for create, read, update and delete.
    All,
}

impl PolicyOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyOperation::Create => "create",
            PolicyOperation::Read => "read",
            PolicyOperation::Update => "update",
            PolicyOperation::PostUpdate => "post-update",
            PolicyOperation::Delete => "delete",
            PolicyOperation::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let op = match s {
            "create" => PolicyOperation::Create,
            "read" => PolicyOperation::Read,
            "update" => PolicyOperation::Update,
            "post-update" => PolicyOperation::PostUpdate,
            "delete" => PolicyOperation::Delete,
            "all" => PolicyOperation::All,
            _ => return None,
        };

        Some(op)
    }
}

impl fmt::Display for PolicyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Allow,
    Deny,
}

/// One `@@allow` or `@@deny` attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub kind: PolicyKind,
    pub operations: Vec<PolicyOperation>,
    pub condition: Expr,
}

impl PolicyRule {
    pub fn allow(operations: &[PolicyOperation], condition: Expr) -> Self {
        Self {
            kind: PolicyKind::Allow,
            operations: operations.to_vec(),
            condition,
        }
    }

    pub fn deny(operations: &[PolicyOperation], condition: Expr) -> Self {
        Self {
            kind: PolicyKind::Deny,
            operations: operations.to_vec(),
            condition,
        }
    }

    pub fn applies_to(&self, operation: PolicyOperation) -> bool {
        self.operations.iter().any(|op| {
            *op == operation || (*op == PolicyOperation::All && operation != PolicyOperation::PostUpdate)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "in")]
    In,
    /// `rel?[cond]`: some related row matches.
    #[serde(rename = "?")]
    Some,
    /// `rel![cond]`: every related row matches.
    #[serde(rename = "!")]
    Every,
    /// `rel^[cond]`: no related row matches.
    #[serde(rename = "^")]
    None,
}

impl BinaryOp {
    pub fn is_collection_predicate(&self) -> bool {
        matches!(self, BinaryOp::Some | BinaryOp::Every | BinaryOp::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    Literal {
        value: serde_json::Value,
    },
    Array {
        items: Vec<Expr>,
    },
    Field {
        name: String,
    },
    This,
    /// The authenticated principal, `auth()`.
    Auth,
    Member {
        receiver: Box<Expr>,
        member: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

pub fn lit(value: impl Into<serde_json::Value>) -> Expr {
    Expr::Literal { value: value.into() }
}

pub fn null() -> Expr {
    Expr::Literal {
        value: serde_json::Value::Null,
    }
}

pub fn field(name: impl Into<String>) -> Expr {
    Expr::Field { name: name.into() }
}

pub fn auth() -> Expr {
    Expr::Auth
}

pub fn this() -> Expr {
    Expr::This
}

pub fn array(items: Vec<Expr>) -> Expr {
    Expr::Array { items }
}

pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        function: function.into(),
        args,
    }
}

/// `check(relation[, operation])`
pub fn check(relation: &str, operation: Option<PolicyOperation>) -> Expr {
    let mut args = vec![field(relation)];

    if let Some(op) = operation {
        args.push(lit(op.as_str()));
    }

    call("check", args)
}

impl Expr {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn member(self, member: impl Into<String>) -> Expr {
        Expr::Member {
            receiver: Box::new(self),
            member: member.into(),
        }
    }

    pub fn equals(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn not_equals(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Ne, right)
    }

    pub fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn le(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Le, right)
    }

    pub fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn ge(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Ge, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    pub fn is_in(self, right: Expr) -> Expr {
        self.binary(BinaryOp::In, right)
    }

    pub fn some(self, condition: Expr) -> Expr {
        self.binary(BinaryOp::Some, condition)
    }

    pub fn every(self, condition: Expr) -> Expr {
        self.binary(BinaryOp::Every, condition)
    }

    pub fn none(self, condition: Expr) -> Expr {
        self.binary(BinaryOp::None, condition)
    }

    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Expr::Literal { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Expr::Literal { value } if value.is_null())
    }

    /// The member path of a `this.a.b` / `a.b` reference, if the expression is one.
    pub fn field_path(&self) -> Option<Vec<&str>> {
        match self {
            Expr::Field { name } => Some(vec![name.as_str()]),
            Expr::Member { receiver, member } => match receiver.as_ref() {
                Expr::This => Some(vec![member.as_str()]),
                other => {
                    let mut path = other.field_path()?;
                    path.push(member.as_str());
                    Some(path)
                }
            },
            _ => None,
        }
    }

    /// The member path of an `auth().a.b` reference. `auth()` alone is an empty path.
    pub fn auth_path(&self) -> Option<Vec<&str>> {
        match self {
            Expr::Auth => Some(Vec::new()),
            Expr::Member { receiver, member } => {
                let mut path = receiver.auth_path()?;
                path.push(member.as_str());
                Some(path)
            }
            _ => None,
        }
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn all_does_not_cover_post_update() {
        let rule = PolicyRule::allow(&[PolicyOperation::All], lit(true));

        assert!(rule.applies_to(PolicyOperation::Delete));
        assert!(!rule.applies_to(PolicyOperation::PostUpdate));
    }

    #[test]
    fn expressions_deserialize_from_tagged_json() {
        let expr: Expr = serde_json::from_value(json!({
            "kind": "binary",
            "op": "&&",
            "left": { "kind": "unary", "op": "!", "operand": { "kind": "field", "name": "private" } },
            "right": {
                "kind": "binary",
                "op": "==",
                "left": { "kind": "member", "receiver": { "kind": "auth" }, "member": "id" },
                "right": { "kind": "field", "name": "ownerId" }
            }
        }))
        .unwrap();

        let expected = (!field("private")).and(auth().member("id").equals(field("ownerId")));
        assert_eq!(expected, expr);
    }

    #[test]
    fn paths() {
        assert_eq!(Some(vec!["author", "name"]), field("author").member("name").field_path());
        assert_eq!(Some(vec!["x"]), this().member("x").field_path());
        assert_eq!(Some(vec!["role"]), auth().member("role").auth_path());
        assert_eq!(None, auth().member("role").field_path());
    }
}
