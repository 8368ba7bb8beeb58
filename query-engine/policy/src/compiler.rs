//! Compiles policy expressions into SQL conditions over one row.
//!
//! Every expression is compiled against a scope: the model its field
//! references resolve to and the alias its row has in the query. Relation
//! hops (`check()`, collection predicates, member access through to-one
//! relations) open a child scope whose alias extends the parent's with the
//! relation field, so nested subqueries never shadow each other.
//!
//! Parts that do not depend on the row (literals, `auth()`, `now()`) are
//! folded at compile time; a rule that folds to `true` or `false` adds no
//! SQL at all.

use crate::Result;
use bastion_core::{request_now, CrudError, ExpressionFunction};
use bastion_query_structure::{coerce_element, coerce_field};
use bastion_schema::{
    policy::{BinaryOp, UnaryOp},
    Expr, FieldDef, ModelDef, PolicyKind, PolicyOperation, ResolvedRelation, Schema,
};
use bastion_sql::{ast::*, connector::Provider};
use bastion_sql_query_builder::{escape_like, field_column, relation_condition, select_model, Alias, Context};
use bastion_value::Value;
use std::{cmp::Ordering, collections::HashMap};

#[derive(Clone, Copy)]
pub(crate) struct PolicyCompiler<'a> {
    ctx: Context<'a>,
    auth: Option<&'a Value>,
    functions: &'a HashMap<String, ExpressionFunction>,
}

#[derive(Clone)]
struct Scope<'a> {
    model: &'a ModelDef,
    alias: Alias,
    /// The operation whose rules are being compiled, the default of `check()`.
    operation: PolicyOperation,
}

/// An expression compiled as far as the row allows.
enum Operand<'a> {
    Constant(Value),
    /// A path into `auth()` with nothing at its end, or `auth()` itself for
    /// anonymous access. It equals `null` and fails every other comparison.
    Missing,
    /// A value read from the row, typed by the field it comes from.
    Sql(Expression, Option<&'a FieldDef>),
    Condition(ConditionTree),
    /// A relation field of the row aliased as given.
    Relation(ResolvedRelation<'a>, Alias),
    /// `this`
    Row(&'a ModelDef, Alias),
}

impl<'a> PolicyCompiler<'a> {
    pub(crate) fn new(
        ctx: Context<'a>,
        auth: Option<&'a Value>,
        functions: &'a HashMap<String, ExpressionFunction>,
    ) -> Self {
        Self { ctx, auth, functions }
    }

    pub(crate) fn context(&self) -> &Context<'a> {
        &self.ctx
    }

    pub(crate) fn schema(&self) -> &'a Schema {
        self.ctx.schema
    }

    /// The condition under which `operation` is allowed on the row of
    /// `model` aliased `alias`:
    ///
    /// ```text
    /// (allow1 OR allow2 ..) AND NOT (deny1 OR deny2 ..)
    /// ```
    ///
    /// Without an allow rule the operation is denied, except for
    /// `post-update` whose rules only ever restrict.
    pub(crate) fn policy(&self, model: &'a ModelDef, operation: PolicyOperation, alias: &Alias) -> Result<ConditionTree> {
        let scope = Scope {
            model,
            alias: alias.clone(),
            operation,
        };

        let mut allow = ConditionTree::NegativeCondition;
        let mut deny = ConditionTree::NegativeCondition;
        let mut has_allow = false;

        for rule in model.rules_for(operation) {
            let condition = self.condition(&scope, &rule.condition)?;

            match rule.kind {
                PolicyKind::Allow => {
                    has_allow = true;
                    allow = allow.or_with(condition);
                }
                PolicyKind::Deny => deny = deny.or_with(condition),
            }
        }

        if operation == PolicyOperation::PostUpdate && !has_allow {
            allow = ConditionTree::NoCondition;
        }

        Ok(allow.and_with(not_true(deny)))
    }

    fn condition(&self, scope: &Scope<'a>, expr: &Expr) -> Result<ConditionTree> {
        let operand = self.operand(scope, expr)?;
        self.as_condition(operand)
    }

    fn as_condition(&self, operand: Operand<'a>) -> Result<ConditionTree> {
        match operand {
            Operand::Condition(condition) => Ok(condition),
            Operand::Constant(Value::Boolean(true)) => Ok(ConditionTree::NoCondition),
            Operand::Constant(Value::Boolean(false) | Value::Null) | Operand::Missing => {
                Ok(ConditionTree::NegativeCondition)
            }
            Operand::Constant(other) => Err(CrudError::internal(format!(
                "policy expression is a {}, expected a boolean",
                other.type_name()
            ))),
            Operand::Sql(expr, Some(field)) => Ok(expr.equals(self.typed(field, Value::Boolean(true))).into()),
            Operand::Sql(expr, None) => Ok(ConditionTree::single(expr)),
            Operand::Relation(rel, _) => Err(CrudError::internal(format!(
                "relation `{}.{}` used as a condition",
                rel.source.name, rel.field.name
            ))),
            Operand::Row(model, _) => Err(CrudError::internal(format!("`{}` row used as a condition", model.name))),
        }
    }

    fn as_expression(&self, operand: Operand<'a>) -> Result<Expression> {
        match operand {
            Operand::Constant(value) => Ok(val(value)),
            Operand::Missing => Ok(val(Value::Null)),
            Operand::Sql(expr, _) => Ok(expr),
            Operand::Condition(condition) => Ok(Expression::from(condition)),
            Operand::Relation(..) | Operand::Row(..) => {
                Err(CrudError::internal("relations cannot be passed to policy functions"))
            }
        }
    }

    fn operand(&self, scope: &Scope<'a>, expr: &Expr) -> Result<Operand<'a>> {
        match expr {
            Expr::Literal { value } => Ok(Operand::Constant(Value::from_untyped_json(value.clone()))),
            Expr::Array { items } => {
                let values = items
                    .iter()
                    .map(|item| match self.operand(scope, item)? {
                        Operand::Constant(value) => Ok(value),
                        Operand::Missing => Ok(Value::Null),
                        _ => Err(CrudError::internal("array items in policies must be constants")),
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(Operand::Constant(Value::List(values)))
            }
            Expr::This => Ok(Operand::Row(scope.model, scope.alias.clone())),
            Expr::Auth => Ok(self.auth_value(&[])),
            Expr::Field { .. } | Expr::Member { .. } => {
                if let Some(path) = expr.auth_path() {
                    return Ok(self.auth_value(&path));
                }

                match expr.field_path() {
                    Some(path) => self.field_path(scope, &path),
                    None => Err(CrudError::internal("member access on an unsupported expression")),
                }
            }
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => Ok(Operand::Condition(self.condition(scope, operand)?.negate())),
            Expr::Binary { op, left, right } => self.binary(scope, *op, left, right),
            Expr::Call { function, args } => self.call(scope, function, args),
        }
    }

    fn auth_value(&self, path: &[&str]) -> Operand<'a> {
        let Some(mut current) = self.auth else {
            return Operand::Missing;
        };

        for segment in path {
            match current.get(segment) {
                Some(value) => current = value,
                None => return Operand::Missing,
            }
        }

        match current {
            Value::Null => Operand::Missing,
            value => Operand::Constant(value.clone()),
        }
    }

    /// `a`, `a.b.c`: scalar fields of the row, or reached through to-one
    /// relations with a scalar subquery per hop.
    fn field_path(&self, scope: &Scope<'a>, path: &[&str]) -> Result<Operand<'a>> {
        let Some((first, rest)) = path.split_first() else {
            return Err(CrudError::internal("empty field path in policy"));
        };

        let field = scope.model.field(first)?;

        if !field.is_relation() {
            if !rest.is_empty() {
                return Err(CrudError::internal(format!(
                    "`{}.{first}` is not a relation",
                    scope.model.name
                )));
            }

            return Ok(Operand::Sql(self.field_value(scope, field)?, Some(field)));
        }

        let rel = self.ctx.relation(scope.model, first)?;

        if rest.is_empty() {
            return Ok(Operand::Relation(rel, scope.alias.clone()));
        }

        if rel.is_to_many() {
            return Err(CrudError::internal(format!(
                "`{}.{first}` is a to-many relation and needs a collection predicate",
                scope.model.name
            )));
        }

        let inner = self.child_scope(scope, &rel, scope.operation);

        match self.field_path(&inner, rest)? {
            Operand::Sql(expr, field) => {
                let select = self.related_select(&rel, &scope.alias, &inner.alias)?.value(expr).limit(1);
                Ok(Operand::Sql(Expression::from(select), field))
            }
            _ => Err(CrudError::internal(format!(
                "`{}` ends in a relation reached through another relation",
                path.join(".")
            ))),
        }
    }

    fn field_value(&self, scope: &Scope<'a>, field: &FieldDef) -> Result<Expression> {
        if !field.computed {
            return Ok(field_column(scope.model, field, &scope.alias).into());
        }

        self.ctx
            .computed
            .get(&scope.model.name, &field.name)
            .map(|compute| compute(scope.alias.as_str()))
            .ok_or_else(|| {
                CrudError::internal(format!(
                    "computed field `{}.{}` has no implementation",
                    scope.model.name, field.name
                ))
            })
    }

    fn child_scope(&self, scope: &Scope<'a>, rel: &ResolvedRelation<'a>, operation: PolicyOperation) -> Scope<'a> {
        Scope {
            model: rel.target,
            alias: scope.alias.child(&rel.field.name),
            operation,
        }
    }

    /// `SELECT .. FROM Target AS child WHERE <related to parent>`
    fn related_select(&self, rel: &ResolvedRelation<'a>, parent: &Alias, child: &Alias) -> Result<Select> {
        let select = select_model(&self.ctx, rel.target, child)?;
        Ok(select.so_that(relation_condition(rel, parent, child)?))
    }

    fn binary(&self, scope: &Scope<'a>, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Operand<'a>> {
        match op {
            BinaryOp::And => {
                let left = self.condition(scope, left)?;
                Ok(Operand::Condition(left.and_with(self.condition(scope, right)?)))
            }
            BinaryOp::Or => {
                let left = self.condition(scope, left)?;
                Ok(Operand::Condition(left.or_with(self.condition(scope, right)?)))
            }
            BinaryOp::Some | BinaryOp::Every | BinaryOp::None => self.collection(scope, op, left, right),
            BinaryOp::In => {
                let left = self.operand(scope, left)?;
                let right = self.operand(scope, right)?;
                self.membership(left, right)
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let left = self.operand(scope, left)?;
                let right = self.operand(scope, right)?;
                self.compare(op, left, right)
            }
        }
    }

    fn compare(&self, op: BinaryOp, left: Operand<'a>, right: Operand<'a>) -> Result<Operand<'a>> {
        use Operand::*;

        let outcome = match (left, right) {
            (Missing, Missing) | (Missing, Constant(Value::Null)) | (Constant(Value::Null), Missing) => {
                Constant(Value::Boolean(op == BinaryOp::Eq))
            }
            (Missing, _) | (_, Missing) => Constant(Value::Boolean(false)),
            (Constant(a), Constant(b)) => Constant(Value::Boolean(fold_comparison(op, &a, &b))),
            (Sql(expr, field), Constant(value)) => Condition(self.compare_sql(op, expr, field, value)),
            (Constant(value), Sql(expr, field)) => Condition(self.compare_sql(flipped(op), expr, field, value)),
            (Sql(left, _), Sql(right, _)) => Condition(sql_comparison(op, left, right)),
            (Relation(rel, alias), Constant(value)) | (Constant(value), Relation(rel, alias)) => {
                Condition(self.compare_relation(op, &rel, &alias, &value)?)
            }
            (Row(model, alias), Constant(value)) | (Constant(value), Row(model, alias)) => {
                let same = self.identity(model, &alias, &value);

                Condition(match op {
                    BinaryOp::Eq => same,
                    BinaryOp::Ne => same.negate(),
                    _ => return Err(CrudError::internal("rows can only be compared for equality")),
                })
            }
            (Condition(condition), Constant(Value::Boolean(b))) | (Constant(Value::Boolean(b)), Condition(condition)) => {
                match op {
                    BinaryOp::Eq => Condition(condition.invert_if(!b)),
                    BinaryOp::Ne => Condition(condition.invert_if(b)),
                    _ => return Err(CrudError::internal("conditions can only be compared for equality")),
                }
            }
            _ => return Err(CrudError::internal("unsupported comparison in policy expression")),
        };

        Ok(outcome)
    }

    fn compare_sql(&self, op: BinaryOp, expr: Expression, field: Option<&FieldDef>, value: Value) -> ConditionTree {
        if Value::is_null(&value) {
            return match op {
                BinaryOp::Eq => expr.is_null().into(),
                BinaryOp::Ne => expr.is_not_null().into(),
                _ => ConditionTree::NegativeCondition,
            };
        }

        let comparison = match field {
            Some(field) => {
                let comparable = |e: Expression| self.ctx.dialect.comparable_expression(self.ctx.schema, field, e);
                sql_comparison(op, comparable(expr.clone()), comparable(self.typed(field, value)))
            }
            None => sql_comparison(op, expr.clone(), val(value)),
        };

        // A null column differs from every value.
        match (op, field) {
            (BinaryOp::Ne, Some(field)) if field.optional => comparison.or_with(expr.is_null().into()),
            _ => comparison,
        }
    }

    /// `author == auth()`, `author == null`
    fn compare_relation(
        &self,
        op: BinaryOp,
        rel: &ResolvedRelation<'a>,
        parent: &Alias,
        value: &Value,
    ) -> Result<ConditionTree> {
        if rel.is_to_many() {
            return Err(CrudError::internal(format!(
                "to-many relation `{}.{}` compared to a value",
                rel.source.name, rel.field.name
            )));
        }

        let child = parent.child(&rel.field.name);
        let related = self.related_select(rel, parent, &child)?;

        let matching = match value {
            Value::Null => related,
            value => related.and_where(self.identity(rel.target, &child, value)),
        };

        let exists: ConditionTree = exists(matching.value(raw("1"))).into();

        match (op, value.is_null()) {
            (BinaryOp::Eq, false) | (BinaryOp::Ne, true) => Ok(exists),
            (BinaryOp::Eq, true) | (BinaryOp::Ne, false) => Ok(exists.negate()),
            _ => Err(CrudError::internal("relations can only be compared for equality")),
        }
    }

    /// The row of `model` aliased `alias` is the record `value`, compared by id.
    fn identity(&self, model: &ModelDef, alias: &Alias, value: &Value) -> ConditionTree {
        let mut conditions = Vec::with_capacity(model.id_fields.len());

        for name in model.id_fields.iter() {
            let (Some(field), Some(id)) = (model.find_field(name), value.get(name)) else {
                return ConditionTree::NegativeCondition;
            };

            if id.is_null() {
                return ConditionTree::NegativeCondition;
            }

            conditions.push(field_column(model, field, alias).equals(self.typed(field, id.clone())));
        }

        if conditions.is_empty() {
            return ConditionTree::NegativeCondition;
        }

        ConditionTree::and(conditions)
    }

    fn membership(&self, left: Operand<'a>, right: Operand<'a>) -> Result<Operand<'a>> {
        use Operand::*;

        let outcome = match (left, right) {
            (Missing, _) | (_, Missing) | (_, Constant(Value::Null)) => Constant(Value::Boolean(false)),
            (Constant(value), Constant(Value::List(items))) => {
                Constant(Value::Boolean(items.iter().any(|item| constant_eq(&value, item))))
            }
            (Sql(expr, field), Constant(Value::List(items))) => {
                let values: Vec<Expression> = items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .map(|item| match field {
                        Some(field) => self.typed(field, item),
                        None => val(item),
                    })
                    .collect();

                match values.is_empty() {
                    true => Condition(ConditionTree::NegativeCondition),
                    false => Condition(expr.in_selection(row(values)).into()),
                }
            }
            (Constant(value), Sql(expr, Some(field))) if field.array => match value {
                Value::Null => Condition(ConditionTree::NegativeCondition),
                value => Condition(expr.list_has(vec![self.element(field, value)], ListQuantifier::Some).into()),
            },
            _ => return Err(CrudError::internal("`in` needs a list on its right side")),
        };

        Ok(outcome)
    }

    /// `posts?[published]`, `posts![published]`, `posts^[published]`
    fn collection(&self, scope: &Scope<'a>, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Operand<'a>> {
        let name = match left.field_path().as_deref() {
            Some([name]) => name.to_string(),
            _ => {
                return Err(CrudError::internal(
                    "collection predicates apply to a relation field of the row",
                ))
            }
        };

        let rel = self.ctx.relation(scope.model, &name)?;
        let inner = self.child_scope(scope, &rel, scope.operation);
        let condition = self.condition(&inner, right)?;
        let related = self.related_select(&rel, &scope.alias, &inner.alias)?.value(raw("1"));

        let tree: ConditionTree = match op {
            BinaryOp::Some => exists(related.and_where(condition)).into(),
            BinaryOp::Every => not_exists(related.and_where(not_true(condition))).into(),
            _ => not_exists(related.and_where(condition)).into(),
        };

        Ok(Operand::Condition(tree))
    }

    fn call(&self, scope: &Scope<'a>, function: &str, args: &[Expr]) -> Result<Operand<'a>> {
        match function {
            "check" => self.check(scope, args),
            "now" => Ok(Operand::Constant(Value::DateTime(request_now()))),
            "currentModel" => Ok(Operand::Constant(Value::String(scope.model.name.clone()))),
            "currentOperation" => Ok(Operand::Constant(Value::String(scope.operation.as_str().to_owned()))),
            "contains" | "startsWith" | "endsWith" => self.text_search(scope, function, args),
            "has" | "hasSome" | "hasEvery" | "isEmpty" => self.list_predicate(scope, function, args),
            name => {
                let Some(implementation) = self.functions.get(name) else {
                    return Err(CrudError::internal(format!("unknown policy function `{name}`")));
                };

                let args = args
                    .iter()
                    .map(|arg| self.operand(scope, arg).and_then(|operand| self.as_expression(operand)))
                    .collect::<Result<Vec<_>>>()?;

                Ok(Operand::Sql(implementation(args)?, None))
            }
        }
    }

    /// `check(author)`, `check(author, 'update')`, `check(post.author)`: the
    /// related row exists and passes its own policy for the operation.
    fn check(&self, scope: &Scope<'a>, args: &[Expr]) -> Result<Operand<'a>> {
        let path = args
            .first()
            .and_then(Expr::field_path)
            .ok_or_else(|| CrudError::internal("`check` takes a relation field"))?;

        let operation = match args.get(1) {
            Some(arg) => arg
                .as_literal()
                .and_then(|value| value.as_str())
                .and_then(PolicyOperation::parse)
                .ok_or_else(|| CrudError::internal("`check` takes an operation name as its second argument"))?,
            None => scope.operation,
        };

        Ok(Operand::Condition(self.check_path(scope, &path, operation)?))
    }

    fn check_path(&self, scope: &Scope<'a>, path: &[&str], operation: PolicyOperation) -> Result<ConditionTree> {
        let Some((first, rest)) = path.split_first() else {
            return Err(CrudError::internal("`check` takes a relation field"));
        };

        let rel = self.ctx.relation(scope.model, first)?;
        let inner = self.child_scope(scope, &rel, operation);

        let condition = match rest {
            [] => self.policy(rel.target, operation, &inner.alias)?,
            rest => self.check_path(&inner, rest, operation)?,
        };

        if condition.is_negative() {
            return Ok(condition);
        }

        let related = self.related_select(&rel, &scope.alias, &inner.alias)?.value(raw("1"));

        Ok(exists(related.and_where(condition)).into())
    }

    /// `contains(field, search[, caseInsensitive])` and its siblings.
    fn text_search(&self, scope: &Scope<'a>, function: &str, args: &[Expr]) -> Result<Operand<'a>> {
        let (target, search) = match args {
            [target, search] | [target, search, _] => (target, search),
            _ => return Err(CrudError::internal(format!("`{function}` takes two or three arguments"))),
        };

        let insensitive = match args.get(2).map(|arg| self.operand(scope, arg)).transpose()? {
            None => false,
            Some(Operand::Constant(Value::Boolean(b))) => b,
            Some(_) => {
                return Err(CrudError::internal(format!(
                    "the third argument of `{function}` must be a boolean literal"
                )))
            }
        };

        let target = self.operand(scope, target)?;
        let search = self.operand(scope, search)?;

        let outcome = match (target, search) {
            (Operand::Missing, _) | (_, Operand::Missing) => Operand::Constant(Value::Boolean(false)),
            (Operand::Constant(Value::Null), _) | (_, Operand::Constant(Value::Null)) => {
                Operand::Constant(Value::Boolean(false))
            }
            (Operand::Constant(target), Operand::Constant(search)) => {
                let (Some(target), Some(search)) = (target.as_str(), search.as_str()) else {
                    return Err(CrudError::internal(format!("`{function}` compares strings")));
                };

                let (target, search) = match insensitive {
                    true => (target.to_lowercase(), search.to_lowercase()),
                    false => (target.to_owned(), search.to_owned()),
                };

                let found = match function {
                    "contains" => target.contains(&search),
                    "startsWith" => target.starts_with(&search),
                    _ => target.ends_with(&search),
                };

                Operand::Constant(Value::Boolean(found))
            }
            (Operand::Sql(expr, _), Operand::Constant(Value::String(search))) => {
                let escaped = escape_like(&search);

                let pattern = match function {
                    "contains" => format!("%{escaped}%"),
                    "startsWith" => format!("{escaped}%"),
                    _ => format!("%{escaped}"),
                };

                let options = LikeOptions {
                    insensitive,
                    negated: false,
                };

                Operand::Condition(expr.like(val(pattern), options).into())
            }
            (target, search) => {
                let mut target = self.as_expression(target)?;
                let mut search = self.as_expression(search)?;

                if insensitive {
                    target = lower(target).into();
                    search = lower(search).into();
                }

                Operand::Condition(self.position_match(function, target, search))
            }
        };

        Ok(outcome)
    }

    /// Substring tests against a search value read from the database, which
    /// cannot be escaped into a `LIKE` pattern.
    fn position_match(&self, function: &str, target: Expression, search: Expression) -> ConditionTree {
        let provider = self.ctx.provider();

        if function == "endsWith" {
            let tail: Expression = match provider {
                Provider::Sqlite => generic_function(
                    "substr",
                    vec![target, SqlOp::sub(val(Value::Int(0)), generic_function("length", vec![search.clone()])).into()],
                )
                .into(),
                _ => generic_function(
                    "RIGHT",
                    vec![target, generic_function("CHAR_LENGTH", vec![search.clone()]).into()],
                )
                .into(),
            };

            return tail.equals(search).into();
        }

        let position: Expression = match provider {
            Provider::Sqlite => generic_function("instr", vec![target, search]).into(),
            Provider::Postgres => generic_function("strpos", vec![target, search]).into(),
            Provider::Mysql => generic_function("LOCATE", vec![search, target]).into(),
        };

        match function {
            "startsWith" => position.equals(val(Value::Int(1))).into(),
            _ => position.greater_than(val(Value::Int(0))).into(),
        }
    }

    /// `has(list, v)`, `hasSome(list, [..])`, `hasEvery(list, [..])`, `isEmpty(list)`
    fn list_predicate(&self, scope: &Scope<'a>, function: &str, args: &[Expr]) -> Result<Operand<'a>> {
        let list = match args.first() {
            Some(list) => self.operand(scope, list)?,
            None => return Err(CrudError::internal(format!("`{function}` takes a list"))),
        };

        if function == "isEmpty" {
            return Ok(match list {
                Operand::Sql(expr, _) => Operand::Condition(expr.list_is_empty(true).into()),
                Operand::Constant(Value::List(items)) => Operand::Constant(Value::Boolean(items.is_empty())),
                _ => Operand::Constant(Value::Boolean(false)),
            });
        }

        let operand = match args.get(1) {
            Some(arg) => self.operand(scope, arg)?,
            None => return Err(CrudError::internal(format!("`{function}` takes two arguments"))),
        };

        let outcome = match (list, operand) {
            (Operand::Missing, _) | (_, Operand::Missing) => Operand::Constant(Value::Boolean(false)),
            (Operand::Constant(Value::Null), _) | (_, Operand::Constant(Value::Null)) => {
                Operand::Constant(Value::Boolean(false))
            }
            (Operand::Constant(Value::List(items)), Operand::Constant(operand)) => {
                let contains = |value: &Value| items.iter().any(|item| constant_eq(item, value));

                let found = match (function, operand) {
                    ("has", value) => contains(&value),
                    ("hasSome", Value::List(values)) => values.iter().any(contains),
                    ("hasEvery", Value::List(values)) => values.iter().all(contains),
                    _ => return Err(CrudError::internal(format!("`{function}` takes a list of values"))),
                };

                Operand::Constant(Value::Boolean(found))
            }
            (Operand::Constant(list), Operand::Sql(expr, field)) if function == "has" => {
                return self.membership(Operand::Sql(expr, field), Operand::Constant(list));
            }
            (Operand::Sql(expr, Some(field)), Operand::Constant(operand)) if field.array => {
                let (values, quantifier) = match (function, operand) {
                    ("has", value) => (vec![value], ListQuantifier::Some),
                    ("hasSome", Value::List(values)) => (values, ListQuantifier::Some),
                    ("hasEvery", Value::List(values)) => (values, ListQuantifier::Every),
                    _ => return Err(CrudError::internal(format!("`{function}` takes a list of values"))),
                };

                match (values.is_empty(), quantifier) {
                    (true, ListQuantifier::Some) => Operand::Constant(Value::Boolean(false)),
                    (true, ListQuantifier::Every) => Operand::Constant(Value::Boolean(true)),
                    (false, quantifier) => {
                        let values = values.into_iter().map(|v| self.element(field, v)).collect();
                        Operand::Condition(expr.list_has(values, quantifier).into())
                    }
                }
            }
            _ => return Err(CrudError::internal(format!("`{function}` applies to list fields"))),
        };

        Ok(outcome)
    }

    /// A constant as a parameter in the stored form of `field`.
    fn typed(&self, field: &FieldDef, value: Value) -> Expression {
        let coerced = coerce_field(self.ctx.schema, field, &value.to_json()).unwrap_or(value);
        val(self.ctx.dialect.transform_primitive(coerced, field))
    }

    fn element(&self, field: &FieldDef, value: Value) -> Expression {
        let coerced = coerce_element(self.ctx.schema, field, &value.to_json()).unwrap_or(value);
        val(self.ctx.dialect.transform_element(coerced, field))
    }
}

/// `NOT condition`, where a condition evaluating to `NULL` counts as false.
fn not_true(condition: ConditionTree) -> ConditionTree {
    match condition {
        ConditionTree::NoCondition => ConditionTree::NegativeCondition,
        ConditionTree::NegativeCondition => ConditionTree::NoCondition,
        condition => {
            let definite: Expression = coalesce(vec![Expression::from(condition), sql_false()]).into();
            ConditionTree::not(definite)
        }
    }
}

fn flipped(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

fn sql_comparison(op: BinaryOp, left: Expression, right: Expression) -> ConditionTree {
    let compare = match op {
        BinaryOp::Ne => left.not_equals(right),
        BinaryOp::Lt => left.less_than(right),
        BinaryOp::Le => left.less_than_or_equals(right),
        BinaryOp::Gt => left.greater_than(right),
        BinaryOp::Ge => left.greater_than_or_equals(right),
        _ => left.equals(right),
    };

    compare.into()
}

fn constant_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(a) | Value::Enum(a), Value::String(b) | Value::Enum(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
    }
}

fn constant_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => constant_order(a, b).map(Ordering::is_eq).unwrap_or(a == b),
    }
}

fn fold_comparison(op: BinaryOp, a: &Value, b: &Value) -> bool {
    match op {
        BinaryOp::Eq => constant_eq(a, b),
        BinaryOp::Ne => !constant_eq(a, b),
        _ => match constant_order(a, b) {
            Some(order) => match op {
                BinaryOp::Lt => order.is_lt(),
                BinaryOp::Le => order.is_le(),
                BinaryOp::Gt => order.is_gt(),
                _ => order.is_ge(),
            },
            None => false,
        },
    }
}
