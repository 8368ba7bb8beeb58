//! Mutable traversal of a query tree.
//!
//! Implementors override the hooks they care about and call the matching
//! `walk_*` function to continue into the children. A hook that replaces a
//! node without walking it leaves the replacement untouched.

use crate::ast::*;

pub trait VisitMut {
    type Error;

    fn visit_query_mut(&mut self, query: &mut Query) -> Result<(), Self::Error> {
        walk_query(self, query)
    }

    fn visit_select_mut(&mut self, select: &mut Select) -> Result<(), Self::Error> {
        walk_select(self, select)
    }

    fn visit_table_mut(&mut self, table: &mut Table) -> Result<(), Self::Error> {
        walk_table(self, table)
    }

    fn visit_expression_mut(&mut self, expr: &mut Expression) -> Result<(), Self::Error> {
        walk_expression(self, expr)
    }

    fn visit_conditions_mut(&mut self, tree: &mut ConditionTree) -> Result<(), Self::Error> {
        walk_conditions(self, tree)
    }
}

pub fn walk_query<V>(visitor: &mut V, query: &mut Query) -> Result<(), V::Error>
where
    V: VisitMut + ?Sized,
{
    match query {
        Query::Select(select) => visitor.visit_select_mut(select),
        Query::Insert(insert) => {
            for row in insert.values.iter_mut() {
                for value in row.iter_mut() {
                    visitor.visit_expression_mut(value)?;
                }
            }

            Ok(())
        }
        Query::Update(update) => {
            for value in update.values.iter_mut() {
                visitor.visit_expression_mut(value)?;
            }

            match update.conditions.as_mut() {
                Some(conditions) => visitor.visit_conditions_mut(conditions),
                None => Ok(()),
            }
        }
        Query::Delete(delete) => match delete.conditions.as_mut() {
            Some(conditions) => visitor.visit_conditions_mut(conditions),
            None => Ok(()),
        },
        Query::Raw(..) => Ok(()),
    }
}

pub fn walk_select<V>(visitor: &mut V, select: &mut Select) -> Result<(), V::Error>
where
    V: VisitMut + ?Sized,
{
    for table in select.tables.iter_mut() {
        visitor.visit_table_mut(table)?;
    }

    for join in select.joins.iter_mut() {
        let data = join.data_mut();
        visitor.visit_table_mut(&mut data.table)?;
        visitor.visit_conditions_mut(&mut data.conditions)?;
    }

    for column in select.columns.iter_mut() {
        visitor.visit_expression_mut(column)?;
    }

    if let Some(conditions) = select.conditions.as_mut() {
        visitor.visit_conditions_mut(conditions)?;
    }

    for expr in select.grouping.iter_mut() {
        visitor.visit_expression_mut(expr)?;
    }

    if let Some(having) = select.having.as_mut() {
        visitor.visit_conditions_mut(having)?;
    }

    for (expr, _) in select.ordering.0.iter_mut() {
        visitor.visit_expression_mut(expr)?;
    }

    if let Some(DistinctType::OnClause(exprs)) = select.distinct.as_mut() {
        for expr in exprs.iter_mut() {
            visitor.visit_expression_mut(expr)?;
        }
    }

    Ok(())
}

pub fn walk_table<V>(visitor: &mut V, table: &mut Table) -> Result<(), V::Error>
where
    V: VisitMut + ?Sized,
{
    match &mut table.typ {
        TableType::Table(_) => Ok(()),
        TableType::Query(select) => visitor.visit_select_mut(select),
    }
}

pub fn walk_conditions<V>(visitor: &mut V, tree: &mut ConditionTree) -> Result<(), V::Error>
where
    V: VisitMut + ?Sized,
{
    match tree {
        ConditionTree::And(exprs) | ConditionTree::Or(exprs) => {
            for expr in exprs.iter_mut() {
                visitor.visit_expression_mut(expr)?;
            }

            Ok(())
        }
        ConditionTree::Not(expr) | ConditionTree::Single(expr) => visitor.visit_expression_mut(expr),
        ConditionTree::NoCondition | ConditionTree::NegativeCondition => Ok(()),
    }
}

pub fn walk_expression<V>(visitor: &mut V, expr: &mut Expression) -> Result<(), V::Error>
where
    V: VisitMut + ?Sized,
{
    match &mut expr.kind {
        ExpressionKind::Selection(select) => visitor.visit_select_mut(select),
        ExpressionKind::Row(row) => {
            for value in row.iter_mut() {
                visitor.visit_expression_mut(value)?;
            }

            Ok(())
        }
        ExpressionKind::Function(fun) => walk_function(visitor, fun),
        ExpressionKind::Compare(compare) => walk_compare(visitor, compare),
        ExpressionKind::ConditionTree(tree) => visitor.visit_conditions_mut(tree),
        ExpressionKind::Op(op) => {
            let (left, right) = match op.as_mut() {
                SqlOp::Add(l, r) | SqlOp::Sub(l, r) | SqlOp::Mul(l, r) | SqlOp::Div(l, r) => (l, r),
            };

            visitor.visit_expression_mut(left)?;
            visitor.visit_expression_mut(right)
        }
        ExpressionKind::Column(_)
        | ExpressionKind::Parameterized(_)
        | ExpressionKind::Raw(_)
        | ExpressionKind::Asterisk(_)
        | ExpressionKind::Default => Ok(()),
    }
}

fn walk_compare<V>(visitor: &mut V, compare: &mut Compare) -> Result<(), V::Error>
where
    V: VisitMut + ?Sized,
{
    match compare {
        Compare::Equals(l, r)
        | Compare::NotEquals(l, r)
        | Compare::LessThan(l, r)
        | Compare::LessThanOrEquals(l, r)
        | Compare::GreaterThan(l, r)
        | Compare::GreaterThanOrEquals(l, r)
        | Compare::In(l, r)
        | Compare::NotIn(l, r)
        | Compare::Like(l, r, _) => {
            visitor.visit_expression_mut(l)?;
            visitor.visit_expression_mut(r)
        }
        Compare::Null(e) | Compare::NotNull(e) | Compare::ListIsEmpty(e, _) => visitor.visit_expression_mut(e),
        Compare::Exists(select) | Compare::NotExists(select) => visitor.visit_select_mut(select),
        Compare::ListHas(list, values, _) => {
            visitor.visit_expression_mut(list)?;

            for value in values.iter_mut() {
                visitor.visit_expression_mut(value)?;
            }

            Ok(())
        }
    }
}

fn walk_function<V>(visitor: &mut V, fun: &mut Function) -> Result<(), V::Error>
where
    V: VisitMut + ?Sized,
{
    match fun {
        Function::Count(None) | Function::JsonArrayEmpty => Ok(()),
        Function::Count(Some(e))
        | Function::Sum(e)
        | Function::Avg(e)
        | Function::Min(e)
        | Function::Max(e)
        | Function::Lower(e)
        | Function::JsonArrayAgg(e)
        | Function::JsonParse(e)
        | Function::EncodeBytes(e)
        | Function::JsonExtract { expr: e, .. }
        | Function::Cast { expr: e, .. } => visitor.visit_expression_mut(e),
        Function::Coalesce(args) | Function::Generic { args, .. } => {
            for arg in args.iter_mut() {
                visitor.visit_expression_mut(arg)?;
            }

            Ok(())
        }
        Function::JsonObject(pairs) => {
            for (_, value) in pairs.iter_mut() {
                visitor.visit_expression_mut(value)?;
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitor::{Sqlite, Visitor};
    use pretty_assertions::assert_eq;

    struct TableNames(Vec<String>);

    impl VisitMut for TableNames {
        type Error = ();

        fn visit_table_mut(&mut self, table: &mut Table) -> Result<(), ()> {
            if let Some(name) = table.name() {
                self.0.push(name.to_owned());
            }

            walk_table(self, table)
        }
    }

    struct Restrict;

    impl VisitMut for Restrict {
        type Error = ();

        fn visit_table_mut(&mut self, table: &mut Table) -> Result<(), ()> {
            if let Some(name) = table.name().map(ToOwned::to_owned) {
                let alias = table.alias.clone().unwrap_or_else(|| name.clone());
                let filtered = Select::from_table(name.as_str()).so_that(Column::from("visible").equals(val(true)));

                *table = Table::from(filtered).alias(alias);
                return Ok(());
            }

            walk_table(self, table)
        }
    }

    #[test]
    fn finds_tables_in_nested_positions() {
        let sub = Select::from_table("Post").column("authorId");
        let mut query = Query::from(
            Select::from_table("User")
                .so_that(Column::from("id").in_selection(sub))
                .left_join(Table::from("Profile").on(ConditionTree::NoCondition)),
        );

        let mut names = TableNames(Vec::new());
        names.visit_query_mut(&mut query).unwrap();

        assert_eq!(vec!["User", "Profile", "Post"], names.0);
    }

    #[test]
    fn replaced_tables_are_not_walked_again() {
        let mut query = Query::from(Select::from_table(Table::from("User").alias("u")));
        Restrict.visit_query_mut(&mut query).unwrap();

        let (sql, _) = Sqlite::build(query).unwrap();

        assert_eq!(
            "SELECT * FROM (SELECT * FROM `User` WHERE `visible` = ?) AS `u`",
            sql
        );
    }
}
