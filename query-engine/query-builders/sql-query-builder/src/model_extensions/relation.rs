use super::field_column;
use crate::{alias::Alias, error::Result};
use bastion_schema::{ResolvedRelation, SchemaError};
use bastion_sql::ast::*;

/// The condition relating a row of the relation's source (aliased `parent`)
/// to a row of its target (aliased `child`).
///
/// Foreign key relations compare the key columns directly. Many-to-many
/// relations go through the join table:
///
/// ```sql
/// child.id IN (SELECT jt.B FROM _AToB AS jt WHERE jt.A = parent.id)
/// ```
pub fn relation_condition(rel: &ResolvedRelation<'_>, parent: &Alias, child: &Alias) -> Result<ConditionTree> {
    if let Some(join_table) = rel.join_table() {
        let (source_id, target_id) = match (rel.source_id(), rel.target_id()) {
            (Some(source_id), Some(target_id)) => (source_id, target_id),
            _ => {
                return Err(SchemaError::InvalidRelation {
                    model: rel.source.name.clone(),
                    field: rel.field.name.clone(),
                    reason: "many-to-many relations need single-field ids on both sides".into(),
                }
                .into())
            }
        };

        let jt_alias = child.derived("jt");
        let jt = Table::from(join_table.name.as_str()).alias(&jt_alias);

        let linked_ids = Select::from_table(jt.clone())
            .column(jt.column(join_table.other_column.as_str()))
            .so_that(
                jt.column(join_table.self_column.as_str())
                    .equals(field_column(rel.source, source_id, parent)),
            );

        return Ok(field_column(rel.target, target_id, child)
            .in_selection(linked_ids)
            .into());
    }

    let mut conditions = Vec::new();

    for (source_field, target_field) in rel.join_pairs() {
        let source_field = rel.source.field(source_field)?;
        let target_field = rel.target.field(target_field)?;

        conditions.push(field_column(rel.source, source_field, parent).equals(field_column(rel.target, target_field, child)));
    }

    Ok(ConditionTree::and(conditions))
}
