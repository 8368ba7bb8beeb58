use crate::{alias::Alias, context::Context, error::Result};
use bastion_schema::ModelDef;
use bastion_sql::ast::*;

/// `Model AS alias`
pub fn model_table(model: &ModelDef, alias: &Alias) -> Table {
    Table::from(model.table_name()).alias(alias)
}

/// `SELECT .. FROM Model AS alias`, joined with the base table when the model
/// is a delegate sub-model so that inherited fields can be read.
pub fn select_model(ctx: &Context<'_>, model: &ModelDef, alias: &Alias) -> Result<Select> {
    let select = Select::from_table(model_table(model, alias));

    match ctx.schema.base_model(model) {
        Some(base) => {
            let base_alias = alias.base();
            let on = id_equality(model, alias, base, &base_alias)?;

            Ok(select.inner_join(model_table(base, &base_alias).on(on)))
        }
        None => Ok(select),
    }
}

/// Left joins every concrete sub-model of a delegate base, so that the
/// fields of the concrete type can be merged into the result.
pub(crate) fn with_sub_model_joins(ctx: &Context<'_>, model: &ModelDef, alias: &Alias, select: Select) -> Result<Select> {
    if !model.is_delegate {
        return Ok(select);
    }

    ctx.schema.sub_models(model).try_fold(select, |select, sub| {
        let sub_alias = alias.sub_model(&sub.name);
        let on = id_equality(sub, &sub_alias, model, alias)?;

        Ok(select.left_join(model_table(sub, &sub_alias).on(on)))
    })
}

/// `left.id = right.id` over the shared primary key of a delegate hierarchy.
fn id_equality(left: &ModelDef, left_alias: &Alias, right: &ModelDef, right_alias: &Alias) -> Result<ConditionTree> {
    let mut conditions = Vec::with_capacity(left.id_fields.len());

    for name in left.id_fields.iter() {
        let left_field = left.field(name)?;
        let right_field = right.field(name)?;

        conditions.push(
            Column::new(left_field.column_name())
                .table(left_alias)
                .equals(Column::new(right_field.column_name()).table(right_alias)),
        );
    }

    Ok(ConditionTree::and(conditions))
}
