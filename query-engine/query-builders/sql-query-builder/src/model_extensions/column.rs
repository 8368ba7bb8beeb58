use crate::{
    alias::Alias,
    context::Context,
    error::{QueryBuilderError, Result},
};
use bastion_schema::{FieldDef, ModelDef};
use bastion_sql::ast::*;

/// Whether the column of `field` lives in the base table of a delegate
/// sub-model instead of the model's own table.
pub(crate) fn is_inherited(model: &ModelDef, field: &FieldDef) -> bool {
    model.base_model.is_some() && field.origin_model.is_some() && !model.id_fields.contains(&field.name)
}

/// The column of a stored scalar field of the `model` row aliased `alias`.
pub fn field_column(model: &ModelDef, field: &FieldDef, alias: &Alias) -> Column {
    let owner = if is_inherited(model, field) {
        alias.base()
    } else {
        alias.clone()
    };

    Column::new(field.column_name()).table(owner)
}

/// The value of a scalar or computed field for the `model` row aliased
/// `alias`.
pub(crate) fn field_expression(ctx: &Context<'_>, model: &ModelDef, field: &FieldDef, alias: &Alias) -> Result<Expression> {
    if field.is_relation() {
        return Err(QueryBuilderError::invalid_filter(
            &model.name,
            &field.name,
            "relation fields have no column",
        ));
    }

    if !field.computed {
        return Ok(field_column(model, field, alias).into());
    }

    // Computed fields inherited from a delegate base are evaluated against the base row.
    let (owner, owner_alias) = match &field.origin_model {
        Some(origin) if model.base_model.is_some() => (origin.as_str(), alias.base()),
        _ => (model.name.as_str(), alias.clone()),
    };

    ctx.computed
        .get(owner, &field.name)
        .map(|compute| compute(owner_alias.as_str()))
        .ok_or_else(|| QueryBuilderError::MissingComputedField {
            model: owner.to_owned(),
            field: field.name.clone(),
        })
}

/// Resolves a field by name and returns its value expression.
pub(crate) fn named_field_expression(ctx: &Context<'_>, model: &ModelDef, name: &str, alias: &Alias) -> Result<Expression> {
    let field = model.field(name)?;
    field_expression(ctx, model, field, alias)
}
