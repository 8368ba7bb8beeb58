use crate::{
    policy::Expr,
    FieldDef, FieldKind, ModelDef, PolicyOperation, RelationLink, Schema, SchemaError, ScalarType, ValidationRule,
};
use petgraph::{algo::tarjan_scc, graph::DiGraph, graph::NodeIndex};
use std::collections::{BTreeSet, HashMap};

const CHECKED_OPERATIONS: [PolicyOperation; 5] = [
    PolicyOperation::Create,
    PolicyOperation::Read,
    PolicyOperation::Update,
    PolicyOperation::PostUpdate,
    PolicyOperation::Delete,
];

pub(crate) fn validate(schema: &Schema) -> Result<(), SchemaError> {
    if let Some(auth) = &schema.auth_type {
        schema.model(auth)?;
    }

    for model in schema.models.values() {
        validate_unique_criterion(model)?;
        validate_fields(schema, model)?;
        validate_relations(schema, model)?;
        validate_delegate(schema, model)?;
        validate_policies(schema, model)?;
    }

    detect_policy_cycles(schema)
}

fn validate_unique_criterion(model: &ModelDef) -> Result<(), SchemaError> {
    if model.is_view || !model.id_fields.is_empty() || !model.unique_fields.is_empty() {
        return Ok(());
    }

    Err(SchemaError::MissingUniqueCriterion(model.name.clone()))
}

fn validate_fields(schema: &Schema, model: &ModelDef) -> Result<(), SchemaError> {
    for name in model.id_fields.iter() {
        model.field(name)?;
    }

    for constraint in model.unique_constraints() {
        for name in constraint.fields {
            model.field(name)?;
        }
    }

    for field in model.fields.values() {
        if schema.field_kind(field).is_none() {
            return Err(SchemaError::InvalidValidation {
                model: model.name.clone(),
                field: field.name.clone(),
                reason: format!("unknown type `{}`", field.type_name),
            });
        }

        for rule in field.validations.iter() {
            validate_rule(schema, model, field, rule)?;
        }
    }

    Ok(())
}

fn validate_rule(schema: &Schema, model: &ModelDef, field: &FieldDef, rule: &ValidationRule) -> Result<(), SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidValidation {
        model: model.name.clone(),
        field: field.name.clone(),
        reason,
    };

    let scalar = match schema.field_kind(field) {
        Some(FieldKind::Scalar(scalar)) => scalar,
        _ => return Err(invalid(format!("{} needs a scalar field", rule.name()))),
    };

    if rule.is_textual() && scalar != ScalarType::String {
        return Err(invalid(format!("{} needs a String field", rule.name())));
    }

    if !rule.is_textual() && !scalar.is_numeric() {
        return Err(invalid(format!("{} needs a numeric field", rule.name())));
    }

    if let ValidationRule::Regex { pattern, .. } = rule {
        regex::Regex::new(pattern).map_err(|err| invalid(err.to_string()))?;
    }

    Ok(())
}

fn validate_relations(schema: &Schema, model: &ModelDef) -> Result<(), SchemaError> {
    for field in model.relation_fields() {
        let relation = schema.relation(&model.name, &field.name)?;

        match &relation.link {
            RelationLink::Owned { fields, references } => {
                for name in fields {
                    model.field(name)?;
                }

                let referenced: BTreeSet<&str> = references.iter().map(String::as_str).collect();
                let target = relation.target;

                let matches_criterion = target
                    .unique_constraints()
                    .into_iter()
                    .any(|c| c.fields.iter().copied().collect::<BTreeSet<_>>() == referenced)
                    || target.id_fields.iter().map(String::as_str).collect::<BTreeSet<_>>() == referenced;

                if !matches_criterion {
                    return Err(SchemaError::relation(
                        &model.name,
                        &field.name,
                        format!(
                            "references ({}) are not an id or unique criterion of `{}`",
                            references.join(", "),
                            target.name
                        ),
                    ));
                }
            }
            RelationLink::Inverse { .. } => (),
            RelationLink::ManyToMany(_) => {
                if relation.source_id().is_none() || relation.target_id().is_none() {
                    return Err(SchemaError::relation(
                        &model.name,
                        &field.name,
                        "many-to-many relations need a single-field id on both models",
                    ));
                }
            }
        }
    }

    Ok(())
}

fn validate_delegate(schema: &Schema, model: &ModelDef) -> Result<(), SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidDelegate {
        model: model.name.clone(),
        reason,
    };

    if model.is_delegate {
        let discriminator = model
            .discriminator()
            .ok_or_else(|| invalid("a delegate model needs a discriminator field".into()))?;

        if discriminator.scalar_type() != Some(ScalarType::String) && schema.enum_def(&discriminator.type_name).is_none()
        {
            return Err(invalid("the discriminator must be a String or enum field".into()));
        }

        for name in model.sub_models.iter() {
            let sub = schema.model(name)?;

            if sub.base_model.as_deref() != Some(model.name.as_str()) {
                return Err(invalid(format!("`{name}` does not extend `{}`", model.name)));
            }

            if sub.id_fields != model.id_fields {
                return Err(invalid(format!("`{name}` must share the id fields of its base")));
            }
        }
    }

    if let Some(base) = &model.base_model {
        let base_model = schema.model(base)?;

        if !base_model.is_delegate || !base_model.sub_models.contains(&model.name) {
            return Err(invalid(format!("`{base}` does not declare `{}` as a sub-model", model.name)));
        }

        if base_model.base_model.is_some() {
            return Err(invalid("only one level of delegation is supported".into()));
        }
    }

    Ok(())
}

fn validate_policies(schema: &Schema, model: &ModelDef) -> Result<(), SchemaError> {
    for rule in model.policies.iter() {
        if rule.operations.is_empty() {
            return Err(SchemaError::policy(&model.name, "a rule needs at least one operation"));
        }

        check_expr(schema, model, &rule.condition)?;
    }

    Ok(())
}

/// Checks that field references and relation calls resolve against `model`.
fn check_expr(schema: &Schema, model: &ModelDef, expr: &Expr) -> Result<(), SchemaError> {
    match expr {
        Expr::Literal { .. } | Expr::This | Expr::Auth => Ok(()),
        Expr::Array { items } => items.iter().try_for_each(|e| check_expr(schema, model, e)),
        Expr::Field { .. } | Expr::Member { .. } => match expr.field_path() {
            Some(path) => check_path(schema, model, &path),
            None => Ok(()),
        },
        Expr::Unary { operand, .. } => check_expr(schema, model, operand),
        Expr::Binary { op, left, right } if op.is_collection_predicate() => {
            let path = left
                .field_path()
                .ok_or_else(|| SchemaError::policy(&model.name, "collection predicates need a relation field"))?;

            let target = relation_target(schema, model, &path)?;
            check_expr(schema, target, right)
        }
        Expr::Binary { left, right, .. } => {
            check_expr(schema, model, left)?;
            check_expr(schema, model, right)
        }
        Expr::Call { function, args } if function == "check" => {
            let relation = args
                .first()
                .and_then(|arg| arg.field_path())
                .ok_or_else(|| SchemaError::policy(&model.name, "check() needs a relation field"))?;

            relation_target(schema, model, &relation)?;

            if let Some(op) = args.get(1) {
                let op = op.as_literal().and_then(|v| v.as_str()).and_then(PolicyOperation::parse);

                if op.is_none() {
                    return Err(SchemaError::policy(&model.name, "check() got an unknown operation"));
                }
            }

            Ok(())
        }
        Expr::Call { args, .. } => args.iter().try_for_each(|e| check_expr(schema, model, e)),
    }
}

fn check_path(schema: &Schema, model: &ModelDef, path: &[&str]) -> Result<(), SchemaError> {
    let mut current = model;

    for (i, name) in path.iter().enumerate() {
        let field = current.field(name)?;

        if i + 1 < path.len() {
            if field.relation.is_none() || field.array {
                return Err(SchemaError::policy(
                    &model.name,
                    format!("`{name}` is not a to-one relation and cannot be traversed"),
                ));
            }

            current = schema.model(&field.type_name)?;
        }
    }

    Ok(())
}

fn relation_target<'a>(schema: &'a Schema, model: &'a ModelDef, path: &[&str]) -> Result<&'a ModelDef, SchemaError> {
    let mut current = model;

    for name in path {
        let field = current.field(name)?;

        if field.relation.is_none() {
            return Err(SchemaError::policy(&model.name, format!("`{name}` is not a relation field")));
        }

        current = schema.model(&field.type_name)?;
    }

    Ok(current)
}

/// Builds the graph of `check()` calls between `(model, operation)` pairs and
/// rejects any cycle, including a model checking itself.
fn detect_policy_cycles(schema: &Schema) -> Result<(), SchemaError> {
    let mut graph = DiGraph::<(String, PolicyOperation), ()>::new();
    let mut nodes: HashMap<(String, PolicyOperation), NodeIndex> = HashMap::new();

    let mut node = |graph: &mut DiGraph<(String, PolicyOperation), ()>, key: (String, PolicyOperation)| {
        *nodes.entry(key.clone()).or_insert_with(|| graph.add_node(key))
    };

    for model in schema.models.values() {
        for operation in CHECKED_OPERATIONS {
            let mut targets = Vec::new();

            for rule in model.rules_for(operation) {
                collect_checks(schema, model, operation, &rule.condition, &mut targets);
            }

            if targets.is_empty() {
                continue;
            }

            let from = node(&mut graph, (model.name.clone(), operation));

            for target in targets {
                let to = node(&mut graph, target);
                graph.update_edge(from, to, ());
            }
        }
    }

    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1 || graph.contains_edge(component[0], component[0]);

        if is_cycle {
            let path = component
                .iter()
                .rev()
                .map(|idx| {
                    let (model, op) = &graph[*idx];
                    format!("{model}.{op}")
                })
                .collect::<Vec<_>>()
                .join(" -> ");

            return Err(SchemaError::CyclicPolicy(path));
        }
    }

    Ok(())
}

fn collect_checks(
    schema: &Schema,
    model: &ModelDef,
    operation: PolicyOperation,
    expr: &Expr,
    out: &mut Vec<(String, PolicyOperation)>,
) {
    match expr {
        Expr::Call { function, args } if function == "check" => {
            let target = args
                .first()
                .and_then(|arg| arg.field_path())
                .and_then(|path| relation_target(schema, model, &path).ok());

            let target_op = args
                .get(1)
                .and_then(|arg| arg.as_literal())
                .and_then(|v| v.as_str())
                .and_then(PolicyOperation::parse)
                .unwrap_or(operation);

            if let Some(target) = target {
                out.push((target.name.clone(), target_op));
            }
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_checks(schema, model, operation, arg, out);
            }
        }
        Expr::Binary { op, left, right } if op.is_collection_predicate() => {
            let target = left
                .field_path()
                .and_then(|path| relation_target(schema, model, &path).ok());

            if let Some(target) = target {
                collect_checks(schema, target, operation, right, out);
            }
        }
        Expr::Binary { left, right, .. } => {
            collect_checks(schema, model, operation, left, out);
            collect_checks(schema, model, operation, right, out);
        }
        Expr::Unary { operand, .. } => collect_checks(schema, model, operation, operand, out),
        Expr::Array { items } => {
            for item in items {
                collect_checks(schema, model, operation, item, out);
            }
        }
        Expr::Literal { .. } | Expr::Field { .. } | Expr::This | Expr::Auth | Expr::Member { .. } => (),
    }
}
