use crate::{relation::RelationInfo, validation::ValidationRule};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The built-in scalar types of the modeling language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    Int,
    BigInt,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Bytes,
    Json,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::BigInt => "BigInt",
            ScalarType::Float => "Float",
            ScalarType::Decimal => "Decimal",
            ScalarType::Boolean => "Boolean",
            ScalarType::DateTime => "DateTime",
            ScalarType::Bytes => "Bytes",
            ScalarType::Json => "Json",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int | ScalarType::BigInt | ScalarType::Float | ScalarType::Decimal
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let typ = match s {
            "String" => ScalarType::String,
            "Int" => ScalarType::Int,
            "BigInt" => ScalarType::BigInt,
            "Float" => ScalarType::Float,
            "Decimal" => ScalarType::Decimal,
            "Boolean" => ScalarType::Boolean,
            "DateTime" => ScalarType::DateTime,
            "Bytes" => ScalarType::Bytes,
            "Json" => ScalarType::Json,
            _ => return Err(()),
        };

        Ok(typ)
    }
}

/// What a field's `type` name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind<'a> {
    Scalar(ScalarType),
    Enum(&'a str),
    /// A structured JSON shape declared as a type definition.
    TypeDef(&'a str),
    Relation(&'a str),
}

/// A default value declared on a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// A generator call such as `now()`, `uuid(7)` or `autoincrement()`.
    Call {
        call: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
    /// A literal, or a list of literals for list fields.
    Literal(serde_json::Value),
}

impl DefaultValue {
    pub fn call(name: impl Into<String>) -> Self {
        Self::Call {
            call: name.into(),
            args: Vec::new(),
        }
    }

    pub fn is_autoincrement(&self) -> bool {
        matches!(self, DefaultValue::Call { call, .. } if call == "autoincrement")
    }
}

/// One column or relation of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// The database column name, if mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub array: bool,
    #[serde(default)]
    pub updated_at: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationInfo>,
    /// Relation fields this scalar field is a foreign key for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_key_for: Vec<String>,
    #[serde(default)]
    pub computed: bool,
    /// The delegate base this field was inherited from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_model: Option<String>,
    #[serde(default)]
    pub is_discriminator: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ValidationRule>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            db_name: None,
            id: false,
            unique: false,
            optional: false,
            array: false,
            updated_at: false,
            default: None,
            relation: None,
            foreign_key_for: Vec::new(),
            computed: false,
            origin_model: None,
            is_discriminator: false,
            validations: Vec::new(),
        }
    }

    pub fn id(mut self) -> Self {
        self.id = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn updated_at(mut self) -> Self {
        self.updated_at = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn discriminator(mut self) -> Self {
        self.is_discriminator = true;
        self
    }

    pub fn map(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn default_call(self, name: &str) -> Self {
        self.default_value(DefaultValue::call(name))
    }

    pub fn default_literal(self, value: serde_json::Value) -> Self {
        self.default_value(DefaultValue::Literal(value))
    }

    pub fn relation(mut self, relation: RelationInfo) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn validate(mut self, rule: ValidationRule) -> Self {
        self.validations.push(rule);
        self
    }

    pub fn inherited_from(mut self, model: impl Into<String>) -> Self {
        self.origin_model = Some(model.into());
        self
    }

    pub fn column_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.type_name.parse().ok()
    }

    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    pub fn is_required(&self) -> bool {
        !self.optional && !self.array
    }

    /// A field that has a value on every row without the caller providing it.
    pub fn is_generated(&self) -> bool {
        self.default.is_some() || self.updated_at
    }

    pub fn is_list(&self) -> bool {
        self.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn defaults_deserialize_untagged() {
        let field: FieldDef = serde_json::from_value(json!({
            "type": "String",
            "default": { "call": "uuid", "args": [7] }
        }))
        .unwrap();

        assert_eq!(
            Some(DefaultValue::Call {
                call: "uuid".into(),
                args: vec![json!(7)]
            }),
            field.default
        );

        let field: FieldDef = serde_json::from_value(json!({ "type": "Int", "default": 3 })).unwrap();
        assert_eq!(Some(DefaultValue::Literal(json!(3))), field.default);
    }

    #[test]
    fn column_names_follow_mapping() {
        let field = FieldDef::new("createdAt", "DateTime").map("created_at");

        assert_eq!("created_at", field.column_name());
        assert_eq!(Some(ScalarType::DateTime), field.scalar_type());
    }
}
