//! Field validation attributes (`@length`, `@email`, `@gt`, ...) checked
//! against written values.

use super::*;
use bastion_schema::FieldDef;
use bastion_value::Value;
use once_cell::sync::Lazy;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
        .expect("email pattern is valid")
});

impl ArgumentParser<'_> {
    /// Checks `value` against every rule of `field`, reporting each failed
    /// rule. Returns whether all passed.
    pub(super) fn check_validations(&mut self, field: &FieldDef, path: &ArgumentPath, value: &Value) -> bool {
        if field.validations.is_empty() {
            return true;
        }

        let values: Vec<&Value> = match value {
            Value::List(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            single => vec![single],
        };

        let mut passed = true;

        for rule in &field.validations {
            let failure = values.iter().find_map(|v| self.rule_failure(rule, v));

            if let Some(failure) = failure {
                let message = rule.message().map(ToOwned::to_owned).unwrap_or(failure);
                self.violation(path, format!("{}: {message}", rule.name()));
                passed = false;
            }
        }

        passed
    }

    fn rule_failure(&self, rule: &ValidationRule, value: &Value) -> Option<String> {
        if rule.is_textual() {
            let text = value.as_str()?;
            return textual_failure(self.validator, rule, text);
        }

        let number = value.as_f64()?;

        match rule {
            ValidationRule::Gt { value, .. } => (number <= *value).then(|| format!("must be greater than {value}")),
            ValidationRule::Gte { value, .. } => {
                (number < *value).then(|| format!("must be greater than or equal to {value}"))
            }
            ValidationRule::Lt { value, .. } => (number >= *value).then(|| format!("must be less than {value}")),
            ValidationRule::Lte { value, .. } => {
                (number > *value).then(|| format!("must be less than or equal to {value}"))
            }
            _ => None,
        }
    }
}

fn textual_failure(validator: &Validator, rule: &ValidationRule, text: &str) -> Option<String> {
    match rule {
        ValidationRule::Length { min, max, .. } => {
            let length = text.chars().count();

            match (min, max) {
                (Some(min), _) if length < *min => Some(format!("must be at least {min} characters long")),
                (_, Some(max)) if length > *max => Some(format!("must be at most {max} characters long")),
                _ => None,
            }
        }
        ValidationRule::Regex { pattern, .. } => match validator.pattern(pattern) {
            Some(re) if re.is_match(text) => None,
            Some(_) => Some(format!("must match the pattern {pattern}")),
            None => Some(format!("the pattern {pattern} is not a valid regular expression")),
        },
        ValidationRule::Email { .. } => (!EMAIL.is_match(text)).then(|| "must be a valid email address".to_owned()),
        ValidationRule::Url { .. } => url::Url::parse(text)
            .is_err()
            .then(|| "must be a valid URL".to_owned()),
        ValidationRule::StartsWith { text: prefix, .. } => {
            (!text.starts_with(prefix.as_str())).then(|| format!("must start with \"{prefix}\""))
        }
        ValidationRule::EndsWith { text: suffix, .. } => {
            (!text.ends_with(suffix.as_str())).then(|| format!("must end with \"{suffix}\""))
        }
        ValidationRule::Contains { text: needle, .. } => {
            (!text.contains(needle.as_str())).then(|| format!("must contain \"{needle}\""))
        }
        _ => None,
    }
}
