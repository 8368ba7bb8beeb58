use std::fmt;

const SEPARATOR: char = '$';

/// Table alias of a model occurrence in a query.
///
/// Aliases are paths: the root is the table name and every relation hop
/// appends the field name, so `User$posts$author` is the author of a post of
/// a user. Helper tables that belong to an occurrence (delegate joins,
/// cursor rows, aggregation wrappers) append a segment starting with `@`,
/// which can never collide with a field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alias(String);

impl Alias {
    pub fn new(name: impl Into<String>) -> Self {
        Alias(name.into())
    }

    /// The alias of the model reached through `field`.
    pub fn child(&self, field: &str) -> Alias {
        Alias(format!("{}{SEPARATOR}{field}", self.0))
    }

    /// A helper table attached to this occurrence.
    pub fn derived(&self, kind: &str) -> Alias {
        Alias(format!("{}{SEPARATOR}@{kind}", self.0))
    }

    /// The base table join of a delegate sub-model.
    pub fn base(&self) -> Alias {
        self.derived("base")
    }

    /// The join of a concrete sub-model of a delegate base.
    pub fn sub_model(&self, model: &str) -> Alias {
        self.derived(&format!("sub{SEPARATOR}{model}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Alias> for String {
    fn from(alias: Alias) -> Self {
        alias.0
    }
}

impl From<&Alias> for String {
    fn from(alias: &Alias) -> Self {
        alias.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_follow_relation_hops() {
        let root = Alias::new("User");

        assert_eq!("User$posts$author", root.child("posts").child("author").as_str());
        assert_eq!("User$posts$@base", root.child("posts").base().as_str());
        assert_eq!("User$@sub$Video", root.sub_model("Video").as_str());
    }
}
