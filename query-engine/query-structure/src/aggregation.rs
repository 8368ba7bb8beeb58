use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregationFunction {
    /// The key of the function in arguments and results, e.g. `_sum`.
    pub fn key(&self) -> &'static str {
        match self {
            AggregationFunction::Count => "_count",
            AggregationFunction::Sum => "_sum",
            AggregationFunction::Avg => "_avg",
            AggregationFunction::Min => "_min",
            AggregationFunction::Max => "_max",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let function = match key {
            "_count" => AggregationFunction::Count,
            "_sum" => AggregationFunction::Sum,
            "_avg" => AggregationFunction::Avg,
            "_min" => AggregationFunction::Min,
            "_max" => AggregationFunction::Max,
            _ => return None,
        };

        Some(function)
    }

    /// Whether the function only accepts numeric fields.
    pub fn is_numeric_only(&self) -> bool {
        matches!(self, AggregationFunction::Sum | AggregationFunction::Avg)
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationSelection {
    /// `_count`, with `all` standing for `_all` (every row).
    Count { all: bool, fields: Vec<String> },
    Sum(Vec<String>),
    Avg(Vec<String>),
    Min(Vec<String>),
    Max(Vec<String>),
}

impl AggregationSelection {
    pub fn new(function: AggregationFunction, fields: Vec<String>, all: bool) -> Self {
        match function {
            AggregationFunction::Count => AggregationSelection::Count { all, fields },
            AggregationFunction::Sum => AggregationSelection::Sum(fields),
            AggregationFunction::Avg => AggregationSelection::Avg(fields),
            AggregationFunction::Min => AggregationSelection::Min(fields),
            AggregationFunction::Max => AggregationSelection::Max(fields),
        }
    }

    pub fn function(&self) -> AggregationFunction {
        match self {
            AggregationSelection::Count { .. } => AggregationFunction::Count,
            AggregationSelection::Sum(_) => AggregationFunction::Sum,
            AggregationSelection::Avg(_) => AggregationFunction::Avg,
            AggregationSelection::Min(_) => AggregationFunction::Min,
            AggregationSelection::Max(_) => AggregationFunction::Max,
        }
    }

    pub fn fields(&self) -> &[String] {
        match self {
            AggregationSelection::Count { fields, .. }
            | AggregationSelection::Sum(fields)
            | AggregationSelection::Avg(fields)
            | AggregationSelection::Min(fields)
            | AggregationSelection::Max(fields) => fields,
        }
    }
}
