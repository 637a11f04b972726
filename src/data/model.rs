use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// RawValue – a single cell as read from the source file
// ---------------------------------------------------------------------------

/// A dynamically-typed source cell, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for RawValue {
    /// Stringification used for category labels: `1`, `1.0`, `2.5`, `True`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => write!(f, "{s}"),
            RawValue::Integer(i) => write!(f, "{i}"),
            RawValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Bool(true) => write!(f, "True"),
            RawValue::Bool(false) => write!(f, "False"),
            RawValue::Null => write!(f, "nan"),
        }
    }
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the cell, used for flags, counts and rates.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Float(v) if !v.is_nan() => Some(*v),
            RawValue::Integer(i) => Some(*i as f64),
            RawValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            _ => None,
        }
    }

    /// Strict integer view: floats must be whole, text must parse.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Integer(i) => Some(*i),
            RawValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            RawValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RawTable – the loaded, not yet normalized table
// ---------------------------------------------------------------------------

/// Column names plus row-major cells, exactly as read from the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the cells of one column.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &RawValue> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).unwrap_or(&RawValue::Null))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CategoryDomain – the ordered label set of a categorical column
// ---------------------------------------------------------------------------

/// Sorted, de-duplicated labels of a categorical column.
///
/// Built once at load time and never mutated; narrowing a domain after
/// filtering produces a new, smaller domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDomain {
    labels: Arc<[String]>,
}

impl CategoryDomain {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self {
            labels: sorted.into_iter().collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Position of `label` in the domain; codes follow the sort order.
    pub fn code_of(&self, label: &str) -> Option<u32> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
            .map(|i| i as u32)
    }

    pub fn label(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TypedColumn / Dataset – the normalized table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TypedColumn {
    /// `codes[row]` indexes into `domain`; `None` marks a null source cell.
    Categorical {
        domain: CategoryDomain,
        codes: Vec<Option<u32>>,
    },
    /// The designated year column.
    Integer(Vec<i64>),
}

impl TypedColumn {
    pub fn len(&self) -> usize {
        match self {
            TypedColumn::Categorical { codes, .. } => codes.len(),
            TypedColumn::Integer(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, TypedColumn::Categorical { .. })
    }

    /// Display label of a row's cell; `None` for a null categorical cell.
    pub fn label_at(&self, row: usize) -> Option<String> {
        match self {
            TypedColumn::Categorical { domain, codes } => codes
                .get(row)
                .copied()
                .flatten()
                .and_then(|code| domain.label(code))
                .map(str::to_string),
            TypedColumn::Integer(values) => values.get(row).map(|v| v.to_string()),
        }
    }
}

/// One cell of a grouping key or pivot row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Label(String),
    Year(i64),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Label(s) => write!(f, "{s}"),
            KeyValue::Year(y) => write!(f, "{y}"),
        }
    }
}

/// The normalized, immutable table a dashboard page works on.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    column_names: Vec<String>,
    columns: Vec<TypedColumn>,
    n_rows: usize,
}

impl Dataset {
    /// Assemble a dataset; every column must have `n_rows` entries.
    pub fn new(column_names: Vec<String>, columns: Vec<TypedColumn>, n_rows: usize) -> Self {
        debug_assert_eq!(column_names.len(), columns.len());
        debug_assert!(columns.iter().all(|c| c.len() == n_rows));
        Self {
            column_names,
            columns,
            n_rows,
        }
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&TypedColumn> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Load-time domain of a categorical column.
    pub fn domain(&self, name: &str) -> Option<&CategoryDomain> {
        match self.column(name)? {
            TypedColumn::Categorical { domain, .. } => Some(domain),
            TypedColumn::Integer(_) => None,
        }
    }

    /// Names of the categorical columns, in table order.
    pub fn categorical_columns(&self) -> Vec<String> {
        self.column_names
            .iter()
            .zip(&self.columns)
            .filter(|(_, col)| col.is_categorical())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Sortable key cell at (`row`, `col`); `None` for a null cell.
    pub fn key_at(&self, row: usize, col: usize) -> Option<KeyValue> {
        match &self.columns[col] {
            TypedColumn::Categorical { .. } => self.columns[col].label_at(row).map(KeyValue::Label),
            TypedColumn::Integer(values) => values.get(row).copied().map(KeyValue::Year),
        }
    }

    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_stringification() {
        assert_eq!(RawValue::Integer(3).to_string(), "3");
        assert_eq!(RawValue::Float(3.0).to_string(), "3.0");
        assert_eq!(RawValue::Float(2.5).to_string(), "2.5");
        assert_eq!(RawValue::Bool(true).to_string(), "True");
        assert_eq!(RawValue::Text("DE".into()).to_string(), "DE");
    }

    #[test]
    fn test_raw_value_integer_cast_is_strict() {
        assert_eq!(RawValue::Float(2020.0).as_i64(), Some(2020));
        assert_eq!(RawValue::Text(" 2021 ".into()).as_i64(), Some(2021));
        assert_eq!(RawValue::Float(2020.5).as_i64(), None);
        assert_eq!(RawValue::Null.as_i64(), None);
        assert!(RawValue::Float(f64::NAN).is_null());
    }

    #[test]
    fn test_domain_is_sorted_and_distinct() {
        let domain = CategoryDomain::from_labels(["FR", "DE", "AT", "DE"]);
        assert_eq!(domain.labels(), ["AT", "DE", "FR"]);
        assert_eq!(domain.code_of("DE"), Some(1));
        assert_eq!(domain.label(2), Some("FR"));
        assert_eq!(domain.code_of("IT"), None);
    }

    #[test]
    fn test_key_ordering_follows_domain_order() {
        let mut keys = vec![
            KeyValue::Label("FR".into()),
            KeyValue::Label("AT".into()),
            KeyValue::Label("DE".into()),
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(labels, ["AT", "DE", "FR"]);
    }
}
