//! Grouped row counts over a user-chosen combination of columns.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use thiserror::Error;

use super::export;
use super::filter::{FilterSelection, apply_filters};
use super::model::{CategoryDomain, Dataset, KeyValue};

/// Default cap on the number of pivot columns offered in the UI.
pub const MAX_PIVOT_COLUMNS: usize = 4;

/// Name of the count column in the pivot output.
pub const COUNT_COLUMN: &str = "Count";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No columns have been selected")]
    Empty,
    #[error("At most {max} columns can be selected ({got} chosen)")]
    TooMany { max: usize, got: usize },
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Column '{0}' selected more than once")]
    Duplicate(String),
}

impl SelectionError {
    /// Whether the caller should stop and show a warning rather than report
    /// a failure.
    pub fn is_halt(&self) -> bool {
        matches!(self, SelectionError::Empty)
    }
}

/// A validated, ordered list of pivot columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotSelection {
    columns: Vec<String>,
}

impl PivotSelection {
    pub fn new(columns: &[String], dataset: &Dataset, max_columns: usize) -> Result<Self, SelectionError> {
        if columns.is_empty() {
            return Err(SelectionError::Empty);
        }
        if columns.len() > max_columns {
            return Err(SelectionError::TooMany {
                max: max_columns,
                got: columns.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for col in columns {
            if dataset.column_index(col).is_none() {
                return Err(SelectionError::UnknownColumn(col.clone()));
            }
            if !seen.insert(col.as_str()) {
                return Err(SelectionError::Duplicate(col.clone()));
            }
        }
        Ok(Self {
            columns: columns.to_vec(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotRow {
    pub key: Vec<KeyValue>,
    pub count: u64,
}

/// One row per non-empty group, sorted by key.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
    /// Narrowed domains of the filtered categorical columns.
    pub domains: BTreeMap<String, CategoryDomain>,
}

impl PivotTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Header row of the exported table: dimensions then `Count`.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.columns.clone();
        headers.push(COUNT_COLUMN.to_string());
        headers
    }

    /// CSV bytes: UTF-8, header row, comma-delimited, no index column.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let rows = self.rows.iter().map(|row| {
            row.key
                .iter()
                .map(ToString::to_string)
                .chain(std::iter::once(row.count.to_string()))
                .collect::<Vec<_>>()
        });
        export::to_csv_bytes(&self.headers(), rows)
    }
}

/// Filter `dataset`, group by the selected columns and count rows per group.
///
/// Rows with a null cell in any selected column do not form a group.
pub fn pivot_counts(dataset: &Dataset, selection: &PivotSelection, filters: &FilterSelection) -> PivotTable {
    let filtered = apply_filters(dataset, selection.columns(), filters);
    let col_idx: Vec<usize> = selection
        .columns()
        .iter()
        .filter_map(|c| dataset.column_index(c))
        .collect();

    let mut groups: BTreeMap<Vec<KeyValue>, u64> = BTreeMap::new();
    'rows: for &row in &filtered.rows {
        let mut key = Vec::with_capacity(col_idx.len());
        for &col in &col_idx {
            match dataset.key_at(row, col) {
                Some(value) => key.push(value),
                None => continue 'rows,
            }
        }
        *groups.entry(key).or_insert(0) += 1;
    }

    let rows: Vec<PivotRow> = groups
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| PivotRow { key, count })
        .collect();

    log::debug!(
        "Pivot over {:?}: {} of {} rows in {} groups",
        selection.columns(),
        filtered.rows.len(),
        dataset.len(),
        rows.len()
    );

    PivotTable {
        columns: selection.columns().to_vec(),
        rows,
        domains: filtered.domains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{RawTable, RawValue};
    use crate::data::normalize::normalize;

    fn dataset(rows: &[(&str, i64, &str)]) -> Dataset {
        let mut raw = RawTable::new(vec!["Country".into(), "Year".into(), "Sex".into()]);
        for (country, year, sex) in rows {
            raw.rows.push(vec![
                RawValue::Text(country.to_string()),
                RawValue::Integer(*year),
                if sex.is_empty() {
                    RawValue::Null
                } else {
                    RawValue::Text(sex.to_string())
                },
            ]);
        }
        normalize(&raw, "Year").unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counts_per_key() {
        let ds = dataset(&[("DE", 2020, "F"), ("DE", 2020, "M"), ("FR", 2021, "F")]);
        let selection = PivotSelection::new(&cols(&["Country", "Year"]), &ds, MAX_PIVOT_COLUMNS).unwrap();
        let pivot = pivot_counts(&ds, &selection, &FilterSelection::default());

        assert_eq!(
            pivot.rows,
            vec![
                PivotRow {
                    key: vec![KeyValue::Label("DE".into()), KeyValue::Year(2020)],
                    count: 2,
                },
                PivotRow {
                    key: vec![KeyValue::Label("FR".into()), KeyValue::Year(2021)],
                    count: 1,
                },
            ]
        );
        assert_eq!(pivot.total(), 3);
    }

    #[test]
    fn test_filtered_rows_satisfy_filters() {
        let ds = dataset(&[
            ("DE", 2019, "F"),
            ("DE", 2020, "M"),
            ("FR", 2021, "F"),
            ("AT", 2021, "F"),
            ("AT", 2022, "M"),
        ]);
        let columns = cols(&["Country", "Year", "Sex"]);
        let selection = PivotSelection::new(&columns, &ds, MAX_PIVOT_COLUMNS).unwrap();
        let mut filters = FilterSelection::all_for(&ds, &columns);
        filters.toggle_value("Country", "FR");
        filters.set_range("Year", 2020, 2021);

        let pivot = pivot_counts(&ds, &selection, &filters);
        assert_eq!(pivot.total(), 2);
        for row in &pivot.rows {
            assert_ne!(row.key[0], KeyValue::Label("FR".into()));
            let KeyValue::Year(year) = row.key[1] else {
                panic!("year key expected");
            };
            assert!((2020..=2021).contains(&year));
            assert!(row.count > 0);
        }
        assert_eq!(pivot.domains["Country"].labels(), ["AT", "DE"]);
    }

    #[test]
    fn test_pivot_is_deterministic() {
        let ds = dataset(&[("FR", 2020, "F"), ("DE", 2021, "M"), ("FR", 2020, "F")]);
        let columns = cols(&["Sex", "Country"]);
        let selection = PivotSelection::new(&columns, &ds, MAX_PIVOT_COLUMNS).unwrap();
        let filters = FilterSelection::all_for(&ds, &columns);

        let first = pivot_counts(&ds, &selection, &filters);
        let second = pivot_counts(&ds, &selection, &filters);
        assert_eq!(first, second);
    }

    #[test]
    fn test_null_keys_are_not_grouped() {
        let ds = dataset(&[("DE", 2020, ""), ("DE", 2020, "F")]);
        let selection = PivotSelection::new(&cols(&["Sex"]), &ds, MAX_PIVOT_COLUMNS).unwrap();
        let pivot = pivot_counts(&ds, &selection, &FilterSelection::default());
        assert_eq!(pivot.len(), 1);
        assert_eq!(pivot.rows[0].count, 1);
    }

    #[test]
    fn test_everything_filtered_out_gives_empty_table() {
        let ds = dataset(&[("DE", 2020, "F")]);
        let columns = cols(&["Country"]);
        let selection = PivotSelection::new(&columns, &ds, MAX_PIVOT_COLUMNS).unwrap();
        let mut filters = FilterSelection::all_for(&ds, &columns);
        filters.select_none("Country");
        assert!(pivot_counts(&ds, &selection, &filters).is_empty());
    }

    #[test]
    fn test_selection_validation() {
        let ds = dataset(&[("DE", 2020, "F")]);

        let err = PivotSelection::new(&[], &ds, MAX_PIVOT_COLUMNS).unwrap_err();
        assert_eq!(err, SelectionError::Empty);
        assert!(err.is_halt());

        let err = PivotSelection::new(&cols(&["Country", "Year", "Sex"]), &ds, 2).unwrap_err();
        assert_eq!(err, SelectionError::TooMany { max: 2, got: 3 });
        assert!(!err.is_halt());

        assert_eq!(
            PivotSelection::new(&cols(&["Region"]), &ds, MAX_PIVOT_COLUMNS),
            Err(SelectionError::UnknownColumn("Region".into()))
        );
        assert_eq!(
            PivotSelection::new(&cols(&["Sex", "Sex"]), &ds, MAX_PIVOT_COLUMNS),
            Err(SelectionError::Duplicate("Sex".into()))
        );
    }

    #[test]
    fn test_csv_export() {
        let ds = dataset(&[("DE", 2020, "F"), ("DE", 2020, "F"), ("FR", 2021, "M")]);
        let selection = PivotSelection::new(&cols(&["Country", "Year"]), &ds, MAX_PIVOT_COLUMNS).unwrap();
        let pivot = pivot_counts(&ds, &selection, &FilterSelection::default());

        let csv = String::from_utf8(pivot.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "Country,Year,Count\nDE,2020,2\nFR,2021,1\n");
    }
}
