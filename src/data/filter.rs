use std::collections::{BTreeMap, BTreeSet};

use super::model::{CategoryDomain, Dataset, TypedColumn};

// ---------------------------------------------------------------------------
// Filter predicate per column
// ---------------------------------------------------------------------------

/// The user's choice for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnFilter {
    /// Keep rows whose label is in the set. An empty set keeps nothing.
    Values(BTreeSet<String>),
    /// Keep rows whose year lies in `min..=max`.
    Range { min: i64, max: i64 },
}

/// Per-column selection state: column name → filter.
/// A column absent from the map is not filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    filters: BTreeMap<String, ColumnFilter>,
}

impl FilterSelection {
    /// Everything selected for `columns`: all labels, full year range.
    pub fn all_for(dataset: &Dataset, columns: &[String]) -> Self {
        let mut selection = Self::default();
        for col in columns {
            selection.select_all(dataset, col);
        }
        selection
    }

    pub fn get(&self, column: &str) -> Option<&ColumnFilter> {
        self.filters.get(column)
    }

    pub fn set_values(&mut self, column: &str, values: BTreeSet<String>) {
        self.filters
            .insert(column.to_string(), ColumnFilter::Values(values));
    }

    /// Add labels to a column's value filter, keeping those already selected.
    pub fn add_values<I>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entry = self
            .filters
            .entry(column.to_string())
            .or_insert_with(|| ColumnFilter::Values(BTreeSet::new()));
        match entry {
            ColumnFilter::Values(selected) => selected.extend(values),
            ColumnFilter::Range { .. } => *entry = ColumnFilter::Values(values.into_iter().collect()),
        }
    }

    /// Bounds are reordered so that `min <= max`.
    pub fn set_range(&mut self, column: &str, a: i64, b: i64) {
        self.filters.insert(
            column.to_string(),
            ColumnFilter::Range {
                min: a.min(b),
                max: a.max(b),
            },
        );
    }

    /// Toggle a single label in a column's value filter.
    pub fn toggle_value(&mut self, column: &str, value: &str) {
        let entry = self
            .filters
            .entry(column.to_string())
            .or_insert_with(|| ColumnFilter::Values(BTreeSet::new()));
        if let ColumnFilter::Values(selected) = entry {
            if !selected.remove(value) {
                selected.insert(value.to_string());
            }
        }
    }

    /// Select every load-time value of a column.
    pub fn select_all(&mut self, dataset: &Dataset, column: &str) {
        match dataset.column(column) {
            Some(TypedColumn::Categorical { domain, .. }) => {
                self.set_values(column, domain.labels().iter().cloned().collect());
            }
            Some(TypedColumn::Integer(values)) => {
                if let (Some(&min), Some(&max)) = (values.iter().min(), values.iter().max()) {
                    self.set_range(column, min, max);
                }
            }
            None => {}
        }
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.set_values(column, BTreeSet::new());
    }

    /// Drop filters for columns that are no longer selected.
    pub fn retain_columns(&mut self, columns: &[String]) {
        self.filters.retain(|col, _| columns.contains(col));
    }

    /// Whether a row passes the filter of one column.
    fn admits(filter: &ColumnFilter, column: &TypedColumn, row: usize) -> bool {
        match (filter, column) {
            (ColumnFilter::Values(selected), col) => col
                .label_at(row)
                .is_some_and(|label| selected.contains(&label)),
            (ColumnFilter::Range { min, max }, TypedColumn::Integer(values)) => {
                values.get(row).is_some_and(|v| (*min..=*max).contains(v))
            }
            (ColumnFilter::Range { .. }, TypedColumn::Categorical { .. }) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Filtered view
// ---------------------------------------------------------------------------

/// Options offered for one column, given the filters of the columns before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOptions {
    Labels(CategoryDomain),
    Years(Vec<i64>),
}

/// Rows of a dataset that passed the filters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRows {
    pub rows: Vec<usize>,
    /// Narrowed domain of every filtered categorical column.
    pub domains: BTreeMap<String, CategoryDomain>,
}

/// Apply the filters of `columns`, in order, to `dataset`.
///
/// Each categorical column's domain is narrowed to the labels still present
/// after its own filter. The dataset's load-time domains are untouched.
pub fn apply_filters(dataset: &Dataset, columns: &[String], filters: &FilterSelection) -> FilteredRows {
    let mut rows: Vec<usize> = (0..dataset.len()).collect();
    let mut domains = BTreeMap::new();

    for name in columns {
        let Some(column) = dataset.column(name) else {
            continue;
        };
        if let Some(filter) = filters.get(name) {
            if matches!(filter, ColumnFilter::Range { .. }) && column.is_categorical() {
                log::warn!("Ignoring range filter on categorical column '{name}'");
            }
            rows.retain(|&row| FilterSelection::admits(filter, column, row));
        }
        if column.is_categorical() {
            domains.insert(name.clone(), remaining_domain(column, &rows));
        }
    }

    FilteredRows { rows, domains }
}

/// Options per selected column, cascading through the filters in order.
///
/// The options of column *i* are the distinct values left after applying the
/// filters of columns *0..i*.
pub fn cascade_options(
    dataset: &Dataset,
    columns: &[String],
    filters: &FilterSelection,
) -> Vec<(String, ColumnOptions)> {
    let mut rows: Vec<usize> = (0..dataset.len()).collect();
    let mut out = Vec::with_capacity(columns.len());

    for name in columns {
        let Some(column) = dataset.column(name) else {
            continue;
        };
        let options = match column {
            TypedColumn::Categorical { .. } => ColumnOptions::Labels(remaining_domain(column, &rows)),
            TypedColumn::Integer(values) => {
                let years: BTreeSet<i64> = rows.iter().map(|&r| values[r]).collect();
                ColumnOptions::Years(years.into_iter().collect())
            }
        };
        out.push((name.clone(), options));

        if let Some(filter) = filters.get(name) {
            rows.retain(|&row| FilterSelection::admits(filter, column, row));
        }
    }
    out
}

fn remaining_domain(column: &TypedColumn, rows: &[usize]) -> CategoryDomain {
    CategoryDomain::from_labels(rows.iter().filter_map(|&row| column.label_at(row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{RawTable, RawValue};
    use crate::data::normalize::normalize;

    fn dataset() -> Dataset {
        let mut raw = RawTable::new(vec![
            "Country".into(),
            "Year".into(),
            "Sex".into(),
        ]);
        for (country, year, sex) in [
            ("DE", 2020, "F"),
            ("DE", 2021, "M"),
            ("FR", 2021, "F"),
            ("AT", 2022, "M"),
        ] {
            raw.rows.push(vec![
                RawValue::Text(country.into()),
                RawValue::Integer(year),
                RawValue::Text(sex.into()),
            ]);
        }
        normalize(&raw, "Year").unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_select_everything() {
        let ds = dataset();
        let columns = cols(&["Country", "Year"]);
        let filters = FilterSelection::all_for(&ds, &columns);

        assert_eq!(filters.get("Year"), Some(&ColumnFilter::Range { min: 2020, max: 2022 }));
        assert_eq!(apply_filters(&ds, &columns, &filters).rows, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_value_and_range_filters() {
        let ds = dataset();
        let columns = cols(&["Country", "Year"]);
        let mut filters = FilterSelection::all_for(&ds, &columns);
        filters.toggle_value("Country", "AT");
        filters.set_range("Year", 2021, 2021);

        let filtered = apply_filters(&ds, &columns, &filters);
        assert_eq!(filtered.rows, vec![1, 2]);
        assert_eq!(filtered.domains["Country"].labels(), ["DE", "FR"]);
        // load-time domain is unchanged
        assert_eq!(ds.domain("Country").unwrap().labels(), ["AT", "DE", "FR"]);
    }

    #[test]
    fn test_empty_value_set_keeps_nothing() {
        let ds = dataset();
        let columns = cols(&["Sex"]);
        let mut filters = FilterSelection::all_for(&ds, &columns);
        filters.select_none("Sex");
        assert!(apply_filters(&ds, &columns, &filters).rows.is_empty());
    }

    #[test]
    fn test_unselected_columns_are_not_filtered() {
        let ds = dataset();
        let mut filters = FilterSelection::default();
        filters.set_values("Sex", ["F".to_string()].into());
        let filtered = apply_filters(&ds, &cols(&["Country"]), &filters);
        assert_eq!(filtered.rows.len(), 4);
    }

    #[test]
    fn test_range_bounds_are_reordered() {
        let mut filters = FilterSelection::default();
        filters.set_range("Year", 2022, 2020);
        assert_eq!(filters.get("Year"), Some(&ColumnFilter::Range { min: 2020, max: 2022 }));
    }

    #[test]
    fn test_cascade_options_follow_previous_filters() {
        let ds = dataset();
        let columns = cols(&["Country", "Sex", "Year"]);
        let mut filters = FilterSelection::all_for(&ds, &columns);
        filters.set_values("Country", ["DE".to_string()].into());
        filters.set_values("Sex", ["M".to_string()].into());

        let options = cascade_options(&ds, &columns, &filters);
        assert_eq!(
            options[0].1,
            ColumnOptions::Labels(CategoryDomain::from_labels(["AT", "DE", "FR"]))
        );
        assert_eq!(options[1].1, ColumnOptions::Labels(CategoryDomain::from_labels(["F", "M"])));
        assert_eq!(options[2].1, ColumnOptions::Years(vec![2021]));
    }

    #[test]
    fn test_add_values_keeps_hidden_selection() {
        let ds = dataset();
        let columns = cols(&["Sex", "Country"]);
        let mut filters = FilterSelection::all_for(&ds, &columns);
        filters.set_values("Sex", ["M".to_string()].into());
        filters.set_values("Country", ["FR".to_string()].into());

        // only DE and AT are offered while Sex = M
        let options = cascade_options(&ds, &columns, &filters);
        let ColumnOptions::Labels(shown) = &options[1].1 else {
            panic!("label options expected");
        };
        filters.add_values("Country", shown.labels().iter().cloned());

        assert_eq!(
            filters.get("Country"),
            Some(&ColumnFilter::Values(
                ["AT", "DE", "FR"].iter().map(|s| s.to_string()).collect()
            ))
        );
    }
}
