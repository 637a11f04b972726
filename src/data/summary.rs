use std::collections::BTreeMap;

use anyhow::{Context, Result};

use super::model::{Dataset, RawTable, TypedColumn};
use super::pivot::SelectionError;

// ---------------------------------------------------------------------------
// Per-year flag summary (Home page)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearRow {
    /// Number of records in the year.
    pub n: u64,
    /// Sum of each flag column, in `YearSummary::flags` order.
    pub flag_totals: Vec<f64>,
}

/// Records per year and the number of them flagged under each injury type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearSummary {
    pub flags: Vec<String>,
    pub years: BTreeMap<i64, YearRow>,
}

impl YearSummary {
    pub fn counts_by_year(&self) -> BTreeMap<i64, u64> {
        self.years.iter().map(|(y, row)| (*y, row.n)).collect()
    }

    /// Flag totals over all years.
    pub fn flag_totals(&self) -> Vec<(String, f64)> {
        self.flags
            .iter()
            .enumerate()
            .map(|(i, flag)| {
                let total = self.years.values().map(|row| row.flag_totals[i]).sum();
                (flag.clone(), total)
            })
            .collect()
    }
}

/// Group `raw` by year and sum the 0/1 flag columns. Missing flag cells
/// count as zero; a year that is not an integer is an error.
pub fn flag_summary(raw: &RawTable, year_col: &str, flag_cols: &[String]) -> Result<YearSummary> {
    let year_idx = raw
        .column_index(year_col)
        .with_context(|| format!("missing year column '{year_col}'"))?;
    let flag_idx = flag_cols
        .iter()
        .map(|f| {
            raw.column_index(f)
                .with_context(|| format!("missing flag column '{f}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut years: BTreeMap<i64, YearRow> = BTreeMap::new();
    for (row_no, row) in raw.rows.iter().enumerate() {
        let year = row[year_idx]
            .as_i64()
            .with_context(|| format!("row {row_no}: '{}' is not a year", row[year_idx]))?;
        let entry = years.entry(year).or_insert_with(|| YearRow {
            n: 0,
            flag_totals: vec![0.0; flag_idx.len()],
        });
        entry.n += 1;
        for (total, &idx) in entry.flag_totals.iter_mut().zip(&flag_idx) {
            *total += row[idx].as_f64().unwrap_or(0.0);
        }
    }

    Ok(YearSummary {
        flags: flag_cols.to_vec(),
        years,
    })
}

// ---------------------------------------------------------------------------
// Year x category cross tabulation (line and bar charts)
// ---------------------------------------------------------------------------

/// Row counts per (year, category), one row per observed year.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTab {
    pub category_column: String,
    pub years: Vec<i64>,
    pub categories: Vec<String>,
    /// `counts[year_idx][category_idx]`
    pub counts: Vec<Vec<u64>>,
}

impl CrossTab {
    /// One `(category, [[year, count], ...])` series per category.
    pub fn series(&self) -> Vec<(String, Vec<[f64; 2]>)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let points = self
                    .years
                    .iter()
                    .zip(&self.counts)
                    .map(|(year, row)| [*year as f64, row[c] as f64])
                    .collect();
                (name.clone(), points)
            })
            .collect()
    }

    /// Average yearly count per category.
    pub fn column_means(&self) -> Vec<(String, f64)> {
        let n_years = self.years.len();
        self.categories
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let mean = if n_years == 0 {
                    0.0
                } else {
                    self.counts.iter().map(|row| row[c] as f64).sum::<f64>() / n_years as f64
                };
                (name.clone(), mean)
            })
            .collect()
    }
}

/// Count rows per (year, category) over the category column's full domain.
/// Rows with a null category are skipped.
pub fn cross_tab(dataset: &Dataset, year_col: &str, category_col: &str) -> Result<CrossTab, SelectionError> {
    let Some(TypedColumn::Integer(years)) = dataset.column(year_col) else {
        return Err(SelectionError::UnknownColumn(year_col.to_string()));
    };
    let Some(TypedColumn::Categorical { domain, codes }) = dataset.column(category_col) else {
        return Err(SelectionError::UnknownColumn(category_col.to_string()));
    };

    let mut by_year: BTreeMap<i64, Vec<u64>> = BTreeMap::new();
    for (year, code) in years.iter().zip(codes) {
        let row = by_year
            .entry(*year)
            .or_insert_with(|| vec![0; domain.len()]);
        if let Some(code) = code {
            row[*code as usize] += 1;
        }
    }

    Ok(CrossTab {
        category_column: category_col.to_string(),
        years: by_year.keys().copied().collect(),
        categories: domain.labels().to_vec(),
        counts: by_year.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RawValue;
    use crate::data::normalize::normalize;

    fn summary_table() -> RawTable {
        let mut raw = RawTable::new(vec!["YearOfAttendance".into(), "Fall".into(), "Sports".into()]);
        raw.rows = vec![
            vec![RawValue::Integer(2020), RawValue::Integer(1), RawValue::Integer(0)],
            vec![RawValue::Integer(2020), RawValue::Integer(1), RawValue::Integer(1)],
            vec![RawValue::Integer(2021), RawValue::Null, RawValue::Integer(1)],
        ];
        raw
    }

    #[test]
    fn test_flag_summary() {
        let flags = vec!["Fall".to_string(), "Sports".to_string()];
        let summary = flag_summary(&summary_table(), "YearOfAttendance", &flags).unwrap();

        assert_eq!(summary.counts_by_year(), BTreeMap::from([(2020, 2), (2021, 1)]));
        assert_eq!(summary.years[&2020].flag_totals, vec![2.0, 1.0]);
        assert_eq!(
            summary.flag_totals(),
            vec![("Fall".to_string(), 2.0), ("Sports".to_string(), 2.0)]
        );
    }

    #[test]
    fn test_flag_summary_missing_column() {
        let flags = vec!["SelfHarm".to_string()];
        assert!(flag_summary(&summary_table(), "YearOfAttendance", &flags).is_err());
    }

    #[test]
    fn test_cross_tab_counts_unobserved_pairs_as_zero() {
        let mut raw = RawTable::new(vec!["YearOfAttendance".into(), "RecordingCountry".into()]);
        for (year, country) in [(2020, "DE"), (2020, "DE"), (2020, "FR"), (2021, "DE")] {
            raw.rows.push(vec![RawValue::Integer(year), RawValue::Text(country.into())]);
        }
        let ds = normalize(&raw, "YearOfAttendance").unwrap();
        let tab = cross_tab(&ds, "YearOfAttendance", "RecordingCountry").unwrap();

        assert_eq!(tab.years, vec![2020, 2021]);
        assert_eq!(tab.categories, vec!["DE", "FR"]);
        assert_eq!(tab.counts, vec![vec![2, 1], vec![1, 0]]);
        assert_eq!(
            tab.column_means(),
            vec![("DE".to_string(), 1.5), ("FR".to_string(), 0.5)]
        );
        assert_eq!(tab.series()[1].1, vec![[2020.0, 1.0], [2021.0, 0.0]]);
    }

    #[test]
    fn test_cross_tab_rejects_wrong_columns() {
        let mut raw = RawTable::new(vec!["YearOfAttendance".into(), "Intent".into()]);
        raw.rows.push(vec![RawValue::Integer(2020), RawValue::Text("Assault".into())]);
        let ds = normalize(&raw, "YearOfAttendance").unwrap();

        assert!(cross_tab(&ds, "Intent", "YearOfAttendance").is_err());
        assert!(cross_tab(&ds, "YearOfAttendance", "Sex").is_err());
    }
}
