//! WHO mortality tables: one spreadsheet per statistic type, filtered by
//! country, year range and sex.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;

use super::loader::{LoadSpec, RowPredicate};
use super::model::RawTable;

pub const COUNTRY: &str = "Country Name";
pub const YEAR: &str = "Year";
pub const SEX: &str = "Sex";
pub const NUMBER: &str = "Number";
pub const DEATH_RATE: &str = "Death rate per 100 000 population";
pub const AGE_GROUP: &str = "Age Group";

const COLUMNS: [&str; 6] = [COUNTRY, YEAR, SEX, NUMBER, DEATH_RATE, AGE_GROUP];

#[derive(Error, Debug, PartialEq)]
pub enum MortalityError {
    #[error("mortality table is missing column '{0}'")]
    MissingColumn(String),
    #[error("row {row}, column '{column}': invalid value '{value}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
}

/// The load description of a WHO table: fixed columns, rows with a known
/// `Number` only.
pub fn load_spec(path: &Path, sheet: &str) -> LoadSpec {
    LoadSpec::new(path)
        .with_sheet(sheet)
        .with_columns(COLUMNS)
        .with_predicate(RowPredicate::NotNull(NUMBER.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct MortalityRecord {
    pub country: String,
    pub year: i64,
    pub sex: String,
    pub number: f64,
    pub death_rate: Option<f64>,
    pub age_group: String,
}

/// Convert a loaded WHO table into records. Any cell that does not cast is
/// an error.
pub fn records_from_table(raw: &RawTable) -> Result<Vec<MortalityRecord>, MortalityError> {
    let idx = |name: &str| {
        raw.column_index(name)
            .ok_or_else(|| MortalityError::MissingColumn(name.to_string()))
    };
    let (c_country, c_year, c_sex, c_number, c_rate, c_age) = (
        idx(COUNTRY)?,
        idx(YEAR)?,
        idx(SEX)?,
        idx(NUMBER)?,
        idx(DEATH_RATE)?,
        idx(AGE_GROUP)?,
    );

    raw.rows
        .iter()
        .enumerate()
        .map(|(row, cells)| {
            let invalid = |col: usize| MortalityError::InvalidValue {
                row,
                column: raw.columns[col].clone(),
                value: cells[col].to_string(),
            };
            let text = |col: usize| {
                let value = &cells[col];
                if value.is_null() {
                    Err(invalid(col))
                } else {
                    Ok(value.to_string())
                }
            };
            Ok(MortalityRecord {
                country: text(c_country)?,
                year: cells[c_year].as_i64().ok_or_else(|| invalid(c_year))?,
                sex: text(c_sex)?,
                number: cells[c_number].as_f64().ok_or_else(|| invalid(c_number))?,
                death_rate: match &cells[c_rate] {
                    v if v.is_null() => None,
                    v => Some(v.as_f64().ok_or_else(|| invalid(c_rate))?),
                },
                age_group: text(c_age)?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Values offered by the mortality sidebar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MortalityOptions {
    pub countries: Vec<String>,
    /// Inclusive year bounds of the data.
    pub years: Option<(i64, i64)>,
    /// Sexes in order of first appearance.
    pub sexes: Vec<String>,
}

pub fn options(records: &[MortalityRecord]) -> MortalityOptions {
    let countries: BTreeSet<&str> = records.iter().map(|r| r.country.as_str()).collect();
    let years = records
        .iter()
        .map(|r| r.year)
        .min()
        .zip(records.iter().map(|r| r.year).max());
    let mut sexes: Vec<String> = Vec::new();
    for r in records {
        if !sexes.contains(&r.sex) {
            sexes.push(r.sex.clone());
        }
    }
    MortalityOptions {
        countries: countries.into_iter().map(str::to_string).collect(),
        years,
        sexes,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MortalityFilter {
    pub countries: BTreeSet<String>,
    pub years: (i64, i64),
    pub sex: Option<String>,
}

impl MortalityFilter {
    /// Preferred countries that exist in the data, the preferred year range
    /// clamped to the data, and the first sex value.
    pub fn default_for(opts: &MortalityOptions, countries: &[String], years: (i64, i64)) -> Self {
        let countries = countries
            .iter()
            .filter(|c| opts.countries.contains(c))
            .cloned()
            .collect();
        let years = match opts.years {
            Some((lo, hi)) => (years.0.clamp(lo, hi), years.1.clamp(lo, hi)),
            None => years,
        };
        Self {
            countries,
            years,
            sex: opts.sexes.first().cloned(),
        }
    }

    pub fn admits(&self, r: &MortalityRecord) -> bool {
        self.countries.contains(&r.country)
            && (self.years.0..=self.years.1).contains(&r.year)
            && self.sex.as_ref().map_or(true, |s| *s == r.sex)
    }

    /// Latest year of the selected range.
    pub fn latest_year(&self) -> i64 {
        self.years.0.max(self.years.1)
    }
}

pub fn filter_records<'a>(records: &'a [MortalityRecord], filter: &MortalityFilter) -> Vec<&'a MortalityRecord> {
    records.iter().filter(|r| filter.admits(r)).collect()
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub total_deaths: i64,
    pub avg_death_rate: Option<f64>,
    /// Year with most deaths; the earliest on ties.
    pub peak_year: Option<i64>,
}

pub fn kpis(rows: &[&MortalityRecord]) -> Kpis {
    let total_deaths = rows.iter().map(|r| r.number).sum::<f64>() as i64;
    let rates: Vec<f64> = rows.iter().filter_map(|r| r.death_rate).collect();
    let avg_death_rate = (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64);

    let mut by_year: BTreeMap<i64, f64> = BTreeMap::new();
    for r in rows {
        *by_year.entry(r.year).or_insert(0.0) += r.number;
    }
    let mut peak_year: Option<(i64, f64)> = None;
    for (year, deaths) in by_year {
        if peak_year.map_or(true, |(_, best)| deaths > best) {
            peak_year = Some((year, deaths));
        }
    }

    Kpis {
        total_deaths,
        avg_death_rate,
        peak_year: peak_year.map(|(year, _)| year),
    }
}

/// Deaths per country and year.
pub fn deaths_over_time(rows: &[&MortalityRecord]) -> BTreeMap<String, BTreeMap<i64, f64>> {
    let mut out: BTreeMap<String, BTreeMap<i64, f64>> = BTreeMap::new();
    for r in rows {
        *out.entry(r.country.clone())
            .or_default()
            .entry(r.year)
            .or_insert(0.0) += r.number;
    }
    out
}

/// Mean death rate per country in `year`, ascending. Countries without a
/// known rate are left out.
pub fn death_rate_by_country(rows: &[&MortalityRecord], year: i64) -> Vec<(String, f64)> {
    let mut acc: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in rows.iter().filter(|r| r.year == year) {
        if let Some(rate) = r.death_rate {
            let e = acc.entry(r.country.as_str()).or_insert((0.0, 0));
            e.0 += rate;
            e.1 += 1;
        }
    }
    let mut out: Vec<(String, f64)> = acc
        .into_iter()
        .map(|(country, (sum, n))| (country.to_string(), sum / n as f64))
        .collect();
    out.sort_by(|a, b| a.1.total_cmp(&b.1));
    out
}

/// Deaths per country (rows) and age group (columns); absent cells are 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgeDistribution {
    pub countries: Vec<String>,
    pub age_groups: Vec<String>,
    /// `deaths[country_idx][age_group_idx]`
    pub deaths: Vec<Vec<f64>>,
}

pub fn age_distribution(rows: &[&MortalityRecord]) -> AgeDistribution {
    let countries: Vec<String> = rows
        .iter()
        .map(|r| r.country.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let age_groups: Vec<String> = rows
        .iter()
        .map(|r| r.age_group.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut deaths = vec![vec![0.0; age_groups.len()]; countries.len()];
    for r in rows {
        let (Ok(c), Ok(a)) = (
            countries.binary_search(&r.country),
            age_groups.binary_search(&r.age_group),
        ) else {
            continue;
        };
        deaths[c][a] += r.number;
    }

    AgeDistribution {
        countries,
        age_groups,
        deaths,
    }
}
