use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};

use super::model::RawTable;
use super::summary::YearSummary;

/// Scale of the incidence rate: injuries per 1000 inhabitants.
pub const PER_POPULATION: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct IncidenceRow {
    pub year: i64,
    pub count: Option<u64>,
    pub population: Option<f64>,
    /// `None` unless both count and a positive population are known.
    pub rate: Option<f64>,
}

/// Join yearly counts with the reference population and compute the rate
/// per 1000. Years present on one side only are kept without a rate; there
/// is no interpolation across missing years.
pub fn incidence_per_1000(counts: &BTreeMap<i64, u64>, population: &BTreeMap<i64, f64>) -> Vec<IncidenceRow> {
    let years: BTreeSet<i64> = counts.keys().chain(population.keys()).copied().collect();
    years
        .into_iter()
        .map(|year| {
            let count = counts.get(&year).copied();
            let population = population.get(&year).copied();
            let rate = match (count, population) {
                (Some(c), Some(p)) if p > 0.0 => Some(c as f64 * PER_POPULATION / p),
                _ => None,
            };
            IncidenceRow {
                year,
                count,
                population,
                rate,
            }
        })
        .collect()
}

/// Sum the reference population per year. Rows with a missing population
/// are skipped; a year that is not an integer is an error.
pub fn population_by_year(raw: &RawTable, year_col: &str, population_col: &str) -> Result<BTreeMap<i64, f64>> {
    let year_idx = raw
        .column_index(year_col)
        .with_context(|| format!("reference population: missing column '{year_col}'"))?;
    let pop_idx = raw
        .column_index(population_col)
        .with_context(|| format!("reference population: missing column '{population_col}'"))?;

    let mut out = BTreeMap::new();
    for (row_no, row) in raw.rows.iter().enumerate() {
        let year = row[year_idx]
            .as_i64()
            .with_context(|| format!("reference population row {row_no}: '{}' is not a year", row[year_idx]))?;
        if let Some(pop) = row[pop_idx].as_f64() {
            *out.entry(year).or_insert(0.0) += pop;
        }
    }
    Ok(out)
}

/// Average annual incidence per injury type: each flag's total over all
/// years divided by the total reference population, per 1000.
pub fn type_incidence(summary: &YearSummary, total_population: f64) -> Vec<(String, Option<f64>)> {
    summary
        .flag_totals()
        .into_iter()
        .map(|(flag, total)| {
            let rate = (total_population > 0.0).then(|| total * PER_POPULATION / total_population);
            (flag, rate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RawValue;
    use crate::data::summary::YearRow;

    #[test]
    fn test_rate_per_1000_and_missing_years() {
        let counts = BTreeMap::from([(2020, 100), (2021, 40)]);
        let population = BTreeMap::from([(2019, 10_000.0), (2020, 50_000.0)]);

        let rows = incidence_per_1000(&counts, &population);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].year, 2019);
        assert_eq!(rows[0].rate, None);
        assert_eq!(rows[1].rate, Some(2.0));
        assert_eq!(rows[2].year, 2021);
        assert_eq!(rows[2].count, Some(40));
        assert_eq!(rows[2].rate, None);
    }

    #[test]
    fn test_zero_population_has_no_rate() {
        let rows = incidence_per_1000(&BTreeMap::from([(2020, 5)]), &BTreeMap::from([(2020, 0.0)]));
        assert_eq!(rows[0].rate, None);
    }

    #[test]
    fn test_population_is_summed_per_year() {
        let mut raw = RawTable::new(vec![
            "YearOfAttendance".into(),
            "RecordingCountry".into(),
            "ReferencePopulation".into(),
        ]);
        raw.rows = vec![
            vec![RawValue::Integer(2020), RawValue::Text("DE".into()), RawValue::Integer(30_000)],
            vec![RawValue::Integer(2020), RawValue::Text("FR".into()), RawValue::Float(20_000.0)],
            vec![RawValue::Integer(2021), RawValue::Text("DE".into()), RawValue::Null],
        ];

        let pop = population_by_year(&raw, "YearOfAttendance", "ReferencePopulation").unwrap();
        assert_eq!(pop, BTreeMap::from([(2020, 50_000.0)]));
        assert!(population_by_year(&raw, "Year", "ReferencePopulation").is_err());
    }

    #[test]
    fn test_type_incidence() {
        let summary = YearSummary {
            flags: vec!["Fall".into(), "Sports".into()],
            years: BTreeMap::from([
                (2020, YearRow { n: 3, flag_totals: vec![10.0, 5.0] }),
                (2021, YearRow { n: 2, flag_totals: vec![10.0, 0.0] }),
            ]),
        };
        let rates = type_incidence(&summary, 10_000.0);
        assert_eq!(rates, vec![("Fall".to_string(), Some(2.0)), ("Sports".to_string(), Some(0.5))]);
        assert_eq!(type_incidence(&summary, 0.0)[0].1, None);
    }
}
