use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::pivot::MAX_PIVOT_COLUMNS;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "IDB_DASHBOARD_CONFIG";
/// Configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "idb-dashboard.json";

/// One WHO statistic type and its spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalitySource {
    pub label: String,
    pub file: String,
}

impl MortalitySource {
    fn new(label: &str, file: &str) -> Self {
        Self {
            label: label.to_string(),
            file: file.to_string(),
        }
    }
}

/// Data locations and dashboard defaults.
///
/// Every field is optional in the JSON file; missing fields take the
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    /// MDS extract used by the Home page summary.
    pub summary_file: String,
    /// Full MDS extract, filtered by `HomeLeisure`.
    pub mds_file: String,
    /// MDS extract of the stable countries, used by the template page.
    pub stable_countries_file: String,
    pub reference_population_file: String,
    pub mortality_dir: PathBuf,
    pub mortality_sheet: String,
    pub mortality_sources: Vec<MortalitySource>,
    pub year_column: String,
    pub population_column: String,
    pub injury_type_flags: Vec<String>,
    pub home_leisure_flag: String,
    pub home_leisure_columns: Vec<String>,
    pub default_pivot_columns: Vec<String>,
    pub max_pivot_columns: usize,
    pub default_countries: Vec<String>,
    pub default_years: (i64, i64),
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            summary_file: "mds dashboard random.csv".into(),
            mds_file: "mds dashboard.csv".into(),
            stable_countries_file: "MDS 2018-2022 stable countries.csv".into(),
            reference_population_file: "reference population.csv".into(),
            mortality_dir: PathBuf::from("."),
            mortality_sheet: "Tabelle1".into(),
            mortality_sources: vec![
                MortalitySource::new("Road Traffic Accidents", "WHO_Road_Traffic_Injuries_Europe.xlsx"),
                MortalitySource::new("Poisonings", "WHO_Poisonings_Europe.xlsx"),
                MortalitySource::new("Falls", "WHO_Falls_Europe.xlsx"),
                MortalitySource::new("Fires", "WHO_Fires_Europe.xlsx"),
                MortalitySource::new("Drownings", "WHO_Drownings_Europe.xlsx"),
                MortalitySource::new("Mechanical Forces", "WHO_Mechanical_Forces_Europe.xlsx"),
                MortalitySource::new("Natural Disasters", "WHO_Natural_Disasters_Europe.xlsx"),
                MortalitySource::new(
                    "Other Unintentional Injuries",
                    "WHO_Other_Unintentional_Injuries_Europe.xlsx",
                ),
            ],
            year_column: "YearOfAttendance".into(),
            population_column: "ReferencePopulation".into(),
            injury_type_flags: strings(&[
                "HomeLeisure",
                "RoadTraffic",
                "Fall",
                "Sports",
                "PaidWork",
                "SelfHarm",
                "Assault",
            ]),
            home_leisure_flag: "HomeLeisure".into(),
            home_leisure_columns: strings(&[
                "RecordingCountry",
                "AgeCategoryOfPatient",
                "SexOfPatient",
                "CountryOfPermanentResidence",
                "MonthOfAttendance",
                "YearOfAttendance",
                "TreatmentAndFollowUp",
                "TypeOfInjury1",
                "TypeOfInjury2",
                "PartOfTheBodyInjured1",
                "PartOfTheBodyInjured2",
                "Intent",
                "PlaceOfOccurrence",
                "MechanismOfInjury",
                "ActivityWhenInjured",
            ]),
            default_pivot_columns: strings(&["RecordingCountry", "SexOfPatient", "AgeCategoryOfPatient"]),
            max_pivot_columns: MAX_PIVOT_COLUMNS,
            default_countries: strings(&["Austria", "Germany", "Sweden"]),
            default_years: (2000, 2020),
        }
    }
}

impl DashboardConfig {
    /// Load from `$IDB_DASHBOARD_CONFIG`, else `./idb-dashboard.json`, else
    /// use the defaults. A file that exists but does not parse is an error.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE)),
            None => {
                log::info!("No {CONFIG_FILE} found, using default configuration");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn mortality_path(&self, source: &MortalitySource) -> PathBuf {
        self.mortality_dir.join(&source.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idb-dashboard.json");
        std::fs::write(&path, r#"{ "data_dir": "/srv/idb", "max_pivot_columns": 3 }"#).unwrap();

        let config = DashboardConfig::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/idb"));
        assert_eq!(config.max_pivot_columns, 3);
        assert_eq!(config.year_column, "YearOfAttendance");
        assert_eq!(config.mortality_sources.len(), 8);
        assert_eq!(
            config.data_path("reference population.csv"),
            PathBuf::from("/srv/idb/reference population.csv")
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ data_dir").unwrap();
        assert!(DashboardConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_defaults_match_pivot_cap() {
        let config = DashboardConfig::default();
        assert_eq!(config.max_pivot_columns, 4);
        assert!(config.default_pivot_columns.len() <= config.max_pivot_columns);
    }
}
