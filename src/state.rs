use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::config::DashboardConfig;
use crate::data::filter::FilterSelection;
use crate::data::incidence::{IncidenceRow, incidence_per_1000, population_by_year, type_incidence};
use crate::data::loader::{LoadSpec, RowPredicate, load_source};
use crate::data::model::{Dataset, RawTable};
use crate::data::mortality::{self, MortalityFilter, MortalityOptions, MortalityRecord};
use crate::data::normalize::normalize;
use crate::data::pivot::{PivotSelection, PivotTable, SelectionError, pivot_counts};
use crate::data::store::DataStore;
use crate::data::summary::{CrossTab, cross_tab, flag_summary};

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    HomeLeisure,
    Template,
    Mortality,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Home, Page::HomeLeisure, Page::Template, Page::Mortality];

    pub fn title(self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::HomeLeisure => "Home and leisure injuries",
            Page::Template => "Dashboard template",
            Page::Mortality => "WHO mortality",
        }
    }
}

/// A page's loaded content, or the message of the load failure.
pub type Slot<T> = Option<Result<T, String>>;

// ---------------------------------------------------------------------------
// Pivot section state
// ---------------------------------------------------------------------------

/// Column choice, filters and last result of a pivot table section.
pub struct PivotState {
    pub columns: Vec<String>,
    pub filters: FilterSelection,
    pub result: Option<Result<PivotTable, SelectionError>>,
}

impl PivotState {
    /// Start from the default columns that exist in the dataset.
    pub fn new(dataset: &Dataset, defaults: &[String], max_columns: usize) -> Self {
        let columns: Vec<String> = defaults
            .iter()
            .filter(|c| dataset.column_index(c).is_some())
            .take(max_columns)
            .cloned()
            .collect();
        let mut state = Self {
            filters: FilterSelection::all_for(dataset, &columns),
            columns,
            result: None,
        };
        state.recompute(dataset, max_columns);
        state
    }

    /// Add or remove a column. Adding beyond `max_columns` is refused.
    pub fn toggle_column(&mut self, dataset: &Dataset, column: &str, max_columns: usize) -> bool {
        if let Some(pos) = self.columns.iter().position(|c| c == column) {
            self.columns.remove(pos);
        } else if self.columns.len() < max_columns {
            self.columns.push(column.to_string());
            self.filters.select_all(dataset, column);
        } else {
            return false;
        }
        true
    }

    /// Validate the selection and rebuild the pivot from scratch.
    pub fn recompute(&mut self, dataset: &Dataset, max_columns: usize) {
        self.filters.retain_columns(&self.columns);
        self.result = Some(
            PivotSelection::new(&self.columns, dataset, max_columns)
                .map(|selection| pivot_counts(dataset, &selection, &self.filters)),
        );
    }
}

// ---------------------------------------------------------------------------
// Page states
// ---------------------------------------------------------------------------

pub struct HomePage {
    pub incidence: Vec<IncidenceRow>,
    pub type_rates: Vec<(String, Option<f64>)>,
    pub reference: Arc<RawTable>,
}

/// An MDS page: a category line chart, an optional category bar chart and a
/// pivot table.
pub struct MdsPage {
    pub dataset: Arc<Dataset>,
    pub categories: Vec<String>,
    pub line_category: String,
    pub line: Option<CrossTab>,
    pub bar_category: Option<String>,
    pub bar: Option<CrossTab>,
    pub pivot: PivotState,
}

impl MdsPage {
    fn new(dataset: Arc<Dataset>, config: &DashboardConfig, with_bar_chart: bool) -> Self {
        let categories = dataset.categorical_columns();
        let line_category = categories
            .iter()
            .find(|c| config.default_pivot_columns.contains(*c))
            .or_else(|| categories.first())
            .cloned()
            .unwrap_or_default();
        let bar_category = with_bar_chart.then(|| line_category.clone());
        let pivot = PivotState::new(&dataset, &config.default_pivot_columns, config.max_pivot_columns);
        let mut page = Self {
            dataset,
            categories,
            line_category,
            line: None,
            bar_category,
            bar: None,
            pivot,
        };
        page.refresh_charts(&config.year_column);
        page
    }

    pub fn refresh_charts(&mut self, year_column: &str) {
        self.line = chart_tab(&self.dataset, year_column, &self.line_category);
        self.bar = self
            .bar_category
            .as_deref()
            .and_then(|cat| chart_tab(&self.dataset, year_column, cat));
    }
}

fn chart_tab(dataset: &Dataset, year_column: &str, category: &str) -> Option<CrossTab> {
    match cross_tab(dataset, year_column, category) {
        Ok(tab) => Some(tab),
        Err(e) => {
            log::warn!("No chart for '{category}': {e}");
            None
        }
    }
}

pub struct MortalityPage {
    pub source: usize,
    pub records: Arc<Vec<MortalityRecord>>,
    pub options: MortalityOptions,
    pub filter: MortalityFilter,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,
    pub page: Page,

    tables: DataStore<RawTable>,
    datasets: DataStore<Dataset>,
    mortality_tables: DataStore<Vec<MortalityRecord>>,

    pub home: Slot<HomePage>,
    pub home_leisure: Slot<MdsPage>,
    pub template: Slot<MdsPage>,
    pub mortality: Slot<MortalityPage>,
    /// Selected statistic type, kept when its source fails to load.
    mortality_source: usize,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            page: Page::Home,
            tables: DataStore::default(),
            datasets: DataStore::default(),
            mortality_tables: DataStore::default(),
            home: None,
            home_leisure: None,
            template: None,
            mortality: None,
            mortality_source: 0,
            status_message: None,
        }
    }

    /// Load the current page's data unless it is already loaded (or failed).
    pub fn ensure_loaded(&mut self) {
        match self.page {
            Page::Home if self.home.is_none() => {
                self.home = Some(self.load_home().map_err(|e| report("Home", &e)));
            }
            Page::HomeLeisure if self.home_leisure.is_none() => {
                let spec = LoadSpec::new(self.config.data_path(&self.config.mds_file))
                    .with_columns(self.config.home_leisure_columns.clone())
                    .with_predicate(RowPredicate::FlagEquals(self.config.home_leisure_flag.clone(), 1));
                self.home_leisure = Some(
                    self.load_mds(&spec, true)
                        .map_err(|e| report("Home and leisure", &e)),
                );
            }
            Page::Template if self.template.is_none() => {
                let spec = LoadSpec::new(self.config.data_path(&self.config.stable_countries_file));
                self.template = Some(self.load_mds(&spec, false).map_err(|e| report("Template", &e)));
            }
            Page::Mortality if self.mortality.is_none() => {
                self.select_mortality_source(self.mortality_source);
            }
            _ => {}
        }
    }

    /// Forget page contents so they are rebuilt; unchanged files come from
    /// the store, changed files are re-read.
    pub fn reload(&mut self) {
        self.home = None;
        self.home_leisure = None;
        self.template = None;
        self.mortality = None;
        self.status_message = None;
    }

    /// Drop every cached source as well.
    pub fn clear_cache(&mut self) {
        if !self.tables.is_empty() || !self.datasets.is_empty() || !self.mortality_tables.is_empty() {
            log::info!(
                "Dropping {} cached sources",
                self.tables.len() + self.datasets.len() + self.mortality_tables.len()
            );
        }
        self.tables.clear();
        self.datasets.clear();
        self.mortality_tables.clear();
        self.reload();
    }

    /// Re-read the current page's source files, even if unchanged on disk.
    pub fn reload_page(&mut self) {
        for path in self.page_sources() {
            self.tables.invalidate(&path);
            self.datasets.invalidate(&path);
            self.mortality_tables.invalidate(&path);
        }
        self.status_message = None;
        match self.page {
            Page::Home => self.home = None,
            Page::HomeLeisure => self.home_leisure = None,
            Page::Template => self.template = None,
            Page::Mortality => {
                let source = self.mortality_source();
                self.select_mortality_source(source);
            }
        }
    }

    /// Index of the statistic type shown on the mortality page.
    pub fn mortality_source(&self) -> usize {
        self.mortality_source
    }

    fn page_sources(&self) -> Vec<PathBuf> {
        let config = &self.config;
        match self.page {
            Page::Home => vec![
                config.data_path(&config.summary_file),
                config.data_path(&config.reference_population_file),
            ],
            Page::HomeLeisure => vec![config.data_path(&config.mds_file)],
            Page::Template => vec![config.data_path(&config.stable_countries_file)],
            Page::Mortality => config
                .mortality_sources
                .get(self.mortality_source())
                .map(|source| config.mortality_path(source))
                .into_iter()
                .collect(),
        }
    }

    pub fn select_mortality_source(&mut self, source: usize) {
        self.mortality_source = source;
        self.mortality = Some(self.load_mortality(source).map_err(|e| report("Mortality", &e)));
    }

    fn load_home(&mut self) -> Result<HomePage> {
        let year = self.config.year_column.clone();
        let flags = self.config.injury_type_flags.clone();

        let mut columns = vec![year.clone()];
        columns.extend(flags.iter().cloned());
        let summary_spec = LoadSpec::new(self.config.data_path(&self.config.summary_file)).with_columns(columns);
        let summary_table = self.tables.get_or_load(&summary_spec, load_source)?;
        let summary = flag_summary(&summary_table, &year, &flags)?;

        let ref_spec = LoadSpec::new(self.config.data_path(&self.config.reference_population_file));
        let reference = self.tables.get_or_load(&ref_spec, load_source)?;
        let population = population_by_year(&reference, &year, &self.config.population_column)?;

        let total_population: f64 = population.values().sum();
        Ok(HomePage {
            incidence: incidence_per_1000(&summary.counts_by_year(), &population),
            type_rates: type_incidence(&summary, total_population),
            reference,
        })
    }

    fn load_mds(&mut self, spec: &LoadSpec, with_bar_chart: bool) -> Result<MdsPage> {
        let year = self.config.year_column.clone();
        let dataset = self.datasets.get_or_load(spec, |spec| {
            let raw = load_source(spec)?;
            Ok(normalize(&raw, &year)?)
        })?;
        log::info!(
            "{}: {} records, columns {:?}",
            spec.path.display(),
            dataset.len(),
            dataset.column_names()
        );
        Ok(MdsPage::new(dataset, &self.config, with_bar_chart))
    }

    fn load_mortality(&mut self, source: usize) -> Result<MortalityPage> {
        let entry = self
            .config
            .mortality_sources
            .get(source)
            .ok_or_else(|| anyhow::anyhow!("no mortality source #{source} configured"))?;
        let spec = mortality::load_spec(&self.config.mortality_path(entry), &self.config.mortality_sheet);
        let records = self.mortality_tables.get_or_load(&spec, |spec| {
            let raw = load_source(spec)?;
            Ok(mortality::records_from_table(&raw)?)
        })?;

        let options = mortality::options(&records);
        let filter = MortalityFilter::default_for(&options, &self.config.default_countries, self.config.default_years);
        Ok(MortalityPage {
            source,
            records,
            options,
            filter,
        })
    }
}

fn report(page: &str, err: &anyhow::Error) -> String {
    log::error!("Failed to load {page} data: {err:#}");
    format!("Error: {err:#}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{RawValue, RawTable};

    fn dataset() -> Dataset {
        let mut raw = RawTable::new(vec!["RecordingCountry".into(), "YearOfAttendance".into(), "SexOfPatient".into()]);
        for (c, y, s) in [("DE", 2020, "F"), ("DE", 2021, "M"), ("FR", 2021, "F")] {
            raw.rows.push(vec![RawValue::Text(c.into()), RawValue::Integer(y), RawValue::Text(s.into())]);
        }
        normalize(&raw, "YearOfAttendance").unwrap()
    }

    #[test]
    fn test_pivot_state_defaults_skip_unknown_columns() {
        let ds = dataset();
        let defaults = vec!["RecordingCountry".to_string(), "AgeCategoryOfPatient".to_string()];
        let state = PivotState::new(&ds, &defaults, 4);

        assert_eq!(state.columns, vec!["RecordingCountry"]);
        let table = state.result.unwrap().unwrap();
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn test_pivot_state_empty_selection_halts() {
        let ds = dataset();
        let mut state = PivotState::new(&ds, &["SexOfPatient".to_string()], 4);
        assert!(state.toggle_column(&ds, "SexOfPatient", 4));
        state.recompute(&ds, 4);

        assert_eq!(state.result, Some(Err(SelectionError::Empty)));
    }

    #[test]
    fn test_pivot_state_caps_columns() {
        let ds = dataset();
        let mut state = PivotState::new(&ds, &["SexOfPatient".to_string()], 2);
        assert!(state.toggle_column(&ds, "RecordingCountry", 2));
        assert!(!state.toggle_column(&ds, "YearOfAttendance", 2));
        assert_eq!(state.columns.len(), 2);
    }

    #[test]
    fn test_load_failure_is_reported_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig {
            data_dir: dir.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        let mut state = AppState::new(config);
        state.page = Page::Template;
        state.ensure_loaded();

        match &state.template {
            Some(Err(msg)) => assert!(msg.contains("stable countries")),
            _ => panic!("expected a load error"),
        }
    }

    #[test]
    fn test_template_page_loads_and_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("MDS 2018-2022 stable countries.csv"),
            "RecordingCountry,SexOfPatient,AgeCategoryOfPatient,YearOfAttendance\n\
             DE,F,0-4,2020\nDE,M,0-4,2021\nFR,F,5-14,2021\n",
        )
        .unwrap();
        let config = DashboardConfig {
            data_dir: dir.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        let mut state = AppState::new(config);
        state.page = Page::Template;
        state.ensure_loaded();

        let first = match &state.template {
            Some(Ok(page)) => Arc::clone(&page.dataset),
            _ => panic!("template page should load"),
        };
        let page = state.template.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(page.line_category, "RecordingCountry");
        assert!(page.bar.is_none());
        assert_eq!(page.pivot.columns.len(), 3);

        state.reload();
        state.ensure_loaded();
        let second = match &state.template {
            Some(Ok(page)) => Arc::clone(&page.dataset),
            _ => panic!("template page should reload"),
        };
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reload_page_rereads_unchanged_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("MDS 2018-2022 stable countries.csv"),
            "RecordingCountry,YearOfAttendance\nDE,2020\nFR,2021\n",
        )
        .unwrap();
        let config = DashboardConfig {
            data_dir: dir.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        let mut state = AppState::new(config);
        state.page = Page::Template;
        state.ensure_loaded();
        let first = match &state.template {
            Some(Ok(page)) => Arc::clone(&page.dataset),
            _ => panic!("template page should load"),
        };

        state.reload_page();
        assert!(state.template.is_none());
        state.ensure_loaded();
        let second = match &state.template {
            Some(Ok(page)) => Arc::clone(&page.dataset),
            _ => panic!("template page should reload"),
        };
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_mortality_source_stays_selected() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig {
            mortality_dir: dir.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        let mut state = AppState::new(config);
        state.page = Page::Mortality;
        state.select_mortality_source(5);

        assert!(matches!(state.mortality, Some(Err(_))));
        assert_eq!(state.mortality_source(), 5);
        assert_eq!(
            state.page_sources(),
            vec![dir.path().join("WHO_Mechanical_Forces_Europe.xlsx")]
        );

        state.reload_page();
        assert_eq!(state.mortality_source(), 5);
        state.reload();
        state.ensure_loaded();
        assert_eq!(state.mortality_source(), 5);
    }
}
