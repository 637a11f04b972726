use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::config::DashboardConfig;
use crate::data::export;
use crate::data::mortality::{self, MortalityFilter, MortalityRecord};
use crate::state::{AppState, HomePage, MdsPage, MortalityPage, Page};

use super::plot::{bar_chart, grouped_bar_chart, line_chart};
use super::table::{download_button, pivot_section};

// ---------------------------------------------------------------------------
// Central panel: the selected page
// ---------------------------------------------------------------------------

/// Render the current page in the central panel, loading it on first view.
pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    state.ensure_loaded();

    let AppState {
        config,
        page,
        home,
        home_leisure,
        template,
        mortality,
        status_message,
        ..
    } = state;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| match page {
            Page::Home => match home {
                Some(Ok(p)) => home_page(ui, p, status_message),
                Some(Err(msg)) => load_error(ui, msg),
                None => {}
            },
            Page::HomeLeisure => match home_leisure {
                Some(Ok(p)) => home_leisure_page(ui, p, config, status_message),
                Some(Err(msg)) => load_error(ui, msg),
                None => {}
            },
            Page::Template => match template {
                Some(Ok(p)) => template_page(ui, p, config, status_message),
                Some(Err(msg)) => load_error(ui, msg),
                None => {}
            },
            Page::Mortality => match mortality {
                Some(Ok(p)) => mortality_page(ui, p, config),
                Some(Err(msg)) => load_error(ui, msg),
                None => {}
            },
        });
}

fn load_error(ui: &mut Ui, msg: &str) {
    ui.heading("Data could not be loaded");
    ui.colored_label(Color32::RED, msg);
    ui.label("Fix the source file and use Data → Reload.");
}

fn report(status: &mut Option<String>, result: anyhow::Result<()>) {
    if let Err(e) = result {
        log::error!("Download failed: {e:#}");
        *status = Some(format!("Error: {e:#}"));
    }
}

// ---------------------------------------------------------------------------
// Home
// ---------------------------------------------------------------------------

fn home_page(ui: &mut Ui, page: &HomePage, status: &mut Option<String>) {
    ui.heading("Welcome to the European Injury Database");
    ui.colored_label(
        Color32::YELLOW,
        "⚠ This dashboard shows random data to showcase the functionality of the dashboard. \
         The actual MDS will be available in the near future.",
    );
    ui.add_space(8.0);

    ui.label("Incidence of injuries in the IDB-MDS per year, only includes selected stable countries and years.");
    let points: Vec<[f64; 2]> = page
        .incidence
        .iter()
        .filter_map(|row| row.rate.map(|rate| [row.year as f64, rate]))
        .collect();
    line_chart(
        ui,
        "incidence_per_year",
        "Year",
        "Incidence per 1000 citizens",
        &[("Incidence per 1000".to_string(), points)],
    );

    ui.label("Average annual injuries according to type.");
    let bars: Vec<(String, f64)> = page
        .type_rates
        .iter()
        .filter_map(|(flag, rate)| rate.map(|r| (flag.clone(), r)))
        .collect();
    bar_chart(ui, "incidence_by_type", "Type of injury", "Incidence per 1000 citizens", &bars, false);

    let reference = &page.reference;
    report(
        status,
        download_button(ui, "Download reference population", "reference population.csv", || {
            export::raw_table_to_csv(reference)
        }),
    );
}

// ---------------------------------------------------------------------------
// MDS pages
// ---------------------------------------------------------------------------

fn category_selector(ui: &mut Ui, id: &str, categories: &[String], current: &mut String) -> bool {
    let mut changed = false;
    egui::ComboBox::from_id_salt(id)
        .selected_text(current.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for cat in categories {
                if ui.selectable_label(current == cat, cat.as_str()).clicked() && current != cat {
                    *current = cat.clone();
                    changed = true;
                }
            }
        });
    changed
}

fn home_leisure_page(ui: &mut Ui, page: &mut MdsPage, config: &DashboardConfig, status: &mut Option<String>) {
    ui.heading("Home and leisure injuries");

    ui.add_space(8.0);
    ui.heading("Injuries by time");
    if category_selector(ui, "linegraph_category", &page.categories, &mut page.line_category) {
        page.refresh_charts(&config.year_column);
    }
    if let Some(tab) = &page.line {
        line_chart(ui, "injuries_by_time", "Year", "Injuries", &tab.series());
    }

    ui.add_space(8.0);
    ui.heading("Injuries by category");
    let mut bar_category = page.bar_category.clone().unwrap_or_default();
    if category_selector(ui, "barchart_category", &page.categories, &mut bar_category) {
        page.bar_category = Some(bar_category);
        page.refresh_charts(&config.year_column);
    }
    if let Some(tab) = &page.bar {
        bar_chart(ui, "injuries_by_category", &tab.category_column, "Average injuries per year", &tab.column_means(), false);
    }

    ui.add_space(8.0);
    pivot_section(ui, page, config.max_pivot_columns, status);
}

fn template_page(ui: &mut Ui, page: &mut MdsPage, config: &DashboardConfig, status: &mut Option<String>) {
    ui.heading("Dashboard template");

    ui.add_space(8.0);
    ui.heading("Incidence rate by year");
    ui.label("Placeholder for line graph.");
    if let Some(tab) = &page.line {
        line_chart(ui, "template_by_year", "Year", "Injuries", &tab.series());
    }

    ui.add_space(8.0);
    ui.heading("Incidence rate by other variable");
    ui.label("Placeholder for bar graph.");

    ui.add_space(8.0);
    pivot_section(ui, page, config.max_pivot_columns, status);
}

// ---------------------------------------------------------------------------
// WHO mortality
// ---------------------------------------------------------------------------

fn mortality_page(ui: &mut Ui, page: &MortalityPage, config: &DashboardConfig) {
    let label = config
        .mortality_sources
        .get(page.source)
        .map(|s| s.label.as_str())
        .unwrap_or("Mortality");
    let rows = mortality::filter_records(&page.records, &page.filter);

    kpi_row(ui, &rows);

    ui.add_space(8.0);
    ui.heading("📈 Deaths Over Time");
    let series: Vec<(String, Vec<[f64; 2]>)> = mortality::deaths_over_time(&rows)
        .into_iter()
        .map(|(country, by_year)| {
            let points = by_year.into_iter().map(|(y, n)| [y as f64, n]).collect();
            (country, points)
        })
        .collect();
    ui.label(format!("{label} Deaths Over Time"));
    line_chart(ui, "mortality_trend", "Year", "Number of Deaths", &series);

    ui.add_space(8.0);
    ui.heading("🌎 Country Comparison (Death Rate in Latest Year)");
    latest_year_chart(ui, &rows, &page.filter);

    ui.add_space(8.0);
    ui.heading("🧓 Age Distribution of Deaths by Country");
    let ages = mortality::age_distribution(&rows);
    if ages.countries.len() == 1 {
        ui.label(format!("Deaths by Age Group in {}", ages.countries[0]));
    } else {
        ui.label("Deaths by Age Group and Country");
    }
    grouped_bar_chart(
        ui,
        "mortality_age",
        "Number of Deaths",
        &ages.age_groups,
        &ages.countries,
        &ages.deaths,
    );

    ui.add_space(8.0);
    ui.small("Source: WHO Mortality Database");
}

fn kpi_row(ui: &mut Ui, rows: &[&MortalityRecord]) {
    let k = mortality::kpis(rows);
    ui.columns(3, |cols: &mut [Ui]| {
        kpi(&mut cols[0], "💀 Total Deaths", group_thousands(k.total_deaths));
        kpi(
            &mut cols[1],
            "📊 Avg. Death Rate / 100,000",
            k.avg_death_rate.map_or_else(|| "–".to_string(), |r| format!("{r:.2}")),
        );
        kpi(
            &mut cols[2],
            "🗳 Year with Most Deaths",
            k.peak_year.map_or_else(|| "–".to_string(), |y| y.to_string()),
        );
    });
}

fn kpi(ui: &mut Ui, title: &str, value: String) {
    ui.label(title);
    ui.label(RichText::new(value).size(28.0).strong());
}

fn latest_year_chart(ui: &mut Ui, rows: &[&MortalityRecord], filter: &MortalityFilter) {
    let year = filter.latest_year();
    ui.label(format!("Death Rate in {year}"));
    let bars = mortality::death_rate_by_country(rows, year);
    bar_chart(ui, "mortality_latest", "Death Rate per 100,000", "Country", &bars, true);
}

/// `1234567` → `1,234,567`
fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-4500), "-4,500");
    }
}
