use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::state::{AppState, MortalityPage, Page};

// ---------------------------------------------------------------------------
// Left side panel – page navigation and mortality filters
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("European Injury Database");
    ui.separator();

    for page in Page::ALL {
        if ui.selectable_label(state.page == page, page.title()).clicked() {
            state.page = page;
        }
    }

    if state.page != Page::Mortality {
        return;
    }
    ui.separator();

    // ---- Statistic type ----
    ui.strong("Select Statistic Type");
    let current = state.mortality_source();
    let mut picked = None;
    let current_label = state
        .config
        .mortality_sources
        .get(current)
        .map(|s| s.label.clone())
        .unwrap_or_default();
    egui::ComboBox::from_id_salt("statistic_type")
        .selected_text(current_label)
        .show_ui(ui, |ui: &mut Ui| {
            for (i, source) in state.config.mortality_sources.iter().enumerate() {
                if ui.selectable_label(i == current, source.label.as_str()).clicked() && i != current {
                    picked = Some(i);
                }
            }
        });
    if let Some(i) = picked {
        state.select_mortality_source(i);
    }

    if let Some(Ok(page)) = &mut state.mortality {
        ui.separator();
        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui: &mut Ui| mortality_filters(ui, page));
    }
}

fn mortality_filters(ui: &mut Ui, page: &mut MortalityPage) {
    ui.heading("Filters");

    // ---- Countries ----
    let n_selected = page.filter.countries.len();
    let n_total = page.options.countries.len();
    egui::CollapsingHeader::new(RichText::new(format!("Select countries  ({n_selected}/{n_total})")).strong())
        .id_salt("countries")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    page.filter.countries = page.options.countries.iter().cloned().collect();
                }
                if ui.small_button("None").clicked() {
                    page.filter.countries.clear();
                }
            });
            for country in &page.options.countries {
                let mut checked = page.filter.countries.contains(country);
                if ui.checkbox(&mut checked, country.as_str()).changed() {
                    if checked {
                        page.filter.countries.insert(country.clone());
                    } else {
                        page.filter.countries.remove(country);
                    }
                }
            }
        });

    // ---- Year range ----
    if let Some((lo, hi)) = page.options.years {
        ui.strong("Select year range");
        let (from, to) = &mut page.filter.years;
        ui.add(egui::Slider::new(from, lo..=hi).text("from"));
        ui.add(egui::Slider::new(to, lo..=hi).text("to"));
        if *from > *to {
            std::mem::swap(from, to);
        }
    }

    // ---- Sex ----
    ui.strong("Sex");
    let current = page.filter.sex.clone().unwrap_or_default();
    egui::ComboBox::from_id_salt("sex")
        .selected_text(current.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for sex in &page.options.sexes {
                if ui.selectable_label(current == *sex, sex.as_str()).clicked() {
                    page.filter.sex = Some(sex.clone());
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("Data", |ui: &mut Ui| {
            if ui.button("Reload").clicked() {
                log::info!("Reloading dashboard data");
                state.reload();
                ui.close_menu();
            }
            if ui.button("Reload page").clicked() {
                log::info!("Reloading {}", state.page.title());
                state.reload_page();
                ui.close_menu();
            }
            if ui.button("Clear cache").clicked() {
                log::info!("Clearing cached sources");
                state.clear_cache();
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(state.page.title());

        if let Some(summary) = page_summary(state) {
            ui.separator();
            ui.label(summary);
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

fn page_summary(state: &AppState) -> Option<String> {
    match state.page {
        Page::Home => state
            .home
            .as_ref()?
            .as_ref()
            .ok()
            .map(|p| format!("{} years", p.incidence.len())),
        Page::HomeLeisure | Page::Template => {
            let slot = if state.page == Page::Template {
                &state.template
            } else {
                &state.home_leisure
            };
            let page = slot.as_ref()?.as_ref().ok()?;
            Some(format!(
                "{} records, {} columns",
                page.dataset.len(),
                page.dataset.column_names().len()
            ))
        }
        Page::Mortality => state
            .mortality
            .as_ref()?
            .as_ref()
            .ok()
            .map(|p| format!("{} records", p.records.len())),
    }
}
