use std::sync::Arc;

use anyhow::Result;
use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::export;
use crate::data::filter::{ColumnFilter, ColumnOptions, cascade_options};
use crate::data::pivot::PivotTable;
use crate::state::MdsPage;

// ---------------------------------------------------------------------------
// Pivot section: column selector, filters, table, download
// ---------------------------------------------------------------------------

/// Render the pivot table section of an MDS page.
pub fn pivot_section(ui: &mut Ui, page: &mut MdsPage, max_columns: usize, status: &mut Option<String>) {
    let dataset = Arc::clone(&page.dataset);
    let mut changed = false;

    ui.heading("Pivot table");
    ui.label(format!("Select display columns (max {max_columns})"));
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for col in dataset.column_names() {
            let mut checked = page.pivot.columns.contains(col);
            let enabled = checked || page.pivot.columns.len() < max_columns;
            if ui.add_enabled(enabled, egui::Checkbox::new(&mut checked, col.as_str())).changed() {
                changed |= page.pivot.toggle_column(&dataset, col, max_columns);
            }
        }
    });

    // ---- Per-column filters, options narrowed by the columns before ----
    egui::CollapsingHeader::new("Filters")
        .id_salt("pivot_filters")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let filters = &mut page.pivot.filters;
            for (col, options) in cascade_options(&dataset, &page.pivot.columns, filters) {
                match options {
                    ColumnOptions::Labels(domain) => {
                        let n_total = domain.len();
                        let n_selected = match filters.get(&col) {
                            Some(ColumnFilter::Values(selected)) => {
                                domain.labels().iter().filter(|l| selected.contains(*l)).count()
                            }
                            _ => n_total,
                        };
                        egui::CollapsingHeader::new(RichText::new(format!("{col}  ({n_selected}/{n_total})")).strong())
                            .id_salt(&col)
                            .default_open(false)
                            .show(ui, |ui: &mut Ui| {
                                ui.horizontal(|ui: &mut Ui| {
                                    if ui.small_button("All").clicked() {
                                        filters.add_values(&col, domain.labels().iter().cloned());
                                        changed = true;
                                    }
                                    if ui.small_button("None").clicked() {
                                        filters.select_none(&col);
                                        changed = true;
                                    }
                                });
                                for label in domain.labels() {
                                    let mut checked = match filters.get(&col) {
                                        Some(ColumnFilter::Values(selected)) => selected.contains(label),
                                        _ => true,
                                    };
                                    if ui.checkbox(&mut checked, label.as_str()).changed() {
                                        filters.toggle_value(&col, label);
                                        changed = true;
                                    }
                                }
                            });
                    }
                    ColumnOptions::Years(years) => {
                        let (Some(&lo), Some(&hi)) = (years.first(), years.last()) else {
                            ui.label(format!("{col}: no values"));
                            continue;
                        };
                        let (mut from, mut to) = match filters.get(&col) {
                            Some(ColumnFilter::Range { min, max }) => ((*min).clamp(lo, hi), (*max).clamp(lo, hi)),
                            _ => (lo, hi),
                        };
                        ui.strong(&col);
                        let a = ui.add(egui::Slider::new(&mut from, lo..=hi).text("from"));
                        let b = ui.add(egui::Slider::new(&mut to, lo..=hi).text("to"));
                        if a.changed() || b.changed() {
                            filters.set_range(&col, from, to);
                            changed = true;
                        }
                    }
                }
            }
        });

    if changed {
        page.pivot.recompute(&dataset, max_columns);
    }

    match &page.pivot.result {
        Some(Err(e)) if e.is_halt() => {
            ui.label(RichText::new(e.to_string()).heading().color(Color32::YELLOW));
        }
        Some(Err(e)) => {
            ui.colored_label(Color32::RED, e.to_string());
        }
        Some(Ok(table)) => {
            pivot_table(ui, table);
            if let Err(e) = download_button(ui, "Download", "file.csv", || table.to_csv()) {
                log::error!("Download failed: {e:#}");
                *status = Some(format!("Error: {e:#}"));
            }
        }
        None => {}
    }
}

/// Render grouped counts as a striped table.
pub fn pivot_table(ui: &mut Ui, table: &PivotTable) {
    ui.label(format!("{} groups, {} records", table.len(), table.total()));
    let headers = table.headers();

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .max_scroll_height(400.0)
        .columns(Column::auto().at_least(80.0), headers.len())
        .header(20.0, |mut header| {
            for h in &headers {
                header.col(|ui: &mut Ui| {
                    ui.strong(h.as_str());
                });
            }
        })
        .body(|body| {
            body.rows(18.0, table.rows.len(), |mut row| {
                let pivot_row = &table.rows[row.index()];
                for key in &pivot_row.key {
                    row.col(|ui: &mut Ui| {
                        ui.label(key.to_string());
                    });
                }
                row.col(|ui: &mut Ui| {
                    ui.label(pivot_row.count.to_string());
                });
            });
        });
}

// ---------------------------------------------------------------------------
// CSV download
// ---------------------------------------------------------------------------

/// A button that asks for a target file and writes the CSV produced by
/// `make`. Cancelling the dialog is not an error.
pub fn download_button<F>(ui: &mut Ui, label: &str, file_name: &str, make: F) -> Result<()>
where
    F: FnOnce() -> Result<Vec<u8>>,
{
    if !ui.button(label).clicked() {
        return Ok(());
    }
    let target = rfd::FileDialog::new()
        .set_title(label)
        .set_file_name(file_name)
        .add_filter("CSV", &["csv"])
        .save_file();
    match target {
        Some(path) => export::save_bytes(&path, &make()?),
        None => Ok(()),
    }
}
