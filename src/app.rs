use eframe::egui;

use crate::config::DashboardConfig;
use crate::state::AppState;
use crate::ui::{pages, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct IdbApp {
    pub state: AppState,
}

impl IdbApp {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for IdbApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: navigation and filters ----
        egui::SidePanel::left("nav_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: the selected page ----
        egui::CentralPanel::default().show(ctx, |ui| {
            pages::central_panel(ui, &mut self.state);
        });
    }
}
