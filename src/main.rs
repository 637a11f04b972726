mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use app::IdbApp;
use config::DashboardConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = DashboardConfig::load().unwrap_or_else(|e| {
        log::error!("Invalid configuration, falling back to defaults: {e:#}");
        DashboardConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "European Injury Database",
        options,
        Box::new(|_cc| Ok(Box::new(IdbApp::new(config)))),
    )
}
