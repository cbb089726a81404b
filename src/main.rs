mod analyzer;
mod batch;
mod catalog;
mod config;
mod error;
mod fetcher;
mod limiter;
mod model;
mod ui;

use eframe::egui;
use tracing_subscriber::EnvFilter;
use ui::MarketApp;

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1600.0, 1000.0])
            .with_min_inner_size([1200.0, 700.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Albion Online Market Scanner",
        options,
        Box::new(|cc| {
            ui::set_custom_style(&cc.egui_ctx);
            Ok(Box::new(MarketApp::new()))
        }),
    )
}
