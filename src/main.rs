mod app;
mod state;
mod ui;

use app::DashboardApp;
use eframe::egui;
use state::AppState;
use streamer_dashboard::config::DashboardConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let config = DashboardConfig::load();
    match &config.snapshot {
        Some(path) => log::info!("Reading records from snapshot {}", path.display()),
        None => log::info!(
            "Reading records from MongoDB {}.{}",
            config.mongodb.database.as_deref().unwrap_or("?"),
            config.mongodb.collection.as_deref().unwrap_or("?")
        ),
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Streamer Analytics Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(DashboardApp::new(AppState::new(config))))),
    )
}
