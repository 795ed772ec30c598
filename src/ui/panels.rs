use chrono::Local;
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use streamer_dashboard::data::export::{timestamped_filename, ExportFormat};
use streamer_dashboard::data::model::Metric;

use crate::state::AppState;

const ALL: &str = "All";

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top toolbar: refresh, export, status.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        if ui.button("🔄 Refresh Data").clicked() {
            state.refresh();
        }

        ui.separator();

        let has_rows = !state.rendered.view.is_empty();
        ui.add_enabled_ui(has_rows, |ui: &mut Ui| {
            ui.menu_button("📥 Export", |ui: &mut Ui| {
                for format in ExportFormat::ALL {
                    if ui.button(format!("Export as {format}…")).clicked() {
                        save_export_dialog(state, format);
                        ui.close_menu();
                    }
                }
                ui.separator();
                if ui.button("📋 Copy CSV to clipboard").clicked() {
                    match state.view_as_csv() {
                        Ok(csv) => {
                            ui.ctx().copy_text(csv);
                            state.status_message = Some(format!(
                                "Copied {} records as CSV",
                                state.rendered.view.len()
                            ));
                        }
                        Err(e) => {
                            log::error!("Failed to build CSV: {e:#}");
                            state.status_message = Some(format!("Error: {e:#}"));
                        }
                    }
                    ui.close_menu();
                }
            });
        });

        ui.separator();

        ui.label(format!(
            "{} streamers loaded, {} visible",
            state.overview.total,
            state.rendered.view.len()
        ));

        if let Some(err) = &state.load_error {
            ui.separator();
            ui.label(RichText::new(err).color(Color32::RED));
        }
        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(msg);
        }
    });
}

// ---------------------------------------------------------------------------
// Left side panel – overview and filter widgets
// ---------------------------------------------------------------------------

/// Render the left panel: dataset overview then the filters.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            overview(ui, state);
            ui.separator();

            ui.heading("🔍 Filters");
            let before = state.filters.clone();

            ui.label("Search (Username, Game, Language, Twitter)");
            ui.text_edit_singleline(&mut state.filters.search_term);
            ui.add_space(4.0);

            choice_combo(
                ui,
                "📡 Live Status",
                "status_filter",
                &state.status_options,
                &mut state.filters.status,
            );
            choice_combo(
                ui,
                "✅ Verification Status",
                "verification_filter",
                &state.verification_options,
                &mut state.filters.verification,
            );

            range_sliders(ui, state, Metric::CurrentViewers, "👥 Current Viewers Range");
            range_sliders(
                ui,
                state,
                Metric::TotalStreamingMinutes,
                "⏱ Total Streaming Time (minutes)",
            );

            if state.filters != before {
                state.view.page = 1;
                state.rerender();
            }
        });
}

fn overview(ui: &mut Ui, state: &AppState) {
    ui.heading("📊 Data Overview");
    ui.label(format!("Total Streamers: {}", state.overview.total));
    if let (Some(live), Some(offline)) = (state.overview.live, state.overview.offline()) {
        ui.label(format!("Currently Live: {live}"));
        ui.label(format!("Offline: {offline}"));
    }

    let loaded = &state.loaded;
    if !loaded.database.is_empty() && !loaded.collection.is_empty() {
        ui.add_space(4.0);
        ui.label(RichText::new(format!("Database: {}", loaded.database)).strong());
        ui.label(RichText::new(format!("Collection: {}", loaded.collection)).strong());
    }
}

/// "All" plus every value seen in the column. `None` stands for "All".
fn choice_combo(
    ui: &mut Ui,
    label: &str,
    id: &str,
    options: &[String],
    choice: &mut Option<String>,
) {
    ui.label(label);
    let selected_text = choice.clone().unwrap_or_else(|| ALL.to_string());
    egui::ComboBox::from_id_salt(id)
        .selected_text(selected_text)
        .show_ui(ui, |ui: &mut Ui| {
            ui.selectable_value(choice, None, ALL);
            for option in options {
                ui.selectable_value(choice, Some(option.clone()), option.as_str());
            }
        });
    ui.add_space(4.0);
}

fn range_sliders(ui: &mut Ui, state: &mut AppState, metric: Metric, label: &str) {
    if !state.dataset().has_metric(metric) {
        return;
    }
    let Some(limits) = state.range_limits.get(&metric).copied() else {
        ui.label(format!("{label}: No data available"));
        return;
    };
    if limits.min == limits.max {
        ui.label(format!("{label}: All values are {}", limits.min));
        return;
    }

    ui.label(label);
    let range = state.filters.ranges.entry(metric).or_insert(limits);
    ui.add(egui::Slider::new(&mut range.min, limits.min..=limits.max).text("min"));
    ui.add(egui::Slider::new(&mut range.max, limits.min..=limits.max).text("max"));
    if !range.is_valid() {
        ui.label(RichText::new("min is above max: range ignored").weak());
    }
    ui.add_space(4.0);
}

// ---------------------------------------------------------------------------
// Footer and empty state
// ---------------------------------------------------------------------------

pub fn footer(ui: &mut Ui, state: &AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!(
            "Last updated: {} | Total records: {} | MongoDB: {}.{}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            state.rendered.view.len(),
            state.loaded.database,
            state.loaded.collection
        ));
    });
}

pub fn empty_notice(ui: &mut Ui, state: &AppState) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.add_space(40.0);
        ui.heading("No data found. Please check your MongoDB connection and collection.");
        ui.label("Make sure dashboard.toml (or the MONGODB_* environment variables) is properly configured.");
        if let Some(err) = &state.load_error {
            ui.label(RichText::new(err).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn save_export_dialog(state: &mut AppState, format: ExportFormat) {
    let file = rfd::FileDialog::new()
        .set_title(format!("Export as {format}"))
        .add_filter(format.to_string(), &[format.extension()])
        .set_file_name(timestamped_filename(format, Local::now()))
        .save_file();

    if let Some(path) = file {
        match state.export_to(format, &path) {
            Ok(()) => {
                state.status_message = Some(format!("Saved {}", path.display()));
            }
            Err(e) => {
                log::error!("Failed to export: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
