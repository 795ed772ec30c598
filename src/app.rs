use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct DashboardApp {
    pub state: AppState,
}

impl DashboardApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll_reload();
        // Wake up for the next scheduled reload even when idle.
        ctx.request_repaint_after(self.state.config.cache_ttl);

        // ---- Top panel: toolbar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Bottom panel: footer ----
        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            panels::footer(ui, &self.state);
        });

        // ---- Left side panel: overview + filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: table + charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.dataset().is_empty() {
                panels::empty_notice(ui, &self.state);
                return;
            }
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    table::data_table(ui, &mut self.state);
                    ui.separator();
                    plot::charts(ui, &self.state);
                });
        });
    }
}
