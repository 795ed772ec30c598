use std::ops::RangeInclusive;

use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, GridMark, Plot};

use streamer_dashboard::color::{ramp, ColorMap};
use streamer_dashboard::data::aggregate::Summary;

use crate::state::AppState;

const CHART_HEIGHT: f32 = 260.0;

// ---------------------------------------------------------------------------
// Charts (central panel, below the table)
// ---------------------------------------------------------------------------

/// Render the charts over the filtered view. A chart whose source column is
/// absent is skipped.
pub fn charts(ui: &mut Ui, state: &AppState) {
    let summary = &state.rendered.summary;
    if summary.total == 0 {
        return;
    }
    ui.heading("📈 Analytics");

    if let Some(counts) = &summary.live_counts {
        ui.label("Live Status Distribution");
        live_status_chart(ui, counts);
    }

    if let Some(top) = top_viewers(summary) {
        ui.label("Top 10 Streamers by Current Viewers");
        top_viewers_chart(ui, top);
    }

    if let Some(games) = summary.game_counts.as_deref().filter(|g| !g.is_empty()) {
        ui.label("Top 10 Games by Number of Streamers");
        games_chart(ui, games);
    }
}

/// Only worth drawing when someone is watching.
fn top_viewers(summary: &Summary) -> Option<&[(String, f64)]> {
    let viewers = summary.total_viewers?;
    if viewers <= 0.0 {
        return None;
    }
    summary.top_by_viewers.as_deref().filter(|t| !t.is_empty())
}

fn live_status_chart(ui: &mut Ui, counts: &[(String, usize)]) {
    let colors = ColorMap::new(counts.iter().map(|(label, _)| label.as_str()));
    let bars = counts
        .iter()
        .enumerate()
        .map(|(i, (label, n))| {
            Bar::new(i as f64, *n as f64)
                .name(label)
                .fill(colors.color_for(label))
                .width(0.6)
        })
        .collect();
    let labels: Vec<String> = counts.iter().map(|(l, _)| l.clone()).collect();

    Plot::new("live_status_chart")
        .height(CHART_HEIGHT)
        .legend(egui_plot::Legend::default())
        .x_axis_formatter(category_axis(labels))
        .y_axis_label("Streamers")
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name("Live status"));
        });
}

fn top_viewers_chart(ui: &mut Ui, top: &[(String, f64)]) {
    let max = top.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    // Highest first, drawn top-down.
    let n = top.len();
    let bars = top
        .iter()
        .enumerate()
        .map(|(i, (name, viewers))| {
            let t = if max > 0.0 { viewers / max } else { 0.0 };
            Bar::new((n - 1 - i) as f64, *viewers)
                .name(name)
                .fill(ramp(t))
                .width(0.7)
        })
        .collect();
    let labels: Vec<String> = top.iter().rev().map(|(name, _)| name.clone()).collect();

    Plot::new("top_viewers_chart")
        .height(CHART_HEIGHT)
        .y_axis_formatter(category_axis(labels))
        .x_axis_label("Current Viewers")
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal().name("Viewers"));
        });
}

fn games_chart(ui: &mut Ui, games: &[(String, usize)]) {
    let bars = games
        .iter()
        .enumerate()
        .map(|(i, (game, n))| {
            Bar::new(i as f64, *n as f64)
                .name(game)
                .fill(Color32::from_rgb(100, 65, 165))
                .width(0.6)
        })
        .collect();
    let labels: Vec<String> = games.iter().map(|(g, _)| g.clone()).collect();

    Plot::new("games_chart")
        .height(CHART_HEIGHT)
        .x_axis_formatter(category_axis(labels))
        .y_axis_label("Number of Streamers")
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name("Streamers"));
        });
}

/// Axis labels for bars placed at integer positions.
fn category_axis(labels: Vec<String>) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |mark, _range| {
        let pos = mark.value;
        if pos < 0.0 || pos.fract() != 0.0 {
            return String::new();
        }
        labels.get(pos as usize).cloned().unwrap_or_default()
    }
}
