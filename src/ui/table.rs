use eframe::egui::{self, Ui};
use egui_extras::{Column, TableBuilder, TableRow};

use streamer_dashboard::data::export::export_columns;
use streamer_dashboard::data::view::{sortable_columns, SortDirection, PAGE_SIZES};
use streamer_dashboard::pipeline::Rendered;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Streamer table (central panel)
// ---------------------------------------------------------------------------

/// Counters, sort/page controls and the current page of the filtered view.
pub fn data_table(ui: &mut Ui, state: &mut AppState) {
    ui.heading("📋 Streamer Data");
    counters(ui, &state.rendered);
    ui.add_space(4.0);
    controls(ui, state);
    ui.add_space(4.0);
    table(ui, &state.rendered);
}

fn counters(ui: &mut Ui, rendered: &Rendered) {
    let summary = &rendered.summary;
    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!("Filtered Results: {}", summary.total));
        if let Some(viewers) = summary.total_viewers {
            ui.separator();
            ui.label(format!("Total Viewers: {}", thousands(viewers)));
        }
        if let Some(hours) = summary.total_streaming_hours {
            ui.separator();
            ui.label(format!("Total Streaming Hours: {hours:.1}"));
        }
        if let Some(verified) = summary.verified {
            ui.separator();
            ui.label(format!("Verified Streamers: {verified}"));
        }
    });
}

fn controls(ui: &mut Ui, state: &mut AppState) {
    let before = state.view;
    let sort_keys = sortable_columns(state.dataset());
    let total_pages = state.rendered.page.total_pages;

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Sort by:");
        egui::ComboBox::from_id_salt("sort_column")
            .selected_text(state.view.sort.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for key in sort_keys {
                    ui.selectable_value(&mut state.view.sort, key, key.to_string());
                }
            });

        egui::ComboBox::from_id_salt("sort_direction")
            .selected_text(state.view.direction.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for dir in [SortDirection::Ascending, SortDirection::Descending] {
                    ui.selectable_value(&mut state.view.direction, dir, dir.to_string());
                }
            });

        ui.separator();
        ui.label("Records per page:");
        egui::ComboBox::from_id_salt("page_size")
            .selected_text(state.view.page_size.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for size in PAGE_SIZES {
                    ui.selectable_value(&mut state.view.page_size, size, size.to_string());
                }
            });

        if total_pages > 1 {
            ui.separator();
            ui.label("Page:");
            ui.add(egui::DragValue::new(&mut state.view.page).range(1..=total_pages));
            ui.label(format!("of {total_pages}"));
        }
    });

    if state.view != before {
        if state.view.page_size != before.page_size {
            state.view.page = 1;
        }
        state.rerender();
    }

    ui.label(state.rendered.page.caption());
}

fn table(ui: &mut Ui, rendered: &Rendered) {
    let columns = export_columns(&rendered.view);
    let records = rendered.page_records();
    if columns.is_empty() || records.is_empty() {
        return;
    }
    let row_height = ui.text_style_height(&egui::TextStyle::Body);

    egui::ScrollArea::horizontal()
        .id_salt("table_hscroll")
        .show(ui, |ui: &mut Ui| {
            let mut builder = TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .vscroll(false)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center));
            for _ in &columns {
                builder = builder.column(Column::initial(120.0).at_least(40.0).clip(true));
            }

            builder
                .header(20.0, |mut header| {
                    for column in &columns {
                        header.col(|ui| {
                            ui.strong(column.name());
                        });
                    }
                })
                .body(|body| {
                    body.rows(row_height, records.len(), |mut row: TableRow| {
                        let record = &records[row.index()];
                        for column in &columns {
                            row.col(|ui| {
                                ui.label(column.cell(record).to_string());
                            });
                        }
                    });
                });
        });
}

/// `1234567.0` -> `"1,234,567"`.
fn thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0.0 && out != "0" {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_groups_digits() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1000.0), "1,000");
        assert_eq!(thousands(1234567.4), "1,234,567");
        assert_eq!(thousands(-12345.0), "-12,345");
    }
}
