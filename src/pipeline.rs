use crate::data::aggregate::Summary;
use crate::data::filter::{filtered_indices, FilterSpec};
use crate::data::model::StreamerDataset;
use crate::data::view::{sort_indices, Page, ViewState};

/// Everything one render pass shows for a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// Filtered then sorted; what the table pages through and what export writes.
    pub view: StreamerDataset,
    pub page: Page,
    pub summary: Summary,
}

impl Rendered {
    pub fn page_records(&self) -> &[crate::data::model::StreamerRecord] {
        &self.view.records[self.page.rows.clone()]
    }
}

/// Filter, sort, paginate and summarise `dataset`.
pub fn render(dataset: &StreamerDataset, filters: &FilterSpec, view: &ViewState) -> Rendered {
    let mut indices = filtered_indices(dataset, filters);
    sort_indices(dataset, &mut indices, view.sort, view.direction);
    let view_ds = dataset.select(&indices);
    let page = Page::new(view_ds.len(), view.page_size, view.page);
    let summary = Summary::of(&view_ds);
    Rendered {
        view: view_ds,
        page,
        summary,
    }
}
