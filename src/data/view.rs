use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use super::model::{Metric, StreamerDataset, StreamerRecord, TextField};

pub const PAGE_SIZES: [usize; 4] = [25, 50, 100, 200];
pub const DEFAULT_PAGE_SIZE: usize = 50;

// ---------------------------------------------------------------------------
// View selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Username,
    Metric(Metric),
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::Username => TextField::Username.column(),
            SortKey::Metric(m) => m.column(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("Ascending"),
            SortDirection::Descending => f.write_str("Descending"),
        }
    }
}

/// Sort and page selection, independent of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub sort: SortKey,
    pub direction: SortDirection,
    pub page_size: usize,
    /// 1-based; clamped when the view is computed.
    pub page: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            sort: SortKey::Username,
            direction: SortDirection::Ascending,
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }
}

/// `username` plus every metric column the dataset carries.
pub fn sortable_columns(dataset: &StreamerDataset) -> Vec<SortKey> {
    std::iter::once(SortKey::Username)
        .chain(
            Metric::ALL
                .into_iter()
                .filter(|m| dataset.has_metric(*m))
                .map(SortKey::Metric),
        )
        .collect()
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Stable sort of `indices` by `key`. Records without a username sort last in
/// either direction. A key whose column is absent leaves the order unchanged.
pub fn sort_indices(
    dataset: &StreamerDataset,
    indices: &mut [usize],
    key: SortKey,
    direction: SortDirection,
) {
    if !dataset.has_column(key.column()) {
        return;
    }
    let records = &dataset.records;
    indices.sort_by(|&a, &b| compare(&records[a], &records[b], key, direction));
}

fn compare(a: &StreamerRecord, b: &StreamerRecord, key: SortKey, dir: SortDirection) -> Ordering {
    let directed = |o: Ordering| match dir {
        SortDirection::Ascending => o,
        SortDirection::Descending => o.reverse(),
    };
    match key {
        SortKey::Metric(m) => directed(a.metric(m).total_cmp(&b.metric(m))),
        SortKey::Username => match (a.username.as_deref(), b.username.as_deref()) {
            (Some(x), Some(y)) => directed(x.cmp(y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// A sorted copy of `dataset`.
pub fn sorted(dataset: &StreamerDataset, key: SortKey, direction: SortDirection) -> StreamerDataset {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    sort_indices(dataset, &mut indices, key, direction);
    dataset.select(&indices)
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// `ceil(total / page_size)`, never less than one page.
pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// One page of a view of `total` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Clamped, 1-based.
    pub number: usize,
    pub total_pages: usize,
    pub total_records: usize,
    pub rows: Range<usize>,
}

impl Page {
    pub fn new(total: usize, page_size: usize, requested: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_pages(total, page_size);
        let number = requested.clamp(1, total_pages);
        let start = ((number - 1) * page_size).min(total);
        let end = (number * page_size).min(total);
        Self {
            number,
            total_pages,
            total_records: total,
            rows: start..end,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn caption(&self) -> String {
        if self.is_empty() {
            return format!("No records of {}", self.total_records);
        }
        format!(
            "Showing records {} to {} of {}",
            self.rows.start + 1,
            self.rows.end,
            self.total_records
        )
    }
}
