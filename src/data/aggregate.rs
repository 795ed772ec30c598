use super::model::{Metric, StreamerDataset, TextField};

/// How many entries the ranked charts show.
pub const TOP_N: usize = 10;

const YES: &str = "Yes";

/// Summary metrics over one dataset. A metric whose column is absent is
/// `None`, so the dependent counter or chart can be left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub live: Option<usize>,
    pub verified: Option<usize>,
    pub total_viewers: Option<f64>,
    pub total_streaming_hours: Option<f64>,
    /// `(username, current_viewers)` for the highest-viewed records.
    pub top_by_viewers: Option<Vec<(String, f64)>>,
    pub game_counts: Option<Vec<(String, usize)>>,
    pub live_counts: Option<Vec<(String, usize)>>,
}

impl Summary {
    pub fn of(dataset: &StreamerDataset) -> Self {
        let has_live = dataset.has_text(TextField::IsLive);
        Self {
            total: dataset.len(),
            live: has_live.then(|| count_equal(dataset, TextField::IsLive, YES)),
            verified: dataset
                .has_text(TextField::IsVerified)
                .then(|| count_equal(dataset, TextField::IsVerified, YES)),
            total_viewers: sum(dataset, Metric::CurrentViewers),
            total_streaming_hours: sum(dataset, Metric::TotalStreamingMinutes).map(|m| m / 60.0),
            top_by_viewers: dataset
                .has_metric(Metric::CurrentViewers)
                .then(|| top_by(dataset, Metric::CurrentViewers, TOP_N)),
            game_counts: dataset.has_text(TextField::GameName).then(|| {
                let mut counts = value_counts(dataset, TextField::GameName);
                counts.truncate(TOP_N);
                counts
            }),
            live_counts: has_live.then(|| value_counts(dataset, TextField::IsLive)),
        }
    }

    pub fn offline(&self) -> Option<usize> {
        self.live.map(|live| self.total - live)
    }
}

fn count_equal(dataset: &StreamerDataset, field: TextField, wanted: &str) -> usize {
    dataset
        .records
        .iter()
        .filter(|r| r.text(field) == Some(wanted))
        .count()
}

fn sum(dataset: &StreamerDataset, metric: Metric) -> Option<f64> {
    dataset
        .has_metric(metric)
        .then(|| dataset.records.iter().map(|r| r.metric(metric)).sum())
}

/// The `n` records with the largest `metric`; ties keep dataset order.
pub fn top_by(dataset: &StreamerDataset, metric: Metric, n: usize) -> Vec<(String, f64)> {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    indices.sort_by(|&a, &b| {
        dataset.records[b]
            .metric(metric)
            .total_cmp(&dataset.records[a].metric(metric))
    });
    indices
        .into_iter()
        .take(n)
        .map(|i| {
            let r = &dataset.records[i];
            (r.username.clone().unwrap_or_default(), r.metric(metric))
        })
        .collect()
}

/// Frequency of each present value, most frequent first; ties keep the order
/// of first appearance.
pub fn value_counts(dataset: &StreamerDataset, field: TextField) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in dataset.records.iter().filter_map(|r| r.text(field)) {
        match counts.iter_mut().find(|(v, _)| v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
