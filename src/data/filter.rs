use std::collections::BTreeMap;

use super::model::{Metric, StreamerDataset, StreamerRecord, TextField};

/// Columns the search box looks at.
pub const SEARCH_FIELDS: [TextField; 4] = [
    TextField::Username,
    TextField::GameName,
    TextField::Language,
    TextField::Twitter,
];

// ---------------------------------------------------------------------------
// Filter predicate: what the operator selected
// ---------------------------------------------------------------------------

/// Inclusive numeric bound on one metric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `min == max` is a valid one-point range; `min > max` or NaN is not.
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// The operator's filter selection.
///
/// `None` (shown as "All") and an empty search term mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub search_term: String,
    pub status: Option<String>,
    pub verification: Option<String>,
    pub ranges: BTreeMap<Metric, NumericRange>,
}

impl FilterSpec {
    /// Initialise a [`FilterSpec`] whose ranges span each column (i.e., show everything).
    pub fn for_dataset(dataset: &StreamerDataset) -> Self {
        let ranges = [Metric::CurrentViewers, Metric::TotalStreamingMinutes]
            .into_iter()
            .filter_map(|m| default_range(dataset, m).map(|r| (m, r)))
            .collect();
        Self {
            ranges,
            ..Self::default()
        }
    }

    /// The operator's selections moved onto a reloaded `dataset`.
    ///
    /// The search term is kept. A status or verification choice is kept while
    /// the new data still offers it. A range the operator narrowed is clamped
    /// to the new column span; one left at `previous_limits` follows the new
    /// span.
    pub fn carry_over(
        &self,
        previous_limits: &BTreeMap<Metric, NumericRange>,
        dataset: &StreamerDataset,
    ) -> Self {
        let keep = |choice: &Option<String>, field: TextField| {
            choice
                .clone()
                .filter(|c| category_options(dataset, field).contains(c))
        };
        let mut next = Self::for_dataset(dataset);
        next.search_term = self.search_term.clone();
        next.status = keep(&self.status, TextField::IsLive);
        next.verification = keep(&self.verification, TextField::IsVerified);

        for (metric, limits) in next.ranges.iter_mut() {
            let Some(chosen) = self.ranges.get(metric) else {
                continue;
            };
            if previous_limits.get(metric) == Some(chosen) {
                continue;
            }
            let clamp = |v: f64| v.clamp(limits.min, limits.max);
            *limits = NumericRange::new(clamp(chosen.min), clamp(chosen.max));
        }
        next
    }

    pub fn is_empty(&self) -> bool {
        self.search_term.is_empty()
            && self.status.is_none()
            && self.verification.is_none()
            && self.ranges.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Widget population
// ---------------------------------------------------------------------------

/// Distinct values of a categorical column in order of first appearance.
/// Empty when the column is absent.
pub fn category_options(dataset: &StreamerDataset, field: TextField) -> Vec<String> {
    if !dataset.has_text(field) {
        return Vec::new();
    }
    let mut options: Vec<String> = Vec::new();
    for value in dataset.records.iter().filter_map(|r| r.text(field)) {
        if !options.iter().any(|o| o == value) {
            options.push(value.to_string());
        }
    }
    options
}

/// The full `[min, max]` span of a metric column, or `None` when there is no
/// data to bound.
pub fn default_range(dataset: &StreamerDataset, metric: Metric) -> Option<NumericRange> {
    if !dataset.has_metric(metric) || dataset.is_empty() {
        return None;
    }
    let (min, max) = dataset
        .records
        .iter()
        .map(|r| r.metric(metric))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    Some(NumericRange::new(min, max))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Return indices of records that pass all active filters, in dataset order.
///
/// A predicate over a column the dataset does not have is skipped, and an
/// invalid range constrains nothing.
pub fn filtered_indices(dataset: &StreamerDataset, spec: &FilterSpec) -> Vec<usize> {
    let needle = spec.search_term.to_lowercase();
    let search_fields: Vec<TextField> = SEARCH_FIELDS
        .into_iter()
        .filter(|f| dataset.has_text(*f))
        .collect();
    let status = spec
        .status
        .as_deref()
        .filter(|_| dataset.has_text(TextField::IsLive));
    let verification = spec
        .verification
        .as_deref()
        .filter(|_| dataset.has_text(TextField::IsVerified));
    let ranges: Vec<(Metric, NumericRange)> = spec
        .ranges
        .iter()
        .filter(|(m, r)| dataset.has_metric(**m) && r.is_valid())
        .map(|(m, r)| (*m, *r))
        .collect();

    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            if !needle.is_empty() && !matches_search(rec, &search_fields, &needle) {
                return false;
            }
            if let Some(wanted) = status {
                if rec.is_live.as_deref() != Some(wanted) {
                    return false;
                }
            }
            if let Some(wanted) = verification {
                if rec.is_verified.as_deref() != Some(wanted) {
                    return false;
                }
            }
            ranges
                .iter()
                .all(|(metric, range)| range.contains(rec.metric(*metric)))
        })
        .map(|(i, _)| i)
        .collect()
}

fn matches_search(rec: &StreamerRecord, fields: &[TextField], needle: &str) -> bool {
    fields.iter().any(|f| {
        rec.text(*f)
            .is_some_and(|value| value.to_lowercase().contains(needle))
    })
}

/// The filtered dataset: an order-preserving subsequence of `dataset`.
pub fn apply_filters(dataset: &StreamerDataset, spec: &FilterSpec) -> StreamerDataset {
    dataset.select(&filtered_indices(dataset, spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(mut r: StreamerRecord, v: &str) -> StreamerRecord {
        r.is_verified = Some(v.into());
        r
    }

    #[test]
    fn carry_over_keeps_choices_the_new_data_still_offers() {
        let old = dataset(vec![record("a", "Yes", 10.0), record("b", "No", 90.0)]);
        let limits = FilterSpec::for_dataset(&old).ranges;
        let mut chosen = FilterSpec::for_dataset(&old);
        chosen.search_term = "a".into();
        chosen.status = Some("No".into());
        chosen.verification = Some("Yes".into());
        chosen
            .ranges
            .insert(Metric::CurrentViewers, NumericRange::new(20.0, 80.0));

        let new = dataset(vec![record("a", "Yes", 30.0), record("c", "No", 60.0)]);
        let next = chosen.carry_over(&limits, &new);
        assert_eq!(next.search_term, "a");
        assert_eq!(next.status.as_deref(), Some("No"));
        // no isVerified column any more
        assert_eq!(next.verification, None);
        assert_eq!(
            next.ranges.get(&Metric::CurrentViewers),
            Some(&NumericRange::new(30.0, 60.0))
        );
    }

    #[test]
    fn carry_over_drops_vanished_status_and_follows_untouched_ranges() {
        let mut old = dataset(vec![
            verified(record("a", "Yes", 10.0), "Yes"),
            verified(record("b", "No", 20.0), "No"),
        ]);
        old.columns.push("isVerified".into());
        let limits = FilterSpec::for_dataset(&old).ranges;
        let chosen = FilterSpec {
            status: Some("No".into()),
            verification: Some("Yes".into()),
            ..FilterSpec::for_dataset(&old)
        };

        let mut new = dataset(vec![
            verified(record("a", "Yes", 5.0), "Yes"),
            verified(record("c", "Yes", 500.0), "No"),
        ]);
        new.columns.push("isVerified".into());
        let next = chosen.carry_over(&limits, &new);
        assert_eq!(next.status, None);
        assert_eq!(next.verification.as_deref(), Some("Yes"));
        assert_eq!(
            next.ranges.get(&Metric::CurrentViewers),
            Some(&NumericRange::new(5.0, 500.0))
        );
    }

    fn record(name: &str, live: &str, viewers: f64) -> StreamerRecord {
        let mut r = StreamerRecord::default();
        r.username = Some(name.into());
        r.is_live = Some(live.into());
        r.set_metric(Metric::CurrentViewers, viewers);
        r
    }

    fn dataset(records: Vec<StreamerRecord>) -> StreamerDataset {
        StreamerDataset::new(
            records,
            vec!["username".into(), "is_live".into(), "current_viewers".into()],
        )
    }

    #[test]
    fn status_filter_keeps_exact_matches_in_order() {
        let ds = dataset(vec![
            record("a", "Yes", 10.0),
            record("b", "No", 0.0),
            record("c", "Yes", 50.0),
        ]);
        let spec = FilterSpec {
            status: Some("Yes".into()),
            ..FilterSpec::default()
        };
        assert_eq!(filtered_indices(&ds, &spec), vec![0, 2]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let ds = dataset(vec![record("NinjaGamer", "Yes", 1.0), record("other", "No", 1.0)]);
        let spec = FilterSpec {
            search_term: "jag".into(),
            ..FilterSpec::default()
        };
        assert_eq!(filtered_indices(&ds, &spec), vec![0]);
    }

    #[test]
    fn search_treats_regex_characters_literally() {
        let ds = dataset(vec![record("a.b", "Yes", 1.0), record("axb", "Yes", 1.0)]);
        let spec = FilterSpec {
            search_term: "a.b".into(),
            ..FilterSpec::default()
        };
        assert_eq!(filtered_indices(&ds, &spec), vec![0]);
    }

    #[test]
    fn invalid_range_is_no_constraint() {
        let ds = dataset(vec![record("a", "Yes", 10.0), record("b", "No", 500.0)]);
        let mut spec = FilterSpec::default();
        spec.ranges
            .insert(Metric::CurrentViewers, NumericRange::new(100.0, 50.0));
        assert_eq!(filtered_indices(&ds, &spec), vec![0, 1]);
    }

    #[test]
    fn degenerate_range_keeps_only_that_value() {
        let ds = dataset(vec![record("a", "Yes", 10.0), record("b", "No", 20.0)]);
        let mut spec = FilterSpec::default();
        spec.ranges
            .insert(Metric::CurrentViewers, NumericRange::new(20.0, 20.0));
        assert_eq!(filtered_indices(&ds, &spec), vec![1]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let ds = dataset(vec![
            record("a", "Yes", 9.0),
            record("b", "Yes", 10.0),
            record("c", "Yes", 20.0),
            record("d", "Yes", 21.0),
        ]);
        let mut spec = FilterSpec::default();
        spec.ranges
            .insert(Metric::CurrentViewers, NumericRange::new(10.0, 20.0));
        assert_eq!(filtered_indices(&ds, &spec), vec![1, 2]);
    }

    #[test]
    fn predicates_on_absent_columns_are_skipped() {
        let mut r = StreamerRecord::default();
        r.username = Some("solo".into());
        let ds = StreamerDataset::new(vec![r], vec!["username".into()]);
        let mut spec = FilterSpec {
            status: Some("Yes".into()),
            verification: Some("No".into()),
            ..FilterSpec::default()
        };
        spec.ranges.insert(Metric::Views, NumericRange::new(5.0, 10.0));
        assert_eq!(filtered_indices(&ds, &spec), vec![0]);
    }

    #[test]
    fn category_options_follow_first_appearance() {
        let ds = dataset(vec![
            record("a", "No", 1.0),
            record("b", "Yes", 1.0),
            record("c", "No", 1.0),
        ]);
        assert_eq!(category_options(&ds, TextField::IsLive), vec!["No", "Yes"]);
        assert!(category_options(&ds, TextField::IsVerified).is_empty());
    }

    #[test]
    fn default_range_spans_column() {
        let ds = dataset(vec![record("a", "No", 7.0), record("b", "Yes", 3.0)]);
        assert_eq!(
            default_range(&ds, Metric::CurrentViewers),
            Some(NumericRange::new(3.0, 7.0))
        );
        assert_eq!(default_range(&ds, Metric::Views), None);
        assert_eq!(default_range(&dataset(vec![]), Metric::CurrentViewers), None);
    }

    #[test]
    fn default_spec_shows_everything() {
        let ds = dataset(vec![record("a", "No", 7.0), record("b", "Yes", 3.0)]);
        let spec = FilterSpec::for_dataset(&ds);
        assert_eq!(spec.ranges.len(), 1);
        assert_eq!(apply_filters(&ds, &spec), ds);
    }
}
