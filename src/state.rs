use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use streamer_dashboard::config::DashboardConfig;
use streamer_dashboard::data::aggregate::Summary;
use streamer_dashboard::data::cache::DatasetCache;
use streamer_dashboard::data::export::{self, ExportFormat};
use streamer_dashboard::data::filter::{category_options, FilterSpec, NumericRange};
use streamer_dashboard::data::loader::{load_dataset, Loaded};
use streamer_dashboard::data::model::{Metric, StreamerDataset, TextField};
use streamer_dashboard::data::view::ViewState;
use streamer_dashboard::pipeline::{render, Rendered};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,
    cache: DatasetCache<Loaded>,
    last_attempt: Option<Instant>,

    /// Current dataset and where it came from (empty until a load succeeds).
    pub loaded: Arc<Loaded>,
    /// Loader error shown in the UI.
    pub load_error: Option<String>,

    /// Operator selections.
    pub filters: FilterSpec,
    pub view: ViewState,

    /// Widget choices derived from the full dataset.
    pub status_options: Vec<String>,
    pub verification_options: Vec<String>,
    /// Slider bounds; a degenerate bound is shown as a fixed value.
    pub range_limits: BTreeMap<Metric, NumericRange>,

    /// Counters over the unfiltered dataset.
    pub overview: Summary,
    /// Result of the last render pass.
    pub rendered: Rendered,

    /// Export / clipboard feedback.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        let view = ViewState {
            page_size: config.page_size,
            ..ViewState::default()
        };
        let empty = StreamerDataset::default();
        let mut state = Self {
            rendered: render(&empty, &FilterSpec::default(), &view),
            config,
            cache: DatasetCache::new(),
            last_attempt: None,
            loaded: Arc::new(Loaded::default()),
            load_error: None,
            filters: FilterSpec::default(),
            view,
            status_options: Vec::new(),
            verification_options: Vec::new(),
            range_limits: BTreeMap::new(),
            overview: Summary::default(),
            status_message: None,
        };
        state.reload();
        state
    }

    pub fn dataset(&self) -> &StreamerDataset {
        &self.loaded.dataset
    }

    /// Reload once the TTL has elapsed since the last attempt. Failed attempts
    /// are retried on the same schedule, not every frame.
    pub fn poll_reload(&mut self) {
        let due = self
            .last_attempt
            .map_or(true, |at| at.elapsed() >= self.config.cache_ttl);
        if due {
            self.reload();
        }
    }

    /// Drop the cached dataset and load again.
    pub fn refresh(&mut self) {
        self.cache.invalidate();
        self.reload();
    }

    fn reload(&mut self) {
        self.last_attempt = Some(Instant::now());
        let outcome = load_dataset(
            &self.config.source(),
            self.config.connect_timeout,
            self.config.cache_ttl,
            &mut self.cache,
        );
        self.load_error = outcome.error.as_ref().map(|e| e.to_string());
        if !Arc::ptr_eq(&outcome.loaded, &self.loaded) {
            self.set_dataset(outcome.loaded);
        }
    }

    /// Ingest a newly loaded dataset. The operator's filters and page carry
    /// over; the page is clamped by the next render.
    pub fn set_dataset(&mut self, loaded: Arc<Loaded>) {
        let dataset = &loaded.dataset;
        self.filters = self.filters.carry_over(&self.range_limits, dataset);
        self.range_limits = FilterSpec::for_dataset(dataset).ranges;
        self.status_options = category_options(dataset, TextField::IsLive);
        self.verification_options = category_options(dataset, TextField::IsVerified);
        self.overview = Summary::of(dataset);
        self.loaded = loaded;
        self.rerender();
    }

    /// Recompute the filtered, sorted and paged view.
    pub fn rerender(&mut self) {
        self.rendered = render(&self.loaded.dataset, &self.filters, &self.view);
        self.view.page = self.rendered.page.number;
    }

    /// Write the filtered view to `path` in `format`.
    pub fn export_to(&mut self, format: ExportFormat, path: &Path) -> Result<()> {
        let bytes = export::export_bytes(&self.rendered.view, format, &self.loaded.collection)?;
        std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
        log::info!(
            "Exported {} records as {format} to {}",
            self.rendered.view.len(),
            path.display()
        );
        Ok(())
    }

    pub fn view_as_csv(&self) -> Result<String> {
        export::to_csv_string(&self.rendered.view)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    const SNAPSHOT: &str = r#"[
        {"username": "alpha", "is_live": "Yes", "isVerified": "Yes", "current_viewers": 10},
        {"username": "anna", "is_live": "No", "isVerified": "No", "current_viewers": 40},
        {"username": "andy", "is_live": "No", "isVerified": "Yes", "current_viewers": 70},
        {"username": "bert", "is_live": "No", "isVerified": "No", "current_viewers": 100}
    ]"#;

    fn state_over(path: PathBuf, ttl: Duration) -> AppState {
        AppState::new(DashboardConfig {
            snapshot: Some(path),
            cache_ttl: ttl,
            page_size: 1,
            ..DashboardConfig::default()
        })
    }

    fn narrow_filters(state: &mut AppState) {
        state.filters.search_term = "a".into();
        state.filters.status = Some("No".into());
        state
            .filters
            .ranges
            .insert(Metric::CurrentViewers, NumericRange::new(20.0, 90.0));
        state.view.page = 2;
        state.rerender();
    }

    #[test]
    fn scheduled_reload_keeps_operator_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamers.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let mut state = state_over(path, Duration::from_millis(1));
        narrow_filters(&mut state);
        assert_eq!(state.rendered.view.len(), 2);
        let before = Arc::clone(&state.loaded);
        let filters = state.filters.clone();

        std::thread::sleep(Duration::from_millis(20));
        state.poll_reload();

        assert!(!Arc::ptr_eq(&before, &state.loaded));
        assert_eq!(state.filters, filters);
        assert_eq!(state.view.page, 2);
        assert_eq!(state.rendered.view.len(), 2);
    }

    #[test]
    fn refresh_drops_choices_the_new_data_lacks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamers.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let mut state = state_over(path.clone(), Duration::from_secs(300));
        narrow_filters(&mut state);

        std::fs::write(
            &path,
            r#"[{"username": "amy", "is_live": "Yes", "isVerified": "No", "current_viewers": 50}]"#,
        )
        .unwrap();
        state.refresh();

        assert_eq!(state.filters.search_term, "a");
        assert_eq!(state.filters.status, None);
        assert_eq!(
            state.filters.ranges.get(&Metric::CurrentViewers),
            Some(&NumericRange::new(50.0, 50.0))
        );
        assert_eq!(state.view.page, 1);
        assert_eq!(state.rendered.view.len(), 1);
    }
}
