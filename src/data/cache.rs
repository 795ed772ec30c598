use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Time-bounded single-value cache
// ---------------------------------------------------------------------------

/// Holds the most recent successful load for at most `ttl`.
///
/// The whole value is replaced on reload; readers hold an `Arc` to the value
/// they were given, so a refresh never mutates data a render pass is using.
#[derive(Debug)]
pub struct DatasetCache<T> {
    entry: Option<(Instant, Arc<T>)>,
}

impl<T> Default for DatasetCache<T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<T> DatasetCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value if it is younger than `ttl`, otherwise call
    /// `load`. Only successful loads are stored.
    pub fn get_or_load<E>(
        &mut self,
        ttl: Duration,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        self.get_or_load_at(Instant::now(), ttl, load)
    }

    fn get_or_load_at<E>(
        &mut self,
        now: Instant,
        ttl: Duration,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some((loaded_at, value)) = &self.entry {
            if now.saturating_duration_since(*loaded_at) < ttl {
                return Ok(Arc::clone(value));
            }
            log::debug!("Cached dataset expired after {ttl:?}, reloading");
        }
        let value = Arc::new(load()?);
        self.entry = Some((now, Arc::clone(&value)));
        Ok(value)
    }

    /// Drop the cached value so the next `get_or_load` reloads.
    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            log::info!("Dataset cache invalidated");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.entry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_cached_value_within_ttl() {
        let mut cache = DatasetCache::new();
        let mut calls = 0;
        let start = Instant::now();
        let ttl = Duration::from_secs(300);

        for offset in [0, 10, 299] {
            let v = cache
                .get_or_load_at(start + Duration::from_secs(offset), ttl, || {
                    calls += 1;
                    Ok::<_, ()>(calls)
                })
                .unwrap();
            assert_eq!(*v, 1);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn reloads_after_ttl() {
        let mut cache = DatasetCache::new();
        let start = Instant::now();
        let ttl = Duration::from_secs(300);

        cache.get_or_load_at(start, ttl, || Ok::<_, ()>(1)).unwrap();
        let v = cache
            .get_or_load_at(start + ttl, ttl, || Ok::<_, ()>(2))
            .unwrap();
        assert_eq!(*v, 2);
    }

    #[test]
    fn invalidate_forces_reload() {
        let mut cache = DatasetCache::new();
        let ttl = Duration::from_secs(300);
        cache.get_or_load(ttl, || Ok::<_, ()>("old")).unwrap();
        cache.invalidate();
        assert!(!cache.is_loaded());
        let v = cache.get_or_load(ttl, || Ok::<_, ()>("new")).unwrap();
        assert_eq!(*v, "new");
    }

    #[test]
    fn failures_are_not_cached() {
        let mut cache: DatasetCache<u32> = DatasetCache::new();
        let ttl = Duration::from_secs(300);
        assert!(cache.get_or_load(ttl, || Err("down")).is_err());
        assert!(!cache.is_loaded());
        assert_eq!(*cache.get_or_load(ttl, || Ok::<_, &str>(7)).unwrap(), 7);
    }

    #[test]
    fn expired_entry_is_not_served_after_failed_reload() {
        let mut cache = DatasetCache::new();
        let start = Instant::now();
        let ttl = Duration::from_secs(1);
        cache.get_or_load_at(start, ttl, || Ok::<_, &str>(1)).unwrap();
        let err = cache.get_or_load_at(start + ttl, ttl, || Err("down"));
        assert!(err.is_err());
        // The expired entry is still held but is never served past its ttl.
        let v = cache
            .get_or_load_at(start + ttl, ttl, || Ok::<_, &str>(3))
            .unwrap();
        assert_eq!(*v, 3);
    }
}
