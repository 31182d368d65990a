//! Single-slot, time-expiring memoization of the prepared dataset.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::PreparedDataset;
use crate::error::AppResult;

#[derive(Debug)]
struct CacheEntry {
    key: String,
    built_at: Instant,
    dataset: Arc<PreparedDataset>,
}

/// Holds at most one prepared dataset for `ttl`.
///
/// Builds run while the slot lock is held, so concurrent callers wait for
/// the in-flight build instead of starting their own. A failed (or
/// panicking) build leaves the previous slot untouched.
#[derive(Debug)]
pub struct DatasetCache {
    ttl: Duration,
    slot: Mutex<Option<CacheEntry>>,
}

impl DatasetCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached dataset for `key`, or build and store a new one.
    ///
    /// A different `key` (e.g. another configured source) forces a rebuild.
    pub fn get_or_build<F>(&self, key: &str, builder: F) -> AppResult<Arc<PreparedDataset>>
    where
        F: FnOnce() -> AppResult<PreparedDataset>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = slot.as_ref() {
            if entry.key == key && entry.built_at.elapsed() < self.ttl {
                log::debug!("cache: hit ({} rows)", entry.dataset.rows.len());
                return Ok(Arc::clone(&entry.dataset));
            }
            log::debug!("cache: expired or key changed, rebuilding");
        } else {
            log::debug!("cache: empty, building");
        }

        let dataset = Arc::new(builder()?);
        *slot = Some(CacheEntry {
            key: key.to_string(),
            built_at: Instant::now(),
            dataset: Arc::clone(&dataset),
        });
        Ok(dataset)
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DimensionTable, PreparedDataset};
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn empty_dataset() -> PreparedDataset {
        crate::data::enrich::enrich(Vec::new(), &DimensionTable::new(), &DimensionTable::new())
    }

    #[test]
    fn reuses_within_ttl() {
        let cache = DatasetCache::new(Duration::from_secs(60));
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(empty_dataset())
        };

        let a = cache.get_or_build("k", build).unwrap();
        let b = cache.get_or_build("k", build).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rebuilds_after_expiry_key_change_and_invalidate() {
        let cache = DatasetCache::new(Duration::from_millis(20));
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(empty_dataset())
        };

        cache.get_or_build("k", build).unwrap();
        thread::sleep(Duration::from_millis(40));
        cache.get_or_build("k", build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);

        cache.get_or_build("other", build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 3);

        cache.invalidate();
        cache.get_or_build("other", build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn failed_build_keeps_previous_state() {
        let cache = DatasetCache::new(Duration::from_secs(60));
        let first = cache.get_or_build("k", || Ok(empty_dataset())).unwrap();
        assert!(first.is_empty());

        let err = cache
            .get_or_build("other", || Err(AppError::DataUnavailable("down".into())))
            .unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));

        let builds = AtomicUsize::new(0);
        let again = cache
            .get_or_build("k", || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(empty_dataset())
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again), "failed rebuild replaced the cached dataset");
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concurrent_callers_share_one_build() {
        let cache = Arc::new(DatasetCache::new(Duration::from_secs(60)));
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                thread::spawn(move || {
                    cache
                        .get_or_build("k", || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(10));
                            Ok(empty_dataset())
                        })
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
