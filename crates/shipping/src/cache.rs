//! TTL cache for the configured tier table.
//!
//! The tier configuration comes from outside the process and changes
//! rarely, so lookups go through an explicit cache object with an injected
//! clock and TTL. Tests drive staleness deterministically through the
//! clock; there is no hidden module-global state.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::tariff::{ShippingError, TierTable};

/// Time source seam.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheSlot {
    table: TierTable,
    loaded_at: DateTime<Utc>,
}

/// Caches a validated [`TierTable`] for `ttl`, reloading through the
/// supplied loader once the entry goes stale.
pub struct TierCache<C: Clock = SystemClock> {
    clock: C,
    ttl: Duration,
    slot: Mutex<Option<Arc<CacheSlot>>>,
}

impl TierCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> TierCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            clock,
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Get the cached table, invoking `load` when the cache is empty or
    /// stale. A failed reload does not clobber an existing (stale) entry;
    /// the error is returned and the next call retries.
    pub fn get(
        &self,
        load: impl FnOnce() -> Result<TierTable, ShippingError>,
    ) -> Result<TierTable, ShippingError> {
        let now = self.clock.now();

        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(cached) = slot.as_ref() {
            if now - cached.loaded_at < self.ttl {
                return Ok(cached.table.clone());
            }
        }

        let table = load()?;
        *slot = Some(Arc::new(CacheSlot {
            table: table.clone(),
            loaded_at: now,
        }));
        Ok(table)
    }

    /// Drop the cached entry; the next `get` reloads.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::ShippingTier;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    struct StepClock {
        seconds: AtomicI64,
    }

    impl StepClock {
        fn new() -> Self {
            Self {
                seconds: AtomicI64::new(0),
            }
        }

        fn advance(&self, secs: i64) {
            self.seconds.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for &StepClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::<Utc>::from_timestamp(self.seconds.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    fn table(code: &str) -> TierTable {
        TierTable::new(vec![ShippingTier {
            max_grams: 1000,
            amount: 490,
            code: code.to_string(),
        }])
        .unwrap()
    }

    #[test]
    fn serves_cached_table_within_ttl() {
        let clock = StepClock::new();
        let cache = TierCache::with_clock(Duration::seconds(60), &clock);
        let loads = AtomicUsize::new(0);

        let load = |code: &'static str| {
            || {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(table(code))
            }
        };

        assert_eq!(cache.get(load("a")).unwrap().tiers()[0].code, "a");
        clock.advance(59);
        // Still fresh: second loader must not run.
        assert_eq!(cache.get(load("b")).unwrap().tiers()[0].code, "a");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reloads_once_stale() {
        let clock = StepClock::new();
        let cache = TierCache::with_clock(Duration::seconds(60), &clock);

        cache.get(|| Ok(table("old"))).unwrap();
        clock.advance(60);
        let fresh = cache.get(|| Ok(table("new"))).unwrap();
        assert_eq!(fresh.tiers()[0].code, "new");
    }

    #[test]
    fn failed_reload_surfaces_error_and_retries_next_call() {
        let clock = StepClock::new();
        let cache = TierCache::with_clock(Duration::seconds(10), &clock);

        cache.get(|| Ok(table("old"))).unwrap();
        clock.advance(11);
        assert!(cache.get(|| Err(ShippingError::EmptyTable)).is_err());
        let recovered = cache.get(|| Ok(table("recovered"))).unwrap();
        assert_eq!(recovered.tiers()[0].code, "recovered");
    }

    #[test]
    fn invalidate_forces_reload() {
        let clock = StepClock::new();
        let cache = TierCache::with_clock(Duration::seconds(60), &clock);

        cache.get(|| Ok(table("a"))).unwrap();
        cache.invalidate();
        let fresh = cache.get(|| Ok(table("b"))).unwrap();
        assert_eq!(fresh.tiers()[0].code, "b");
    }
}
