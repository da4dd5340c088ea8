//! Time-bounded concurrent cache with sliding expiration.
//!
//! Entries expire `ttl` after they were last written, or last read when
//! revalidation is on. Expired entries are never returned; they are dropped
//! lazily on access and in bulk by a background sweep thread.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Cache policy
#[derive(Debug, Clone)]
pub struct TtlConfig {
    pub ttl: Duration,
    /// Slide the expiry forward on every hit
    pub revalidate: bool,
    /// How often the sweeper purges lapsed entries; `None` disables it
    pub sweep_interval: Option<Duration>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            revalidate: true,
            sweep_interval: Some(Duration::from_secs(15 * 60)),
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct Shared<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    revalidate: bool,
}

impl<K: Eq + Hash, V> Shared<K, V> {
    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

/// Stops the sweep thread when dropped
#[derive(Debug)]
struct Sweeper {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the thread immediately
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Cache sweep thread panicked");
            }
        }
    }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    shared: Arc<Shared<K, V>>,
    _sweeper: Option<Sweeper>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: TtlConfig) -> Self {
        let shared = Arc::new(Shared {
            entries: RwLock::new(HashMap::new()),
            ttl: config.ttl,
            revalidate: config.revalidate,
        });

        let sweeper = config
            .sweep_interval
            .and_then(|interval| spawn_sweeper(Arc::downgrade(&shared), interval));

        Self {
            shared,
            _sweeper: sweeper,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    pub fn set(&self, key: K, value: V) {
        self.set_at(key, value, Instant::now());
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.shared
            .entries
            .write()
            .remove(key)
            .map(|entry| entry.value)
    }

    /// Stored entries, including lapsed ones the sweeper has not reached yet
    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every lapsed entry now, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn set_at(&self, key: K, value: V, now: Instant) {
        let expires_at = now + self.shared.ttl;
        self.shared
            .entries
            .write()
            .insert(key, Entry { value, expires_at });
    }

    pub(crate) fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        if !self.shared.revalidate {
            let entries = self.shared.entries.read();
            let entry = entries.get(key)?;
            return (entry.expires_at > now).then(|| entry.value.clone());
        }

        let mut entries = self.shared.entries.write();
        let entry = entries.get_mut(key)?;
        if entry.expires_at <= now {
            entries.remove(key);
            return None;
        }
        entry.expires_at = now + self.shared.ttl;
        Some(entry.value.clone())
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        self.shared.purge_expired_at(now)
    }
}

fn spawn_sweeper<K, V>(shared: Weak<Shared<K, V>>, interval: Duration) -> Option<Sweeper>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let spawned = thread::Builder::new()
        .name("ttl-cache-sweep".to_string())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let Some(shared) = shared.upgrade() else {
                        break;
                    };
                    let purged = shared.purge_expired_at(Instant::now());
                    if purged > 0 {
                        debug!("Swept {} expired cache entries", purged);
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

    match spawned {
        Ok(handle) => {
            trace!("Started cache sweeper every {:?}", interval);
            Some(Sweeper {
                stop: Some(stop_tx),
                handle: Some(handle),
            })
        }
        Err(e) => {
            warn!("Failed to start cache sweeper, expiry stays lazy: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual(ttl_secs: u64, revalidate: bool) -> TtlCache<String, u32> {
        TtlCache::new(TtlConfig {
            ttl: Duration::from_secs(ttl_secs),
            revalidate,
            sweep_interval: None,
        })
    }

    #[test]
    fn test_get_before_and_after_ttl() {
        let cache = manual(10, false);
        let t0 = Instant::now();
        cache.set_at("a".into(), 1, t0);

        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(9)), Some(1));
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_hit_slides_expiry() {
        let cache = manual(10, true);
        let t0 = Instant::now();
        cache.set_at("a".into(), 1, t0);

        // Accessed just before the boundary: extended by a full ttl
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(9)), Some(1));
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(18)), Some(1));
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(27)), Some(1));
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(38)), None);
    }

    #[test]
    fn test_without_revalidation_expiry_is_fixed() {
        let cache = manual(10, false);
        let t0 = Instant::now();
        cache.set_at("a".into(), 1, t0);
        cache.get_at(&"a".into(), t0 + Duration::from_secs(9));
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(11)), None);
    }

    #[test]
    fn test_set_refreshes_value_and_expiry() {
        let cache = manual(10, false);
        let t0 = Instant::now();
        cache.set_at("a".into(), 1, t0);
        cache.set_at("a".into(), 2, t0 + Duration::from_secs(8));
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(15)), Some(2));
    }

    #[test]
    fn test_expired_read_drops_entry() {
        let cache = manual(10, true);
        let t0 = Instant::now();
        cache.set_at("a".into(), 1, t0);
        assert_eq!(cache.get_at(&"a".into(), t0 + Duration::from_secs(20)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_only_removes_lapsed() {
        let cache = manual(10, true);
        let t0 = Instant::now();
        cache.set_at("old".into(), 1, t0);
        cache.set_at("fresh".into(), 2, t0 + Duration::from_secs(5));

        assert_eq!(cache.purge_expired_at(t0 + Duration::from_secs(12)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&"fresh".into(), t0 + Duration::from_secs(12)), Some(2));
    }

    #[test]
    fn test_purge_expired_uses_wall_clock() {
        let cache = manual(0, false);
        cache.set("gone".into(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());

        let cache = manual(600, false);
        cache.set("kept".into(), 1);
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_background_sweep_purges_idle_entries() {
        let cache: TtlCache<String, u32> = TtlCache::new(TtlConfig {
            ttl: Duration::from_millis(30),
            revalidate: true,
            sweep_interval: Some(Duration::from_millis(20)),
        });
        cache.set("idle".into(), 1);
        assert_eq!(cache.len(), 1);

        // ttl + a few sweep intervals
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cache.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(cache.is_empty(), "sweeper should have purged the idle entry");
    }

    #[test]
    fn test_dropping_cache_stops_sweeper() {
        let cache: TtlCache<String, u32> = TtlCache::new(TtlConfig {
            ttl: Duration::from_secs(1),
            revalidate: true,
            sweep_interval: Some(Duration::from_secs(3600)),
        });
        cache.set("a".into(), 1);
        // Must return promptly instead of waiting out the interval
        let started = Instant::now();
        drop(cache);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
