//! Persistent position → reverse-lookup cache.
//!
//! The cache is the only component that talks to the geocoder. It is
//! created empty or loaded from disk once per run, never merged, and saved
//! at the end of the run iff something changed. Entries are additive: once
//! a position has an entry it is never overwritten, so each coordinate
//! costs at most one network lookup for the lifetime of the cache file.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Position;
use crate::address;
use crate::nominatim::{GeocodeError, ReverseGeocode};

/// Pause after every actual network lookup, per the public Nominatim usage
/// policy of 1 request per second. Cache hits never pause.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

/// A recorded lookup. Absence from the cache means the position was never
/// attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachedLookup {
    /// The lookup ran but produced no usable payload.
    Empty,
    /// Raw response body as returned by the service.
    Raw(Vec<u8>),
}

/// Errors from cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Refusing to load into a cache that already has entries.
    #[error("reverse cache not empty, refusing to load from file")]
    NotEmpty,

    /// Reading or writing the cache file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The cache file could not be decoded.
    #[error("decode cache file: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The cache could not be encoded for writing.
    #[error("encode cache file: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Position → raw reverse-lookup mapping with run-scoped dirty tracking.
///
/// Owns its geocoding backend; callers construct one cache per batch run
/// and pass it through the enrichment pipeline.
pub struct ReverseCache {
    table: BTreeMap<Position, CachedLookup>,
    dirty: bool,
    geocoder: Box<dyn ReverseGeocode>,
    throttle: Duration,
}

impl ReverseCache {
    /// Creates an empty cache around a geocoding backend, throttled to
    /// [`DEFAULT_THROTTLE`] after each lookup.
    #[must_use]
    pub fn new(geocoder: Box<dyn ReverseGeocode>) -> Self {
        Self::with_throttle(geocoder, DEFAULT_THROTTLE)
    }

    /// Creates an empty cache with a custom post-lookup pause. Tests pass
    /// [`Duration::ZERO`].
    #[must_use]
    pub fn with_throttle(geocoder: Box<dyn ReverseGeocode>, throttle: Duration) -> Self {
        Self {
            table: BTreeMap::new(),
            dirty: false,
            geocoder,
            throttle,
        }
    }

    /// Number of cached positions (attempted lookups, successful or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// True iff a lookup for `pos` was already attempted.
    #[must_use]
    pub fn has(&self, pos: Position) -> bool {
        self.table.contains_key(&pos)
    }

    /// Ensures `pos` has a cache entry, performing at most one network
    /// lookup.
    ///
    /// Transport failures are cached as [`CachedLookup::Empty`] so the
    /// position is not re-attempted on every run. A rejecting HTTP status
    /// is logged with its code but not cached, leaving the position
    /// retryable on a future run. Pauses for the configured throttle after
    /// any actual lookup; a no-op on cache hits.
    pub async fn add(&mut self, pos: Position) {
        if self.has(pos) {
            return;
        }

        match self.geocoder.reverse(pos).await {
            Ok(raw) => {
                self.table.insert(pos, CachedLookup::Raw(raw));
            }
            Err(err @ GeocodeError::Status { .. }) => {
                log::warn!("{pos}: {err} (nothing cached)");
            }
            Err(err) => {
                log::warn!("{pos}: {err} (cached as empty)");
                self.table.insert(pos, CachedLookup::Empty);
            }
        }
        self.dirty = true;

        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }

    /// Formats the cached address for `pos`.
    ///
    /// Sentinels mark the degraded cases: `"?????"` never looked up,
    /// `"????"` looked up without payload, `"???"` unparseable payload,
    /// `"??"` parsed but entirely empty.
    #[must_use]
    pub fn format_address(&self, pos: Position) -> String {
        match self.table.get(&pos) {
            None => "?????".to_string(),
            Some(CachedLookup::Empty) => {
                log::debug!("{pos}: cached lookup is empty");
                "????".to_string()
            }
            Some(CachedLookup::Raw(raw)) => match address::format_address(raw) {
                Ok(formatted) => formatted,
                Err(err) => {
                    log::warn!("{pos}: {err}");
                    "???".to_string()
                }
            },
        }
    }

    /// Loads persisted entries into this cache.
    ///
    /// A missing file means a first run: the cache starts empty. Loading
    /// into a non-empty cache would silently merge two divergent states
    /// and is a caller bug.
    ///
    /// # Errors
    ///
    /// [`CacheError::NotEmpty`] when entries are already present,
    /// [`CacheError::Io`] / [`CacheError::Decode`] when the file cannot be
    /// read or decoded.
    pub fn load(&mut self, path: &Path) -> Result<(), CacheError> {
        if !self.table.is_empty() {
            return Err(CacheError::NotEmpty);
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no cache file at {}, starting empty", path.display());
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        self.table = rmp_serde::from_slice(&bytes)?;
        log::info!(
            "reverse cache loaded with {} entries from {}",
            self.table.len(),
            path.display()
        );
        Ok(())
    }

    /// Writes all entries to `path`, replacing previous contents. A clean
    /// cache writes nothing.
    ///
    /// # Errors
    ///
    /// [`CacheError::Encode`] / [`CacheError::Io`] when serialization or
    /// the write fails.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if !self.dirty {
            log::info!("reverse cache not modified, not saving");
            return Ok(());
        }

        let bytes = rmp_serde::to_vec(&self.table)?;
        std::fs::write(path, bytes)?;
        log::info!(
            "reverse cache saved with {} entries to {}",
            self.table.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    /// Deterministic geocoder: hands out queued responses, counts calls,
    /// answers HTTP 500 when the queue runs dry.
    struct FakeGeocoder {
        responses: Mutex<VecDeque<Result<Vec<u8>, GeocodeError>>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReverseGeocode for FakeGeocoder {
        async fn reverse(&self, _pos: Position) -> Result<Vec<u8>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GeocodeError::Status { status: 500 }))
        }
    }

    /// Cache over a fake geocoder, no throttle. The counter tracks how
    /// many network lookups the cache issued.
    fn cache_with(responses: Vec<Result<Vec<u8>, GeocodeError>>) -> (ReverseCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let geocoder = FakeGeocoder {
            responses: Mutex::new(responses.into()),
            calls: Arc::clone(&calls),
        };
        (
            ReverseCache::with_throttle(Box::new(geocoder), Duration::ZERO),
            calls,
        )
    }

    /// A real transport-level `reqwest::Error`, produced without touching
    /// the network by sending to an unparseable URL.
    async fn transport_error() -> GeocodeError {
        let err = reqwest::Client::new()
            .get("http://")
            .send()
            .await
            .unwrap_err();
        GeocodeError::Transport(err)
    }

    fn ok_payload() -> Result<Vec<u8>, GeocodeError> {
        Ok(serde_json::json!({
            "address": {
                "road": "Storgatan",
                "city": "Lund",
                "country_code": "se",
            }
        })
        .to_string()
        .into_bytes())
    }

    fn scratch_file(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn add_is_idempotent_per_position() {
        let (mut cache, calls) = cache_with(vec![ok_payload()]);
        let pos = Position::new(55.7, 13.2);

        assert!(!cache.has(pos));
        cache.add(pos).await;
        assert!(cache.has(pos));
        cache.add(pos).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.format_address(pos), "Storgatan, Lund");
    }

    #[tokio::test]
    async fn status_error_is_not_cached() {
        let (mut cache, calls) = cache_with(vec![]);
        let pos = Position::new(55.7, 13.2);

        cache.add(pos).await;

        assert!(!cache.has(pos));
        assert_eq!(cache.format_address(pos), "?????");
        // Retryable: a second add issues a second request.
        cache.add(pos).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_error_is_cached_as_empty() {
        let (mut cache, calls) = cache_with(vec![Err(transport_error().await)]);
        let pos = Position::new(55.7, 13.2);

        cache.add(pos).await;

        assert!(cache.has(pos));
        assert_eq!(cache.format_address(pos), "????");
        // Not retried while the entry lives.
        cache.add(pos).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unparseable_payload_formats_as_parse_sentinel() {
        let (mut cache, _) = cache_with(vec![Ok(b"not json".to_vec())]);
        let pos = Position::new(55.7, 13.2);

        cache.add(pos).await;
        assert_eq!(cache.format_address(pos), "???");
    }

    #[tokio::test]
    async fn empty_address_formats_as_empty_sentinel() {
        let (mut cache, _) = cache_with(vec![Ok(serde_json::json!({"address": {}})
            .to_string()
            .into_bytes())]);
        let pos = Position::new(55.7, 13.2);

        cache.add(pos).await;
        assert_eq!(cache.format_address(pos), "??");
    }

    #[tokio::test]
    async fn bit_identical_positions_share_an_entry() {
        let (mut cache, calls) = cache_with(vec![ok_payload(), ok_payload()]);

        let a = Position::new(55.7, 13.2);
        let b = Position::new(55.7, 13.2);
        cache.add(a).await;
        cache.add(b).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let nudged = Position::new(f64::from_bits(a.lat.to_bits() + 1), a.lon);
        cache.add(nudged).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn save_load_round_trips_entries_and_markers() {
        let path = scratch_file("fruit_map_reversecache_roundtrip");

        let (mut cache, _) = cache_with(vec![ok_payload(), Err(transport_error().await)]);
        let resolved = Position::new(55.7, 13.2);
        let failed = Position::new(56.0, 14.0);
        cache.add(resolved).await;
        cache.add(failed).await;
        cache.save(&path).unwrap();

        let (mut reloaded, _) = cache_with(vec![]);
        reloaded.load(&path).unwrap();

        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.has(resolved));
        assert!(reloaded.has(failed));
        assert_eq!(reloaded.format_address(resolved), "Storgatan, Lund");
        // The empty marker survives as "looked up, nothing there".
        assert_eq!(reloaded.format_address(failed), "????");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn clean_cache_saves_nothing() {
        let path = scratch_file("fruit_map_reversecache_clean");

        let (cache, _) = cache_with(vec![]);
        cache.save(&path).unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn loaded_cache_is_clean_until_mutated() {
        let path = scratch_file("fruit_map_reversecache_loadclean");
        let copy = scratch_file("fruit_map_reversecache_loadclean_copy");

        let (mut cache, _) = cache_with(vec![ok_payload()]);
        cache.add(Position::new(55.7, 13.2)).await;
        cache.save(&path).unwrap();

        let (mut reloaded, _) = cache_with(vec![]);
        reloaded.load(&path).unwrap();
        reloaded.save(&copy).unwrap();
        assert!(!copy.exists());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn load_into_non_empty_cache_is_refused() {
        let path = scratch_file("fruit_map_reversecache_nonempty");

        let (mut cache, _) = cache_with(vec![ok_payload()]);
        cache.add(Position::new(55.7, 13.2)).await;

        assert!(matches!(cache.load(&path), Err(CacheError::NotEmpty)));
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let path = scratch_file("fruit_map_reversecache_missing");

        let (mut cache, _) = cache_with(vec![]);
        cache.load(&path).unwrap();
        assert!(cache.is_empty());
    }
}
