//! In-memory cache of resolved artifact URLs
//!
//! Entries are keyed by a request signature and never mutated; a new
//! resolution replaces the entry wholesale. Staleness is decided at read time
//! against a caller-supplied threshold, nothing is evicted in the background.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::artifact::error::RequestError;
use crate::config::MIN_CACHE_EXPIRATION_SECS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// An entry created before `threshold` must not be served
    pub fn is_expired(&self, threshold: DateTime<Utc>) -> bool {
        self.created_at < threshold
    }
}

/// Outcome of a cached resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResolution {
    /// Resolved URLs separated by newlines, empty when nothing matched
    pub url: String,
    pub from_cache: bool,
    /// Creation time of the entry backing this response, None if nothing was cached
    pub cached_at: Option<DateTime<Utc>>,
}

/// Concurrent signature → URL map, last writer wins
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(signature: &str) -> String {
        signature.to_lowercase()
    }

    pub fn get(&self, signature: &str) -> Option<CacheEntry> {
        self.entries
            .get(&Self::normalize(signature))
            .map(|entry| entry.value().clone())
    }

    /// Entry for `signature` unless it was created before `threshold`
    pub fn get_fresh(&self, signature: &str, threshold: DateTime<Utc>) -> Option<CacheEntry> {
        let entry = self.get(signature)?;
        if entry.is_expired(threshold) {
            debug!("Cache entry for '{}' is stale", signature);
            return None;
        }
        Some(entry)
    }

    /// Store `url` for `signature`, stamped with the current time
    pub fn put(&self, signature: &str, url: &str) {
        self.put_at(signature, url, Utc::now());
    }

    pub fn put_at(&self, signature: &str, url: &str, created_at: DateTime<Utc>) {
        self.entries.insert(
            Self::normalize(signature),
            CacheEntry {
                url: url.to_string(),
                created_at,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reject freshness windows below the enforced minimum
pub fn validate_expiration(seconds: u64) -> Result<u64, RequestError> {
    if seconds < MIN_CACHE_EXPIRATION_SECS {
        return Err(RequestError::ExpirationTooShort {
            seconds,
            minimum: MIN_CACHE_EXPIRATION_SECS,
        });
    }
    Ok(seconds)
}

/// Oldest creation time still considered fresh at `now`
pub fn freshness_threshold(now: DateTime<Utc>, expiration_secs: u64) -> DateTime<Utc> {
    i64::try_from(expiration_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
