//! In-memory stream cache with time-based expiry
//!
//! One entry per channel id, overwritten by each successful resolution and
//! never removed. Expiry is computed at read time from the entry's origin:
//! scraped entries live for the full TTL, fallback entries for a fraction of it.

use crate::models::StreamInfo;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

/// Default lifetime of a scraped stream URL (30 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Share of the TTL granted to fallback entries
pub const FALLBACK_TTL_PERCENT: u32 = 20;

/// Lifetimes applied to cache entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub fallback_ttl: Duration,
}

impl CachePolicy {
    /// Policy with the fallback TTL derived from `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            fallback_ttl: fallback_share(ttl),
        }
    }

    pub fn ttl_for(&self, origin: EntryOrigin) -> Duration {
        match origin {
            EntryOrigin::Scraped => self.ttl,
            EntryOrigin::Fallback => self.fallback_ttl,
        }
    }
}

/// [`FALLBACK_TTL_PERCENT`] of `ttl`; divides first so any `Duration` works
pub fn fallback_share(ttl: Duration) -> Duration {
    ttl / 100 * FALLBACK_TTL_PERCENT
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

/// How a cached stream URL was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryOrigin {
    Scraped,
    Fallback,
}

/// A resolved stream and when it was fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub stream_info: StreamInfo,
    pub fetched_at: SystemTime,
    pub origin: EntryOrigin,
}

impl CacheEntry {
    pub fn new(stream_info: StreamInfo, fetched_at: SystemTime, origin: EntryOrigin) -> Self {
        Self {
            stream_info,
            fetched_at,
            origin,
        }
    }

    /// `None` when the expiry lies beyond what `SystemTime` can represent
    pub fn expires_at(&self, policy: &CachePolicy) -> Option<SystemTime> {
        self.fetched_at.checked_add(policy.ttl_for(self.origin))
    }

    /// Valid while `now - fetched_at < ttl`
    ///
    /// A clock that went backwards counts as zero elapsed time.
    pub fn is_valid(&self, now: SystemTime, policy: &CachePolicy) -> bool {
        let age = now.duration_since(self.fetched_at).unwrap_or_default();
        age < policy.ttl_for(self.origin)
    }
}

/// Channel id → last resolved stream
///
/// The lock is only taken for map access and never held across an `.await`.
#[derive(Debug, Default)]
pub struct StreamCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl StreamCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `id`, valid or not
    pub fn get(&self, id: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Entry for `id` if still valid at `now`
    pub fn get_valid(&self, id: &str, now: SystemTime, policy: &CachePolicy) -> Option<CacheEntry> {
        self.get(id).filter(|entry| entry.is_valid(now, policy))
    }

    pub fn insert(&self, id: impl Into<String>, entry: CacheEntry) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(origin: EntryOrigin, at: SystemTime) -> CacheEntry {
        CacheEntry::new(StreamInfo::from_url("https://host/live.m3u8"), at, origin)
    }

    #[test]
    fn test_default_policy() {
        let policy = CachePolicy::default();
        assert_eq!(policy.ttl, Duration::from_secs(1800));
        assert_eq!(policy.fallback_ttl, Duration::from_secs(360));
    }

    #[test]
    fn test_scraped_entry_expiry() {
        let policy = CachePolicy::default();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let e = entry(EntryOrigin::Scraped, t0);

        assert!(e.is_valid(t0, &policy));
        assert!(e.is_valid(t0 + Duration::from_secs(1799), &policy));
        assert!(!e.is_valid(t0 + Duration::from_secs(1800), &policy));
        assert_eq!(e.expires_at(&policy), Some(t0 + Duration::from_secs(1800)));
    }

    #[test]
    fn test_fallback_entry_expiry() {
        let policy = CachePolicy::default();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let e = entry(EntryOrigin::Fallback, t0);

        assert!(e.is_valid(t0 + Duration::from_secs(359), &policy));
        assert!(!e.is_valid(t0 + Duration::from_secs(360), &policy));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let policy = CachePolicy::with_ttl(Duration::from_secs(u64::MAX / 10));
        assert_eq!(policy.fallback_ttl, Duration::from_secs(u64::MAX / 10) / 5);

        let policy = CachePolicy::with_ttl(Duration::MAX);
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let e = entry(EntryOrigin::Scraped, t0);
        assert_eq!(e.expires_at(&policy), None);
        assert!(e.is_valid(t0 + Duration::from_secs(10 * 365 * 24 * 3600), &policy));
    }

    #[test]
    fn test_clock_going_backwards_keeps_entry_valid() {
        let policy = CachePolicy::default();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let e = entry(EntryOrigin::Scraped, t0);
        assert!(e.is_valid(t0 - Duration::from_secs(60), &policy));
    }

    #[test]
    fn test_cache_overwrites_entries() {
        let policy = CachePolicy::default();
        let cache = StreamCache::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        assert!(cache.is_empty());

        cache.insert("radio1", entry(EntryOrigin::Fallback, t0));
        cache.insert(
            "radio1",
            CacheEntry::new(
                StreamInfo::from_url("https://other/stream"),
                t0,
                EntryOrigin::Scraped,
            ),
        );

        assert_eq!(cache.len(), 1);
        let got = cache.get("radio1").unwrap();
        assert_eq!(got.stream_info.url, "https://other/stream");
        assert_eq!(got.origin, EntryOrigin::Scraped);

        assert!(cache.get_valid("radio1", t0, &policy).is_some());
        assert!(cache
            .get_valid("radio1", t0 + Duration::from_secs(3600), &policy)
            .is_none());
        // expired entries stay readable
        assert!(cache.get("radio1").is_some());
    }
}
