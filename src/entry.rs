// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache entry data structure.
//!
//! A [`CacheEntry`] is the unit stored by both tiers: the serialized payload
//! plus the bookkeeping eviction and TTL checks need. The persistent tier
//! writes it verbatim as a JSON envelope.

use serde::{Deserialize, Serialize};

/// Current wall-clock time in epoch millis.
#[inline]
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A cached value and its metadata.
///
/// # Example
///
/// ```
/// use tiered_cache::CacheEntry;
///
/// let entry = CacheEntry::new(r#"{"name":"alice"}"#.to_string(), 60, 1_000);
/// assert_eq!(entry.size_bytes, 16);
/// assert!(!entry.is_expired_at(1_000 + 60_000));
/// assert!(entry.is_expired_at(1_000 + 60_001));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized value (JSON text)
    pub payload: String,
    /// Creation timestamp (epoch millis)
    pub created_at: u64,
    /// Timestamp of last access (epoch millis)
    pub last_access: u64,
    /// Lifetime in seconds; 0 means "do not cache"
    pub ttl_secs: u64,
    /// Number of reads since the entry was written
    pub access_count: u64,
    /// Payload size, fixed at creation
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn new(payload: String, ttl_secs: u64, now: u64) -> Self {
        let size_bytes = payload.len();
        Self {
            payload,
            created_at: now,
            last_access: now,
            ttl_secs,
            access_count: 0,
            size_bytes,
        }
    }

    /// Zero-TTL entries count as expired from the moment they exist.
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        if self.ttl_secs == 0 {
            return true;
        }
        now.saturating_sub(self.created_at) > self.ttl_secs.saturating_mul(1000)
    }

    pub fn record_access(&mut self, now: u64) {
        self.last_access = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Shape check for entries read back from the persistent tier.
    pub fn validate(&self) -> Result<(), String> {
        if self.size_bytes != self.payload.len() {
            return Err(format!(
                "size mismatch: recorded {} bytes, payload has {}",
                self.size_bytes,
                self.payload.len()
            ));
        }
        if self.last_access < self.created_at {
            return Err("last access precedes creation".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry() {
        let entry = CacheEntry::new("\"value\"".to_string(), 30, 5_000);

        assert_eq!(entry.payload, "\"value\"");
        assert_eq!(entry.created_at, 5_000);
        assert_eq!(entry.last_access, 5_000);
        assert_eq!(entry.ttl_secs, 30);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.size_bytes, 7);
    }

    #[test]
    fn test_zero_ttl_is_always_expired() {
        let entry = CacheEntry::new("1".to_string(), 0, 5_000);
        assert!(entry.is_expired_at(5_000));
        assert!(entry.is_expired_at(0));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let entry = CacheEntry::new("1".to_string(), 1, 10_000);
        assert!(!entry.is_expired_at(10_000));
        assert!(!entry.is_expired_at(11_000));
        assert!(entry.is_expired_at(11_001));
    }

    #[test]
    fn test_clock_skew_does_not_expire() {
        // now earlier than created_at (wall clock stepped back)
        let entry = CacheEntry::new("1".to_string(), 1, 10_000);
        assert!(!entry.is_expired_at(9_000));
    }

    #[test]
    fn test_record_access() {
        let mut entry = CacheEntry::new("1".to_string(), 10, 1_000);
        entry.record_access(1_500);
        entry.record_access(2_000);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_access, 2_000);
        assert_eq!(entry.created_at, 1_000);
    }

    #[test]
    fn test_serialize_roundtrip_preserves_metadata() {
        let mut entry = CacheEntry::new(r#"{"k":[1,2,3]}"#.to_string(), 120, 42);
        entry.record_access(99);

        let json = serde_json::to_string(&entry).unwrap();
        let restored: CacheEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, entry);
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_size_mismatch() {
        let mut entry = CacheEntry::new("abc".to_string(), 10, 1);
        entry.size_bytes = 99;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_access_before_creation() {
        let mut entry = CacheEntry::new("abc".to_string(), 10, 1_000);
        entry.last_access = 10;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_now_millis_is_recent() {
        let now = now_millis();
        // 2020-01-01 in epoch millis
        assert!(now > 1_577_836_800_000);
    }
}
