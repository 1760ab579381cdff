//! Foundational low-level utilities shared across relay crates.
//!
//! Provides time helpers, expiry checks, and short deterministic hashes used by
//! credential caching and correlation-id generation.

pub mod key_hash;
pub mod time_utils;

pub use key_hash::{sha256_hex, short_key_hash};
pub use time_utils::{
    current_unix_timestamp, current_unix_timestamp_ms, is_expired_unix, is_within_refresh_window,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_utils_round_trip_bounds() {
        let now_s = current_unix_timestamp();
        let now_ms = current_unix_timestamp_ms();
        let now_ms_s = now_ms / 1_000;
        assert!(now_ms_s >= now_s);
        assert!(now_ms_s <= now_s.saturating_add(1));
    }

    #[test]
    fn is_expired_unix_respects_none_and_bounds() {
        let now = current_unix_timestamp();
        assert!(!is_expired_unix(None, now));
        assert!(is_expired_unix(Some(now), now));
        assert!(is_expired_unix(Some(now.saturating_sub(1)), now));
        assert!(!is_expired_unix(Some(now.saturating_add(1)), now));
    }
}
