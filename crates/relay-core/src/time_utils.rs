/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `expires_unix` is present and no longer in the future.
pub fn is_expired_unix(expires_unix: Option<u64>, now_unix: u64) -> bool {
    matches!(expires_unix, Some(value) if value <= now_unix)
}

/// Returns true when `expires_unix` falls inside `window_seconds` of `now_unix`
/// (or has already passed). Tokens without an expiry never need a refresh.
pub fn is_within_refresh_window(
    expires_unix: Option<u64>,
    now_unix: u64,
    window_seconds: u64,
) -> bool {
    is_expired_unix(expires_unix, now_unix.saturating_add(window_seconds))
}

#[cfg(test)]
mod tests {
    use super::is_within_refresh_window;

    #[test]
    fn unit_is_within_refresh_window_treats_missing_expiry_as_fresh() {
        assert!(!is_within_refresh_window(None, 1_000, 300));
    }

    #[test]
    fn functional_is_within_refresh_window_flags_tokens_near_expiry() {
        assert!(is_within_refresh_window(Some(1_200), 1_000, 300));
        assert!(is_within_refresh_window(Some(900), 1_000, 300));
        assert!(!is_within_refresh_window(Some(1_301), 1_000, 300));
    }
}
