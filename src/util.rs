//! Shared utility functions used across the codebase.

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// everything else (including unset) maps to `default`.
pub fn env_var_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}

/// Read a strictly positive integer from the environment.
///
/// Unset, unparsable, zero and negative values all fall back to `default`.
pub fn env_var_positive(name: &str, default: u64) -> u64 {
    parse_positive(std::env::var(name).ok().as_deref(), default)
}

/// Pure part of [`env_var_positive`].
pub fn parse_positive(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|value| *value > 0)
        .map(|value| value as u64)
        .unwrap_or(default)
}

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}
