//! Per-backend environment overrides.
//!
//! Each backend id maps to a variable prefix in SCREAMING_SNAKE_CASE
//! (`userService` -> `USER_SERVICE`), and `{PREFIX}_URL`,
//! `{PREFIX}_TIMEOUT` and `{PREFIX}_RETRIES` replace the matching
//! config values. Values that fail to parse are ignored with a warning.

use super::model::Config;

#[must_use]
pub fn env_prefix(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 4);
    let mut prev_lower = false;
    for ch in id.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out
}

/// Apply overrides looked up through `lookup` (normally `std::env::var`).
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for backend in &mut config.backends {
        let prefix = env_prefix(&backend.id);

        if let Some(url) = lookup(&format!("{prefix}_URL")) {
            tracing::debug!(backend = %backend.id, url = %url, "url overridden from environment");
            backend.url = url;
        }

        let key = format!("{prefix}_TIMEOUT");
        if let Some(raw) = lookup(&key) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => backend.timeout = Some(ms),
                _ => tracing::warn!(var = %key, value = %raw, "ignoring invalid timeout override"),
            }
        }

        let key = format!("{prefix}_RETRIES");
        if let Some(raw) = lookup(&key) {
            match raw.trim().parse::<u32>() {
                Ok(n) => backend.retries = Some(n),
                Err(_) => tracing::warn!(var = %key, value = %raw, "ignoring invalid retries override"),
            }
        }
    }
}
