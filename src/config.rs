//! Debug bar configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_ENTRY_TTL_SECS: u64 = 60;
pub const DEFAULT_ASSET_MAX_AGE_SECS: u64 = 864_000;
pub const DEFAULT_CONTENT_MAX_AGE_SECS: u64 = 60;
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarConfig {
    /// Max entries kept per relay queue.
    pub queue_capacity: usize,
    /// How long a relayed entry stays deliverable.
    pub entry_ttl: Duration,
    /// `Cache-Control: max-age` for the asset bundle.
    pub asset_max_age_secs: u64,
    /// `Cache-Control: max-age` for content responses.
    pub content_max_age_secs: u64,
    /// Largest HTML body the middleware buffers to inject the loader.
    pub max_body_bytes: usize,
    /// Extra stylesheets appended to the bundle, in order.
    pub custom_css_files: Vec<PathBuf>,
    /// Extra scripts appended to the bundle, in order.
    pub custom_js_files: Vec<PathBuf>,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            entry_ttl: Duration::from_secs(DEFAULT_ENTRY_TTL_SECS),
            asset_max_age_secs: DEFAULT_ASSET_MAX_AGE_SECS,
            content_max_age_secs: DEFAULT_CONTENT_MAX_AGE_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            custom_css_files: Vec::new(),
            custom_js_files: Vec::new(),
        }
    }
}

impl BarConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `DEBUG_BAR_QUEUE_CAPACITY`: default 10
    /// - `DEBUG_BAR_ENTRY_TTL_SECS`: default 60
    /// - `DEBUG_BAR_ASSET_MAX_AGE_SECS`: default 864000
    /// - `DEBUG_BAR_CONTENT_MAX_AGE_SECS`: default 60
    /// - `DEBUG_BAR_MAX_BODY_BYTES`: default 8 MiB
    /// - `DEBUG_BAR_CUSTOM_CSS`, `DEBUG_BAR_CUSTOM_JS`: comma-separated paths
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            queue_capacity: env_parse("DEBUG_BAR_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY).max(1),
            entry_ttl: Duration::from_secs(env_parse("DEBUG_BAR_ENTRY_TTL_SECS", DEFAULT_ENTRY_TTL_SECS)),
            asset_max_age_secs: env_parse("DEBUG_BAR_ASSET_MAX_AGE_SECS", DEFAULT_ASSET_MAX_AGE_SECS),
            content_max_age_secs: env_parse("DEBUG_BAR_CONTENT_MAX_AGE_SECS", DEFAULT_CONTENT_MAX_AGE_SECS),
            max_body_bytes: env_parse("DEBUG_BAR_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            custom_css_files: parse_path_list(std::env::var("DEBUG_BAR_CUSTOM_CSS").ok().as_deref()),
            custom_js_files: parse_path_list(std::env::var("DEBUG_BAR_CUSTOM_JS").ok().as_deref()),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Boolean env var accepting the usual on/off words.
#[must_use]
pub fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn parse_path_list(raw: Option<&str>) -> Vec<PathBuf> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
