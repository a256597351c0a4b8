use std::{path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Process level settings of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Public origin used in share, short and manage URLs, without a trailing `/`.
    pub base_url: String,
    pub rate_limit_window: Duration,
    pub rate_limit_per_window: u64,
    pub tracked_create_limit: u64,
    pub recent_scans_cap: usize,
    /// SQLite file holding tracked links. Tracked links live in memory when unset.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_per_window: 100,
            tracked_create_limit: 20,
            recent_scans_cap: 100,
            database_path: None,
        }
    }
}

impl Config {
    /// Reads the process environment, after loading a `.env` file if one exists.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Missing keys keep their default,
    /// unparsable ones are reported and keep their default as well.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let base_url = lookup("BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.base_url);

        let database_path =
            lookup("DATABASE_PATH").map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).map(PathBuf::from);

        let window = parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window.as_secs());
        Self {
            base_url,
            rate_limit_window: Duration::from_secs(window.max(1)),
            rate_limit_per_window: parse_or(&lookup, "RATE_LIMIT_PER_WINDOW", defaults.rate_limit_per_window),
            tracked_create_limit: parse_or(&lookup, "TRACKED_CREATE_LIMIT", defaults.tracked_create_limit),
            recent_scans_cap: parse_or(&lookup, "RECENT_SCANS_CAP", defaults.recent_scans_cap),
            database_path,
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, %default, "Ignoring unparsable setting");
            default
        }),
    }
}

#[cfg(test)]
mod config_tests {
    use std::{collections::HashMap, time::Duration};

    use super::Config;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
        assert_eq!(from_pairs(&[("DATABASE_PATH", "  ")]).database_path, None);
        assert_eq!(Config::default().base_url, "http://localhost:8000");
    }

    #[test]
    fn test_overrides() {
        let cfg = from_pairs(&[
            ("BASE_URL", "https://qr.example.com/"),
            ("RATE_LIMIT_WINDOW_SECS", "30"),
            ("RATE_LIMIT_PER_WINDOW", "5"),
            ("TRACKED_CREATE_LIMIT", "2"),
            ("RECENT_SCANS_CAP", "10"),
            ("DATABASE_PATH", "/var/lib/qrkit/tracked.db"),
        ]);
        assert_eq!(cfg.base_url, "https://qr.example.com");
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(30));
        assert_eq!(cfg.rate_limit_per_window, 5);
        assert_eq!(cfg.tracked_create_limit, 2);
        assert_eq!(cfg.recent_scans_cap, 10);
        assert_eq!(cfg.database_path.as_deref(), Some(std::path::Path::new("/var/lib/qrkit/tracked.db")));
    }

    #[test]
    fn test_unparsable_falls_back() {
        let cfg = from_pairs(&[("RATE_LIMIT_PER_WINDOW", "lots"), ("RECENT_SCANS_CAP", "-1")]);
        assert_eq!(cfg.rate_limit_per_window, 100);
        assert_eq!(cfg.recent_scans_cap, 100);
    }
}
