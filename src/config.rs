//! Persistent application configuration model and defaults.

/// Root configuration persisted to `tunedeck.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Library browsing preferences.
    pub library: LibraryConfig,
    #[serde(default)]
    /// Media backend behavior.
    pub backend: BackendConfig,
}

/// Library browsing preferences.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    /// Directory the browser opens in. Empty means "resolve at startup":
    /// the platform music directory, then the home directory, then `.`.
    #[serde(default)]
    pub start_directory: String,
}

/// Media backend behavior.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BackendConfig {
    /// Cadence of the backend's progress/state poll.
    #[serde(default = "default_progress_poll_interval_ms")]
    pub progress_poll_interval_ms: u64,
}

fn default_progress_poll_interval_ms() -> u64 {
    1000
}

/// Floor for the backend poll cadence. Anything faster just burns CPU
/// re-reading an unchanged sink position.
pub const MIN_PROGRESS_POLL_INTERVAL_MS: u64 = 100;

impl Config {
    /// Returns a copy with out-of-range values pulled back into range.
    pub fn sanitized(self) -> Config {
        Config {
            library: self.library,
            backend: BackendConfig {
                progress_poll_interval_ms: self
                    .backend
                    .progress_poll_interval_ms
                    .max(MIN_PROGRESS_POLL_INTERVAL_MS),
            },
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            progress_poll_interval_ms: default_progress_poll_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert!(config.library.start_directory.is_empty());
        assert_eq!(config.backend.progress_poll_interval_ms, 1000);
    }

    #[test]
    fn test_empty_file_parses_to_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let content = r#"
            [library]
            start_directory = "/music"
        "#;
        let config: Config = toml::from_str(content).expect("partial config should parse");
        assert_eq!(config.library.start_directory, "/music");
        assert_eq!(config.backend.progress_poll_interval_ms, 1000);
    }

    #[test]
    fn test_sanitized_clamps_fast_poll_interval_to_floor() {
        let mut config = Config::default();
        config.backend.progress_poll_interval_ms = 10;

        let sanitized = config.sanitized();
        assert_eq!(sanitized.backend.progress_poll_interval_ms, 100);
    }

    #[test]
    fn test_sanitized_keeps_interval_at_or_above_floor() {
        let mut config = Config::default();
        config.library.start_directory = "/music".to_string();
        config.backend.progress_poll_interval_ms = 250;

        let sanitized = config.sanitized();
        assert_eq!(sanitized.backend.progress_poll_interval_ms, 250);
        assert_eq!(sanitized.library.start_directory, "/music");
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let mut config = Config::default();
        config.library.start_directory = "/srv/audio".to_string();
        config.backend.progress_poll_interval_ms = 250;

        let serialized = toml::to_string(&config).expect("config should serialize");
        let parsed: Config = toml::from_str(&serialized).expect("config should re-parse");
        assert_eq!(parsed, config);
    }
}
