use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{ConfigError, ConfigResult};
use crate::rules::RuleSet;
use crate::run::RunMode;
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub run: RunConfig,
    pub reporting: ReportingConfig,
    pub diagnostics: DiagnosticsConfig,
    pub rules: RuleSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Playlist to filter (M3U)
    pub playlist: Option<PathBuf>,
    /// Guide to filter (XMLTV, optionally gzip compressed)
    pub guide: Option<PathBuf>,
    /// Directory receiving the kept/removed outputs
    pub output_dir: PathBuf,
    /// Optional user-visible directory the kept outputs are copied to
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,
    /// Buffer size of the progress broadcast channel
    pub progress_channel_capacity: usize,
}

/// Sampling cadence of the progress reporter, per phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    #[serde(with = "duration_serde::duration")]
    pub playlist_interval: Duration,
    #[serde(with = "duration_serde::duration")]
    pub guide_interval: Duration,
    #[serde(with = "duration_serde::duration")]
    pub counting_interval: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Append-only file receiving a record per malformed-input failure
    pub crash_log: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            playlist: None,
            guide: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            export_dir: None,
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            playlist_interval: Duration::from_millis(DEFAULT_PLAYLIST_REPORT_INTERVAL_MS),
            guide_interval: Duration::from_millis(DEFAULT_GUIDE_REPORT_INTERVAL_MS),
            counting_interval: Duration::from_millis(DEFAULT_COUNTING_REPORT_INTERVAL_MS),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            progress_channel_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    pub fn load() -> ConfigResult<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_file(&config_file)
    }

    /// Load from a TOML file with `CHANNEL_FILTER_` environment overrides,
    /// writing a default file first if none exists
    pub fn load_from_file(config_file: &str) -> ConfigResult<Self> {
        let path = Path::new(config_file);
        if !path.exists() {
            let contents = toml::to_string_pretty(&Self::default())
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            std::fs::write(path, contents)
                .map_err(|e| ConfigError::Parse(format!("cannot write {config_file}: {e}")))?;
            info!("Created default config file: {}", config_file);
        }

        Self::figment(path).extract().map_err(ConfigError::from)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::ThrottleSpeed;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_reporting_cadence() {
        let config = Config::default();
        assert_eq!(config.reporting.playlist_interval, Duration::from_millis(500));
        assert_eq!(config.reporting.guide_interval, Duration::from_millis(500));
        assert_eq!(config.reporting.counting_interval, Duration::from_secs(1));
        assert_eq!(config.run.mode, RunMode::Manual);
    }

    #[test]
    fn test_from_toml_str() {
        let config = Config::from_toml_str(
            r#"
[paths]
playlist = "/data/playlist.m3u"
output_dir = "/data/out"

[run]
mode = "automatic"

[reporting]
guide_interval = "250ms"

[rules]
remove_duplicates = true

[rules.news]
items = ["fox_news"]

[rules.throttle]
automatic = "slow"
"#,
        )
        .unwrap();

        assert_eq!(config.paths.playlist, Some(PathBuf::from("/data/playlist.m3u")));
        assert_eq!(config.paths.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.run.mode, RunMode::Automatic);
        assert_eq!(config.reporting.guide_interval, Duration::from_millis(250));
        assert_eq!(config.reporting.playlist_interval, Duration::from_millis(500));
        assert!(config.rules.remove_duplicates);
        assert!(config.rules.news.items.contains("fox_news"));
        assert_eq!(config.rules.throttle.automatic, ThrottleSpeed::Slow);
        assert_eq!(config.rules.throttle.manual, ThrottleSpeed::Full);
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let err = Config::from_toml_str("[run]\nmode = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rules]
hide_radio = true
exclude_keywords = ["shopping"]
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert!(config.rules.hide_radio);
        assert_eq!(config.rules.exclude_keywords, vec!["shopping".to_string()]);
        assert_eq!(config.paths.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_load_writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.toml");
        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        assert_eq!(config.run.progress_channel_capacity, DEFAULT_PROGRESS_CHANNEL_CAPACITY);

        let reloaded = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(reloaded.reporting, config.reporting);
        assert_eq!(reloaded.rules, config.rules);
    }
}
