//! # Configuration files.
//!
//! Loads an [`AppConfig`] from disk. The format is chosen by file extension
//! (see [`ConfigFormat`]); TOML, JSON and YAML share one schema. Missing
//! sections and keys fall back to the defaults of [`WorkerConfig`],
//! [`RunnerConfig`] and [`LoggerConfig`].
//!
//! ```toml
//! [logger]
//! level = "info"          # error | warn | info | debug | trace
//! format = "text"         # text | json
//! output = "stdout"       # stdout | stderr | file
//! # path = "/var/log/agentvisor.log"   (required when output = "file")
//! rotation = "never"      # never | minutely | hourly | daily (file output only)
//! # max_files = 7         (rotated files to keep; unlimited when absent)
//!
//! [worker]
//! max_tasks = 100
//! task_timeout_ms = 300000
//! shutdown_timeout_ms = 30000
//! stop_on_error = false
//! status_interval_ms = 30000
//!
//! [runner]
//! shutdown_timeout_ms = 60000
//!
//! [runner.restart]
//! enabled = false
//! max_restarts = 0
//! delay_ms = 10000
//! exponential = false
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::{RunnerConfig, WorkerConfig};
use crate::error::RuntimeError;
use crate::policies::RestartPolicy;

/// Errors raised while loading a configuration file.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format {extension:?} for {path:?} (expected .toml, .json, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("parsing {format} config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        format: ConfigFormat,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] RuntimeError),
}

/// On-disk configuration format, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl ConfigFormat {
    /// Maps a (case-insensitive) extension to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn parse(self, contents: &str) -> Result<ConfigFile, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            Self::Toml => toml::from_str(contents)?,
            Self::Json => serde_json::from_str(contents)?,
            Self::Yaml => serde_yaml::from_str(contents)?,
        })
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        })
    }
}

/// Log rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often a log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// One file, appended to forever.
    #[default]
    Never,
    Minutely,
    Hourly,
    Daily,
}

/// `[logger]` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Level name; `None` defers to the environment.
    pub level: Option<String>,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file, used when `output = "file"`.
    ///
    /// With rotation enabled the file name becomes the prefix of the rolled
    /// files (`agentvisor.log.2026-10-18`).
    pub path: Option<PathBuf>,
    /// Roll-over period for file output.
    pub rotation: LogRotation,
    /// Rolled files kept on disk; older ones are deleted. `None` keeps all.
    pub max_files: Option<usize>,
}

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl LoggerConfig {
    fn validate(&self) -> Result<(), RuntimeError> {
        if let Some(level) = &self.level
            && !LEVELS.contains(&level.trim().to_lowercase().as_str())
        {
            return Err(RuntimeError::Init(format!(
                "logger.level must be one of {LEVELS:?}, got {level:?}"
            )));
        }
        if self.output == LogOutput::File && self.path.is_none() {
            return Err(RuntimeError::Init(
                "logger.path is required when logger.output = \"file\"".into(),
            ));
        }
        if self.max_files == Some(0) {
            return Err(RuntimeError::Init(
                "logger.max_files must be at least 1 when set, got 0".into(),
            ));
        }
        Ok(())
    }
}

/// Fully resolved and validated application configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    pub logger: LoggerConfig,
    pub worker: WorkerConfig,
    pub runner: RunnerConfig,
}

impl AppConfig {
    /// Runs every section's range checks.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.logger.validate()?;
        self.worker.validate()?;
        self.runner.validate()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    logger: LoggerConfig,
    worker: WorkerSection,
    runner: RunnerSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WorkerSection {
    max_tasks: usize,
    task_timeout_ms: u64,
    shutdown_timeout_ms: u64,
    stop_on_error: bool,
    status_interval_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        let d = WorkerConfig::default();
        Self {
            max_tasks: d.max_tasks,
            task_timeout_ms: millis(d.task_timeout),
            shutdown_timeout_ms: millis(d.shutdown_timeout),
            stop_on_error: d.stop_on_error,
            status_interval_ms: millis(d.status_interval),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RunnerSection {
    shutdown_timeout_ms: u64,
    restart: RestartSection,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: millis(RunnerConfig::default().shutdown_timeout),
            restart: RestartSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RestartSection {
    enabled: bool,
    max_restarts: u32,
    delay_ms: u64,
    exponential: bool,
}

impl Default for RestartSection {
    fn default() -> Self {
        let d = RestartPolicy::default();
        Self {
            enabled: d.enabled,
            max_restarts: d.max_restarts,
            delay_ms: millis(d.delay),
            exponential: d.exponential,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl From<ConfigFile> for AppConfig {
    fn from(file: ConfigFile) -> Self {
        let ConfigFile {
            logger,
            worker,
            runner,
        } = file;
        Self {
            logger,
            worker: WorkerConfig {
                max_tasks: worker.max_tasks,
                task_timeout: Duration::from_millis(worker.task_timeout_ms),
                shutdown_timeout: Duration::from_millis(worker.shutdown_timeout_ms),
                stop_on_error: worker.stop_on_error,
                status_interval: Duration::from_millis(worker.status_interval_ms),
            },
            runner: RunnerConfig {
                shutdown_timeout: Duration::from_millis(runner.shutdown_timeout_ms),
                restart: RestartPolicy {
                    enabled: runner.restart.enabled,
                    max_restarts: runner.restart.max_restarts,
                    delay: Duration::from_millis(runner.restart.delay_ms),
                    exponential: runner.restart.exponential,
                },
            },
        }
    }
}

/// Reads, parses and validates a configuration file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let Some(format) = ConfigFormat::from_extension(&extension) else {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        });
    };

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = format.parse(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        format,
        source,
    })?;

    let config = AppConfig::from(file);
    config.validate()?;
    Ok(config)
}

/// Loads `path` when given, otherwise returns validated defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => {
            let config = AppConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("tempfile");
        file.write_all(body.as_bytes()).expect("write");
        file
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = write_config(".toml", "");
        let cfg = load_from_path(file.path()).expect("load");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let file = write_config(
            ".toml",
            r#"
            [logger]
            level = "debug"
            format = "json"

            [worker]
            max_tasks = 8
            task_timeout_ms = 0
            stop_on_error = true

            [runner]
            shutdown_timeout_ms = 5000

            [runner.restart]
            enabled = true
            max_restarts = 3
            delay_ms = 2000
            exponential = true
            "#,
        );
        let cfg = load_from_path(file.path()).expect("load");

        assert_eq!(cfg.logger.level.as_deref(), Some("debug"));
        assert_eq!(cfg.logger.format, LogFormat::Json);
        assert_eq!(cfg.worker.max_tasks, 8);
        assert_eq!(cfg.worker.task_deadline(), None);
        assert!(cfg.worker.stop_on_error);
        assert_eq!(cfg.worker.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(cfg.runner.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(
            cfg.runner.restart,
            RestartPolicy {
                enabled: true,
                max_restarts: 3,
                delay: Duration::from_secs(2),
                exponential: true,
            }
        );
    }

    #[test]
    fn json_and_yaml_share_the_schema() {
        let json = write_config(
            ".json",
            r#"{
                "logger": { "level": "warn", "output": "stderr" },
                "worker": { "max_tasks": 4, "stop_on_error": true },
                "runner": { "restart": { "enabled": true, "delay_ms": 1500 } }
            }"#,
        );
        let yaml = write_config(
            ".YML",
            "logger:\n  level: warn\n  output: stderr\nworker:\n  max_tasks: 4\n  stop_on_error: true\nrunner:\n  restart:\n    enabled: true\n    delay_ms: 1500\n",
        );

        let from_json = load_from_path(json.path()).expect("json");
        let from_yaml = load_from_path(yaml.path()).expect("yaml");
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json.logger.output, LogOutput::Stderr);
        assert_eq!(from_json.worker.max_tasks, 4);
        assert!(from_json.worker.stop_on_error);
        assert!(from_json.runner.restart.enabled);
        assert_eq!(from_json.runner.restart.delay, Duration::from_millis(1500));
        assert_eq!(from_json.runner.shutdown_timeout, Duration::from_secs(60));
    }

    #[test]
    fn parse_errors_name_the_format() {
        let file = write_config(".json", "{ \"worker\": { \"max_task\": 3 } }");
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Parse { format: ConfigFormat::Json, .. }
        ));
        assert!(err.to_string().starts_with("parsing JSON config"));

        let file = write_config(".yaml", "worker: [1, 2]\n");
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::Parse { format: ConfigFormat::Yaml, .. })
        ));
    }

    #[test]
    fn other_extensions_are_rejected() {
        let file = write_config(".ini", "[worker]");
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedFormat { ref extension, .. } if extension == "ini"
        ));

        let err = load_from_path("agentvisor").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedFormat { ref extension, .. } if extension.is_empty()
        ));
    }

    #[test]
    fn rotation_settings_are_read_and_checked() {
        let file = write_config(
            ".toml",
            "[logger]\noutput = \"file\"\npath = \"/tmp/agentvisor.log\"\nrotation = \"daily\"\nmax_files = 7\n",
        );
        let cfg = load_from_path(file.path()).expect("load");
        assert_eq!(cfg.logger.rotation, LogRotation::Daily);
        assert_eq!(cfg.logger.max_files, Some(7));

        let file = write_config(".toml", "[logger]\nmax_files = 0\n");
        let err = load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("logger.max_files"));

        let file = write_config(".toml", "[logger]\nrotation = \"weekly\"\n");
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::Parse { format: ConfigFormat::Toml, .. })
        ));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let file = write_config(".toml", "[worker]\nmax_task = 3\n");
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        let file = write_config(".toml", "[runner.restart]\ndelay_ms = 500\n");
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(RuntimeError::Init(_))));
        assert!(err.to_string().contains("runner.restart.delay"));
    }

    #[test]
    fn file_output_requires_path() {
        let file = write_config(".toml", "[logger]\noutput = \"file\"\n");
        let err = load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("logger.path"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_from_path(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn no_path_uses_defaults() {
        assert_eq!(load_or_default(None).expect("defaults"), AppConfig::default());
    }
}
