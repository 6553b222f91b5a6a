//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and environment
//! variables, and merging them with proper precedence rules:
//! environment over local file over home file over XDG file over defaults.
//! Command-line flags are applied on top by the CLI.

use crate::error::ScanError;
use crate::types::{PoolSize, ScanConfig, ScanSource};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the worker pool size.
pub const POOL_SIZE_ENV: &str = "CONNECTION_POOL_SIZE";

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for scan options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Output formatting preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default scan settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Worker pool size. Non-positive values fall back to the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<i64>,

    /// Zero-based CSV column holding the domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,

    /// Whether the CSV has a header row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_headers: Option<bool>,

    /// Source label, "top-domains" or "local"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Network timeout (as string, e.g., "5s", "30s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Print every domain result as a JSON line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,

    /// Print the aggregated summary as JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_json: Option<bool>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to emit warnings for config issues
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ScanError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScanError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ScanError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ScanError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    pub fn discover_and_load(&self) -> Result<FileConfig, ScanError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        // Lowest precedence first
        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => {
                    if self.verbose {
                        tracing::warn!("skipping {}: {}", path.display(), e);
                    }
                }
            }
        }

        if self.verbose && !loaded_files.is_empty() {
            for path in &loaded_files {
                tracing::info!("loaded configuration from {}", path.display());
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./starttls-check.toml", "./.starttls-check.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        let path = Path::new(&home).join(".starttls-check.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("starttls-check").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations. Values from `higher` win.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(mut lower_defaults), Some(higher_defaults)) => {
                    if higher_defaults.pool_size.is_some() {
                        lower_defaults.pool_size = higher_defaults.pool_size;
                    }
                    if higher_defaults.column.is_some() {
                        lower_defaults.column = higher_defaults.column;
                    }
                    if higher_defaults.has_headers.is_some() {
                        lower_defaults.has_headers = higher_defaults.has_headers;
                    }
                    if higher_defaults.source.is_some() {
                        lower_defaults.source = higher_defaults.source;
                    }
                    if higher_defaults.timeout.is_some() {
                        lower_defaults.timeout = higher_defaults.timeout;
                    }
                    Some(lower_defaults)
                }
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            output: match (lower.output, higher.output) {
                (Some(mut lower_output), Some(higher_output)) => {
                    if higher_output.json.is_some() {
                        lower_output.json = higher_output.json;
                    }
                    if higher_output.summary_json.is_some() {
                        lower_output.summary_json = higher_output.summary_json;
                    }
                    Some(lower_output)
                }
                (lower_output, higher_output) => higher_output.or(lower_output),
            },
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), ScanError> {
        if let Some(defaults) = &config.defaults {
            if let Some(source) = &defaults.source {
                source.parse::<ScanSource>()?;
            }

            if let Some(timeout_str) = &defaults.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(ScanError::config(format!(
                        "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                        timeout_str
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Environment variable configuration.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub pool_size: Option<PoolSize>,
    pub column: Option<usize>,
    pub source: Option<ScanSource>,
    pub timeout: Option<Duration>,
    pub config: Option<String>,
}

/// Load configuration from environment variables.
///
/// Reads `CONNECTION_POOL_SIZE` and the `SC_*` variables. Invalid values are
/// ignored (and logged when `verbose`).
pub fn load_env_config(verbose: bool) -> EnvConfig {
    let mut env_config = EnvConfig::default();

    if let Ok(val) = env::var(POOL_SIZE_ENV) {
        match val.trim().parse::<usize>() {
            Ok(size) if size > 0 => env_config.pool_size = Some(PoolSize::new(size)),
            _ => {
                if verbose {
                    tracing::warn!("ignoring invalid {}='{}'", POOL_SIZE_ENV, val);
                }
            }
        }
    }

    if let Ok(val) = env::var("SC_COLUMN") {
        match val.trim().parse::<usize>() {
            Ok(column) => env_config.column = Some(column),
            Err(_) => {
                if verbose {
                    tracing::warn!("ignoring invalid SC_COLUMN='{}'", val);
                }
            }
        }
    }

    if let Ok(val) = env::var("SC_SOURCE") {
        match val.parse::<ScanSource>() {
            Ok(source) => env_config.source = Some(source),
            Err(e) => {
                if verbose {
                    tracing::warn!("ignoring SC_SOURCE: {}", e);
                }
            }
        }
    }

    if let Ok(val) = env::var("SC_TIMEOUT") {
        match parse_timeout_string(&val) {
            Some(secs) => env_config.timeout = Some(Duration::from_secs(secs)),
            None => {
                if verbose {
                    tracing::warn!(
                        "ignoring invalid SC_TIMEOUT='{}', use format like '5s', '30s', '2m'",
                        val
                    );
                }
            }
        }
    }

    if let Ok(config_path) = env::var("SC_CONFIG") {
        if !config_path.trim().is_empty() {
            env_config.config = Some(config_path);
        }
    }

    env_config
}

/// Build the scan configuration from a config file and the environment.
/// The environment wins over the file.
pub fn resolve_scan_config(file: &FileConfig, env_config: &EnvConfig) -> ScanConfig {
    let mut config = ScanConfig::default();

    if let Some(defaults) = &file.defaults {
        if let Some(size) = defaults.pool_size {
            config.pool_size = PoolSize::new(usize::try_from(size).unwrap_or(0));
        }
        if let Some(column) = defaults.column {
            config.column = column;
        }
        if let Some(has_headers) = defaults.has_headers {
            config.has_headers = has_headers;
        }
        if let Some(source) = defaults.source.as_deref().and_then(|s| s.parse().ok()) {
            config.source = source;
        }
        if let Some(secs) = defaults.timeout.as_deref().and_then(parse_timeout_string) {
            config.timeout = Duration::from_secs(secs);
        }
    }

    if let Some(pool_size) = env_config.pool_size {
        config.pool_size = pool_size;
    }
    if let Some(column) = env_config.column {
        config.column = column;
    }
    if let Some(source) = env_config.source {
        config.source = source;
    }
    if let Some(timeout) = env_config.timeout {
        config.timeout = timeout;
    }

    config
}

/// Parse a timeout string like "5s", "30s", "2m" into seconds.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| m * 60)
    } else {
        // Assume seconds if no unit
        timeout_str.parse::<u64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_POOL_SIZE;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_timeout_string() {
        assert_eq!(parse_timeout_string("5s"), Some(5));
        assert_eq!(parse_timeout_string("30s"), Some(30));
        assert_eq!(parse_timeout_string("2m"), Some(120));
        assert_eq!(parse_timeout_string("5"), Some(5));
        assert_eq!(parse_timeout_string("invalid"), None);
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[defaults]
pool_size = 32
column = 1
has_headers = true
source = "local"
timeout = "20s"

[output]
summary_json = true
"#,
        );

        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();

        let defaults = config.defaults.clone().unwrap();
        assert_eq!(defaults.pool_size, Some(32));
        assert_eq!(defaults.column, Some(1));
        assert_eq!(defaults.source.as_deref(), Some("local"));
        assert_eq!(config.output.as_ref().unwrap().summary_json, Some(true));

        let scan = resolve_scan_config(&config, &EnvConfig::default());
        assert_eq!(scan.pool_size.get(), 32);
        assert_eq!(scan.column, 1);
        assert!(scan.has_headers);
        assert_eq!(scan.source, ScanSource::Local);
        assert_eq!(scan.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_zero_pool_size_falls_back() {
        let temp_file = write_config("[defaults]\npool_size = 0\n");
        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();
        let scan = resolve_scan_config(&config, &EnvConfig::default());
        assert_eq!(scan.pool_size.get(), DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_invalid_source_rejected() {
        let temp_file = write_config("[defaults]\nsource = \"everywhere\"\n");
        let manager = ConfigManager::new(false);
        assert!(matches!(
            manager.load_file(temp_file.path()),
            Err(ScanError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let temp_file = write_config("[defaults]\ntimeout = \"soon\"\n");
        let manager = ConfigManager::new(false);
        assert!(manager.load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let manager = ConfigManager::new(false);
        assert!(matches!(
            manager.load_file("/nonexistent/starttls-check.toml"),
            Err(ScanError::FileError { .. })
        ));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                pool_size: Some(10),
                source: Some("local".to_string()),
                column: Some(0),
                ..Default::default()
            }),
            output: Some(OutputConfig {
                json: Some(true),
                summary_json: None,
            }),
        };

        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                pool_size: Some(25),
                column: Some(2),
                ..Default::default()
            }),
            output: None,
        };

        let merged = manager.merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();

        assert_eq!(defaults.pool_size, Some(25)); // Higher wins
        assert_eq!(defaults.column, Some(2));
        assert_eq!(defaults.source, Some("local".to_string())); // Lower preserved
        assert_eq!(merged.output.unwrap().json, Some(true));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            defaults: Some(DefaultsConfig {
                pool_size: Some(4),
                column: Some(1),
                ..Default::default()
            }),
            output: None,
        };
        let env_config = EnvConfig {
            pool_size: Some(PoolSize::new(64)),
            source: Some(ScanSource::Local),
            ..Default::default()
        };

        let scan = resolve_scan_config(&file, &env_config);
        assert_eq!(scan.pool_size.get(), 64);
        assert_eq!(scan.column, 1);
        assert_eq!(scan.source, ScanSource::Local);
    }
}
