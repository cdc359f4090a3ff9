//! Configuration management for ReportScout using the prefer crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryConfig;
use crate::scrapers::BrowserEngineConfig;

/// Default cache filename inside the data directory.
pub const CACHE_FILENAME: &str = "discover_cache.json";
/// Default document storage subdirectory.
pub const STORAGE_SUBDIR: &str = "storage";

/// Runtime paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base directory for ReportScout data.
    pub data_dir: PathBuf,
    /// Discovery cache document.
    pub cache_path: PathBuf,
    /// Root of the per-company PDF folders.
    pub storage_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reportscout");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            cache_path: data_dir.join(CACHE_FILENAME),
            storage_root: data_dir.join(STORAGE_SUBDIR),
            data_dir,
        }
    }
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory (`~` is expanded, relative paths resolve against the file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Cache file location, overriding `<data_dir>/discover_cache.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,
    /// Storage root, overriding `<data_dir>/storage`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,

    pub discovery: DiscoveryConfig,

    pub browser: BrowserEngineConfig,

    /// Where this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers reportscout config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("reportscout").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply configured paths to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            *settings = Settings::with_data_dir(resolve_path(data_dir, base_dir));
        }
        if let Some(ref cache_file) = self.cache_file {
            settings.cache_path = resolve_path(cache_file, base_dir);
        }
        if let Some(ref storage_dir) = self.storage_dir {
            settings.storage_root = resolve_path(storage_dir, base_dir);
        }
    }
}

/// Resolve a path that may be relative to the config file.
/// - Absolute paths are returned as-is
/// - Paths starting with ~ are expanded
/// - Relative paths are resolved relative to `base_dir`
pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
    /// Data directory override (`--data`).
    pub data: Option<PathBuf>,
}

/// Look for a config file inside the data directory.
fn find_config_in_data_dir(data_dir: &Path) -> Option<PathBuf> {
    ["toml", "yaml", "yml", "json"]
        .iter()
        .map(|ext| data_dir.join(format!("reportscout.{}", ext)))
        .find(|path| path.exists())
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Load config from file sources.
async fn load_file_config(options: &LoadOptions) -> Result<Config, String> {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path).await;
    }

    // Priority 2: Config inside the data dir
    if let Some(ref data_dir) = options.data {
        if let Some(config_path) = find_config_in_data_dir(data_dir) {
            tracing::debug!("Found config in data dir: {}", config_path.display());
            return Config::load_from_path(&config_path).await;
        }
    }

    // Priority 3: Auto-discover via prefer
    Ok(Config::load().await)
}

/// Load settings with explicit options.
///
/// Precedence, lowest first: defaults, config file, environment
/// (`REPORTSCOUT_DATA_DIR`, `REPORTSCOUT_USER_AGENT`), command-line flags.
/// An explicit `--config` that cannot be read or parsed is an error.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), String> {
    let mut config = load_file_config(&options).await?;

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = env_override("REPORTSCOUT_DATA_DIR") {
        tracing::debug!("Using REPORTSCOUT_DATA_DIR from environment: {}", data_dir);
        settings = Settings::with_data_dir(resolve_path(&data_dir, &cwd));
    }

    if let Some(user_agent) = env_override("REPORTSCOUT_USER_AGENT") {
        config.discovery.user_agent = user_agent;
    }

    // --data takes precedence for every derived path
    if let Some(ref data_dir) = options.data {
        let data_dir = data_dir.to_string_lossy();
        settings = Settings::with_data_dir(resolve_path(&data_dir, &cwd));
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_settings_layout() {
        let settings = Settings::with_data_dir(PathBuf::from("/srv/scout"));
        assert_eq!(settings.cache_path, PathBuf::from("/srv/scout/discover_cache.json"));
        assert_eq!(settings.storage_root, PathBuf::from("/srv/scout/storage"));
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/etc/reportscout");
        assert_eq!(resolve_path("/abs/x", base), PathBuf::from("/abs/x"));
        assert_eq!(resolve_path("rel/x", base), PathBuf::from("/etc/reportscout/rel/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolve_path("~/x", base), home.join("x"));
        }
    }

    #[tokio::test]
    async fn test_load_toml_relative_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reportscout.toml");
        std::fs::write(
            &path,
            r#"
            data_dir = "data"
            storage_dir = "/var/reports"

            [discovery]
            pdf_score_threshold = 0.7
            escalation_candidates = 3

            [browser]
            headless = false
            "#,
        )
        .unwrap();

        let options = LoadOptions {
            config_path: Some(path),
            data: None,
        };
        let (settings, config) = load_settings_with_options(options).await.unwrap();

        assert_eq!(config.discovery.pdf_score_threshold, 0.7);
        assert_eq!(config.discovery.escalation_candidates, 3);
        assert_eq!(config.discovery.min_pdf_bytes, 2048);
        assert!(!config.browser.headless);
        if std::env::var("REPORTSCOUT_DATA_DIR").is_err() {
            assert_eq!(settings.data_dir, dir.path().join("data"));
            assert_eq!(settings.cache_path, dir.path().join("data").join(CACHE_FILENAME));
        }
        assert_eq!(settings.storage_root, PathBuf::from("/var/reports"));
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("scout.yml");
        std::fs::write(&yaml, "discovery:\n  ttl_days: 3\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.discovery.ttl_days, 3);

        let json = dir.path().join("scout.json");
        std::fs::write(&json, r#"{"discovery": {"max_search_results": 4}}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.discovery.max_search_results, 4);
        assert_eq!(config.source_path.as_deref(), Some(json.as_path()));
    }

    #[tokio::test]
    async fn test_explicit_config_errors_surface() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "discovery = [").unwrap();

        let err = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            data: None,
        })
        .await
        .unwrap_err();
        assert!(err.contains("TOML"));
    }

    #[tokio::test]
    async fn test_data_flag_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("reportscout.toml"),
            "[discovery]\nttl_days = 1\n",
        )
        .unwrap();

        let (settings, config) = load_settings_with_options(LoadOptions {
            config_path: None,
            data: Some(dir.path().to_path_buf()),
        })
        .await
        .unwrap();

        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(config.discovery.ttl_days, 1);
    }
}
