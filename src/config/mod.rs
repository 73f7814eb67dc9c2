use crate::models::WaitRunConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// File name of the configuration inside the config directory
pub const CONFIG_FILE_NAME: &str = "WaitRun.yaml";

/// Prefix of environment overrides, e.g. `WAITRUN__COORDINATOR__GRACE_PERIOD_MS=100`
pub const ENV_PREFIX: &str = "WAITRUN";

/// Configuration manager for loading and saving `WaitRun.yaml`.
///
/// Loading layers three sources, later ones winning:
/// - built-in defaults
/// - `WaitRun.yaml` in the config directory (optional)
/// - `WAITRUN__*` environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it does not exist yet.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the configuration from file and process environment.
    ///
    /// # Returns
    /// The loaded WaitRunConfig, or defaults for everything not set
    pub fn load(&self) -> Result<WaitRunConfig> {
        self.load_layered(None)
    }

    /// Like [`load`](Self::load), but with environment overrides taken from
    /// `vars` instead of the process environment
    pub fn load_with_env(&self, vars: config::Map<String, String>) -> Result<WaitRunConfig> {
        self.load_layered(Some(vars))
    }

    fn load_layered(&self, env_source: Option<config::Map<String, String>>) -> Result<WaitRunConfig> {
        if self.config_path.exists() {
            tracing::info!("Loading config from {}", self.config_path);
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let settings = Config::builder()
            .add_source(
                File::new(self.config_path.as_str(), FileFormat::Yaml).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env_source),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: WaitRunConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::debug!("Effective config: {:?}", config);
        Ok(config)
    }

    /// Save the configuration file.
    pub fn save(&self, config: &WaitRunConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
