use std::{fs, path::PathBuf};

use common::config::{ConfigError, PipelineConfig};

pub const APP_NAME: &str = "hush";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the hush directory (~/.hush)
    pub hush_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: PipelineConfig,
}

impl AppState {
    /// Get the hush directory path (custom or default ~/.hush)
    pub fn hush_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new hush state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<PipelineConfig>,
    ) -> Result<Self, StateError> {
        let hush_dir = Self::hush_dir(custom_path)?;

        if hush_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        let config = config.unwrap_or_default();
        config.validate()?;

        fs::create_dir_all(&hush_dir)?;
        let config_path = hush_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            hush_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the hush directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let hush_dir = Self::hush_dir(custom_path)?;

        if !hush_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = hush_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config = PipelineConfig::from_toml_str(&config_toml)?;

        Ok(Self {
            hush_dir,
            config_path,
            config,
        })
    }

    /// The stored config, or defaults if the directory was never initialized
    pub fn load_config(custom_path: Option<PathBuf>) -> Result<PipelineConfig, StateError> {
        match Self::load(custom_path) {
            Ok(state) => Ok(state.config),
            Err(StateError::NotInitialized) => {
                tracing::debug!("no hush directory, using default config");
                Ok(PipelineConfig::default())
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("hush directory not initialized. Run 'hush init' first")]
    NotInitialized,

    #[error("hush directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}
