use fooddude_core::{MealSlot, TranscriptionBackend, TranscriptionSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    /// Server URL (e.g., "http://localhost:8080" or "https://sync.example.com")
    pub server_url: Option<String>,
    /// API key for authentication
    pub api_key: Option<String>,
}

impl SyncConfig {
    /// Returns true if sync is configured (has both server_url and api_key)
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.api_key.is_some()
    }
}

/// External recorder used by `fooddude voice`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub program: String,
    /// Arguments placed before the output file path
    pub args: Vec<String>,
    pub mime: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: "arecord".to_string(),
            args: ["-q", "-f", "S16_LE", "-r", "16000", "-c", "1", "-t", "wav"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mime: "audio/wav".to_string(),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the food-composition SQLite database
    pub food_db_path: ConfigValue<PathBuf>,
    /// Directory for local state (pending changes)
    pub data_dir: ConfigValue<PathBuf>,
    /// User whose log is read and written
    pub user_id: ConfigValue<String>,
    /// Meal used when a phrase does not name one
    pub default_meal: ConfigValue<MealSlot>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub sync: SyncConfig,
    pub transcription: TranscriptionSettings,
    pub capture: CaptureConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    food_db_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    user_id: Option<String>,
    default_meal: Option<String>,
    sync: Option<SyncConfig>,
    transcription: Option<TranscriptionSettings>,
    capture: Option<CaptureConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_data_dir = Self::default_data_dir();

        let mut data_dir = ConfigValue::new(default_data_dir.clone(), ConfigSource::Default);
        let mut food_db_path =
            ConfigValue::new(default_data_dir.join("foods.db"), ConfigSource::Default);
        let mut user_id = ConfigValue::new("default".to_string(), ConfigSource::Default);
        let mut default_meal = ConfigValue::new(MealSlot::Breakfast, ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();
        let mut transcription = TranscriptionSettings::default();
        let mut capture = CaptureConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                data_dir = ConfigValue::new(resolve_relative(&path, dir), ConfigSource::File);
                // The database follows the data directory unless set explicitly.
                food_db_path =
                    ConfigValue::new(data_dir.value.join("foods.db"), ConfigSource::Default);
            }
            if let Some(db_path) = file_config.food_db_path {
                food_db_path = ConfigValue::new(resolve_relative(&path, db_path), ConfigSource::File);
            }
            if let Some(user) = file_config.user_id {
                user_id = ConfigValue::new(user, ConfigSource::File);
            }
            if let Some(meal) = file_config.default_meal {
                let meal = meal
                    .parse()
                    .map_err(|e| ConfigError::InvalidValue("default_meal".to_string(), e))?;
                default_meal = ConfigValue::new(meal, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
            if let Some(settings) = file_config.transcription {
                transcription = settings;
            }
            if let Some(capture_config) = file_config.capture {
                capture = capture_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("FOODDUDE_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(db_path) = std::env::var("FOODDUDE_FOOD_DB") {
            food_db_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(user) = std::env::var("FOODDUDE_USER") {
            user_id = ConfigValue::new(user, ConfigSource::Environment);
        }
        if let Ok(meal) = std::env::var("FOODDUDE_DEFAULT_MEAL") {
            let meal = meal
                .parse()
                .map_err(|e| ConfigError::InvalidValue("FOODDUDE_DEFAULT_MEAL".to_string(), e))?;
            default_meal = ConfigValue::new(meal, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("FOODDUDE_SYNC_URL") {
            sync.server_url = Some(url);
        }
        if let Ok(key) = std::env::var("FOODDUDE_SYNC_API_KEY") {
            sync.api_key = Some(key);
        }
        if let Ok(backend) = std::env::var("FOODDUDE_TRANSCRIPTION_BACKEND") {
            transcription.backend = parse_backend(&backend).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "FOODDUDE_TRANSCRIPTION_BACKEND".to_string(),
                    format!(
                        "Invalid backend '{}'. Valid options: voice-server, openai, disabled",
                        backend
                    ),
                )
            })?;
        }
        if let Ok(url) = std::env::var("FOODDUDE_TRANSCRIPTION_URL") {
            transcription.url = url;
        }
        if let Ok(key) = std::env::var("FOODDUDE_TRANSCRIPTION_API_KEY") {
            transcription.api_key = Some(key);
        }

        Ok(Self {
            food_db_path,
            data_dir,
            user_id,
            default_meal,
            config_file,
            sync,
            transcription,
            capture,
        })
    }

    /// File holding changes that have not reached the server yet.
    pub fn pending_queue_path(&self) -> PathBuf {
        self.data_dir.value.join("pending.json")
    }

    /// File holding changes the server refused, kept for inspection.
    pub fn rejected_changes_path(&self) -> PathBuf {
        self.data_dir.value.join("rejected.json")
    }

    /// Copy safe to print: API keys are replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.sync.api_key.is_some() {
            config.sync.api_key = Some(REDACTED.to_string());
        }
        if config.transcription.api_key.is_some() {
            config.transcription.api_key = Some(REDACTED.to_string());
        }
        config
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/fooddude/
    /// - macOS: ~/Library/Application Support/fooddude/
    /// - Windows: %APPDATA%/fooddude/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fooddude")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/fooddude/
    /// - macOS: ~/Library/Application Support/fooddude/
    /// - Windows: %APPDATA%/fooddude/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fooddude")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

const REDACTED: &str = "(set)";

/// Resolve relative paths against the config file's directory
fn resolve_relative(config_path: &std::path::Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        config_path.parent().map(|p| p.join(&path)).unwrap_or(path)
    } else {
        path
    }
}

fn parse_backend(value: &str) -> Option<TranscriptionBackend> {
    match value.trim().to_lowercase().as_str() {
        "voice-server" => Some(TranscriptionBackend::VoiceServer),
        "openai" => Some(TranscriptionBackend::Openai),
        "disabled" | "off" => Some(TranscriptionBackend::Disabled),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(name, e) => {
                write!(f, "Invalid value for {}: {}", name, e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
