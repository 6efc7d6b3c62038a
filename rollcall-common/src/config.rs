//! Configuration loading and root folder resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or malformed TOML file is logged and replaced by defaults;
//! it never stops the service from starting.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port of the mentor service
pub const DEFAULT_PORT: u16 = 5740;

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "rollcall.db";

pub const ENV_ROOT_FOLDER: &str = "ROLLCALL_ROOT_FOLDER";
pub const ENV_PORT: &str = "ROLLCALL_PORT";
pub const ENV_COMPOSER_API_KEY: &str = "ROLLCALL_COMPOSER_API_KEY";
pub const ENV_SMS_API_KEY: &str = "ROLLCALL_SMS_API_KEY";
pub const ENV_SMS_DEVICE_ID: &str = "ROLLCALL_SMS_DEVICE_ID";
pub const ENV_SMS_OVERRIDE_RECIPIENT: &str = "ROLLCALL_SMS_OVERRIDE_RECIPIENT";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the SQLite database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub composer: ComposerConfig,

    #[serde(default)]
    pub sms: SmsConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Generative text service used to draft SMS bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_composer_model")]
    pub model: String,

    #[serde(default = "default_composer_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_composer_model(),
            base_url: default_composer_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// SMS gateway credentials and routing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default = "default_sms_base_url")]
    pub base_url: String,

    /// Route every message to this number instead of the real recipient
    #[serde(default)]
    pub override_recipient: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            device_id: None,
            base_url: default_sms_base_url(),
            override_recipient: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Attendance workflow tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Delay before a `sent` stage is cleared
    #[serde(default = "default_stage_clear_ms")]
    pub stage_clear_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stage_clear_ms: default_stage_clear_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_composer_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_composer_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_sms_base_url() -> String {
    "https://api.textbee.dev/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_stage_clear_ms() -> u64 {
    3000
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read a TOML file, falling back to defaults when it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Could not read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Overlay `ROLLCALL_*` environment variables
    pub fn apply_env(&mut self) {
        if let Some(path) = env_value(ENV_ROOT_FOLDER) {
            self.root_folder = Some(PathBuf::from(path));
        }
        if let Some(port) = env_value(ENV_PORT) {
            match port.parse() {
                Ok(port) => self.port = Some(port),
                Err(_) => warn!("Ignoring {}={}: not a port number", ENV_PORT, port),
            }
        }
        if let Some(key) = env_value(ENV_COMPOSER_API_KEY) {
            self.composer.api_key = Some(key);
        }
        if let Some(key) = env_value(ENV_SMS_API_KEY) {
            self.sms.api_key = Some(key);
        }
        if let Some(device) = env_value(ENV_SMS_DEVICE_ID) {
            self.sms.device_id = Some(device);
        }
        if let Some(number) = env_value(ENV_SMS_OVERRIDE_RECIPIENT) {
            self.sms.override_recipient = Some(number);
        }
    }

    /// Overlay command-line arguments
    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(path) = &cli.root_folder {
            self.root_folder = Some(path.clone());
        }
        if let Some(port) = cli.port {
            self.port = Some(port);
        }
    }

    /// Resolved root folder
    pub fn root_folder(&self) -> PathBuf {
        self.root_folder
            .clone()
            .unwrap_or_else(default_root_folder)
    }

    /// Resolved HTTP port
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder().join(DATABASE_FILE_NAME)
    }
}

/// Load configuration honoring CLI > ENV > TOML > defaults
pub fn load_config(cli: &CliOverrides) -> TomlConfig {
    let mut config = match cli.config_path.clone().or_else(default_config_path) {
        Some(path) => TomlConfig::load_or_default(&path),
        None => {
            warn!("Could not determine config directory, using defaults");
            TomlConfig::default()
        }
    };
    config.apply_env();
    config.apply_cli(cli);
    config
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(())
}

/// Platform config file: `<config_dir>/rollcall/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rollcall").join("config.toml"))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("rollcall"))
        .unwrap_or_else(|| PathBuf::from("./rollcall_data"))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
