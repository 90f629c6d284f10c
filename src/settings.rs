//! Handshake configuration
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables
//! 2. `Settings.toml` in `OPENID_SETTINGS_DIR` (if specified and exists)
//! 3. `Settings.toml` in the current directory (if exists)
//! 4. Default settings

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Request parameter names must be plain identifiers so they survive the
/// provider round trip untouched.
static PARAM_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: basic_toml::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OpenIdSettings {
    pub authentication: AuthenticationSettings,
    pub markers: MarkerSettings,
    pub registration: RegistrationSettings,
    pub password: PasswordSettings,
    pub scratch: ScratchSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationSettings {
    /// Master switch. When disabled every handshake phase resolves to a no-op.
    pub enabled: bool,
}

/// Names of the correlation markers carried through the provider redirect
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSettings {
    pub callback_param: String,
    pub record_marker: String,
    pub session_marker: String,
    pub remember_me_param: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSettings {
    /// Simple-registration fields requested as optional from the provider
    pub optional_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub min_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchSettings {
    /// Key the pending field snapshot is stored under
    pub snapshot_key: String,
    /// How long an orphaned snapshot survives before it is dropped
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for AuthenticationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            callback_param: "open_id_complete".to_string(),
            record_marker: "for_model".to_string(),
            session_marker: "for_session".to_string(),
            remember_me_param: "remember_me".to_string(),
        }
    }
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            optional_fields: vec!["fullname".to_string()],
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self { min_length: 4 }
    }
}

impl Default for ScratchSettings {
    fn default() -> Self {
        Self {
            snapshot_key: "openid_attributes".to_string(),
            ttl_hours: 24,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl OpenIdSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - The resulting settings fail validation
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_env_file();
        Self::initialize_logging();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.validate()?;

        Ok(settings)
    }

    /// Initialize `env_logger` once; later calls are ignored
    fn initialize_logging() {
        if env_logger::try_init().is_err() {
            log::debug!("Logger already initialized, keeping existing configuration");
        }
    }

    /// Load base settings from TOML file(s) or use defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed
    fn load_base_settings() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let default_config_path = Path::new("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(default_config_path)?;
            log::info!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(settings_dir) = std::env::var("OPENID_SETTINGS_DIR") {
            let dir_path = Path::new(&settings_dir).join("Settings.toml");
            if dir_path.exists() {
                settings = Self::from_file(&dir_path)?;
                log::info!("✓ Overriding settings from {}", dir_path.display());
            } else {
                log::info!(
                    "ℹ OPENID_SETTINGS_DIR set but no Settings.toml found at: {}",
                    dir_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// these settings
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        basic_toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        if let Ok(enabled) = std::env::var("OPENID_ENABLED") {
            if let Ok(enabled) = enabled.parse::<bool>() {
                settings.authentication.enabled = enabled;
            }
        }
        if let Ok(key) = std::env::var("OPENID_SNAPSHOT_KEY") {
            if !key.is_empty() {
                settings.scratch.snapshot_key = key;
            }
        }
        Self::apply_numeric_env_override("OPENID_SCRATCH_TTL_HOURS", &mut settings.scratch.ttl_hours);
        if let Ok(value) = std::env::var("PASSWORD_MIN_LENGTH") {
            if let Ok(min_length) = value.parse::<usize>() {
                settings.password.min_length = min_length;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            settings.logging.level = log_level;
        }
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Check marker names and the snapshot key
    ///
    /// # Errors
    ///
    /// Returns an error if a marker is not a plain parameter name, if two
    /// markers collide, or if the snapshot key is empty
    pub fn validate(&self) -> Result<(), SettingsError> {
        let markers = &self.markers;
        let named = [
            ("callback_param", &markers.callback_param),
            ("record_marker", &markers.record_marker),
            ("session_marker", &markers.session_marker),
            ("remember_me_param", &markers.remember_me_param),
        ];

        for (label, value) in &named {
            if !PARAM_NAME.is_match(value) {
                return Err(SettingsError::Invalid(format!(
                    "markers.{label} must be a plain parameter name, got {value:?}"
                )));
            }
        }

        for (i, (label_a, a)) in named.iter().enumerate() {
            for (label_b, b) in &named[i + 1..] {
                if a == b {
                    return Err(SettingsError::Invalid(format!(
                        "markers.{label_a} and markers.{label_b} must differ"
                    )));
                }
            }
        }

        if self.scratch.snapshot_key.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "scratch.snapshot_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
