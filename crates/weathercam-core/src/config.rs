use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable pointing at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "WEATHERCAM_CONFIG";
/// Environment variable overriding `store.api_key`.
pub const API_KEY_ENV: &str = "WEATHERCAM_API_KEY";
/// Environment variable overriding `store.bearer_token`.
pub const BEARER_TOKEN_ENV: &str = "WEATHERCAM_BEARER_TOKEN";

/// Placeholder written into a fresh config for the store project.
const PROJECT_PLACEHOLDER: &str = "YOUR_FIREBASE_PROJECT_ID";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Camera and scheduling settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Where the last known location comes from
    #[serde(default)]
    pub location: LocationConfig,

    /// Weather classifier
    #[serde(default)]
    pub model: ModelConfig,

    /// Remote document store
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Seconds between capture cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound on a single cycle, capture through publish
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,

    /// Directory photos are written to. Unset means `<pictures>/weathercam`,
    /// falling back to the app data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Camera program and arguments. `{output}` is replaced by the photo path.
    #[serde(default = "default_capture_command")]
    pub command: Vec<String>,

    /// Keep photos on disk after their cycle finishes
    #[serde(default = "default_keep_photos")]
    pub keep_photos: bool,
}

fn default_interval_secs() -> u64 {
    15
}

fn default_cycle_timeout_secs() -> u64 {
    60
}

fn default_capture_command() -> Vec<String> {
    ["fswebcam", "--no-banner", "-r", "1280x720", "{output}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_keep_photos() -> bool {
    true
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            output_dir: None,
            command: default_capture_command(),
            keep_photos: default_keep_photos(),
        }
    }
}

/// Location source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationProviderKind {
    /// Never report a location
    None,
    /// Report the configured coordinates
    Fixed,
    /// Ask an IP geolocation endpoint
    #[default]
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub provider: LocationProviderKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Endpoint returning `{"lat": .., "lon": ..}`
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,

    #[serde(default = "default_location_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_lookup_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_location_timeout_secs() -> u64 {
    5
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: LocationProviderKind::default(),
            latitude: None,
            longitude: None,
            lookup_url: default_lookup_url(),
            timeout_secs: default_location_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// ONNX export of the weather classifier
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

fn default_model_path() -> PathBuf {
    default_config_dir().join("weather_model.onnx")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_base_url")]
    pub base_url: String,

    #[serde(default = "default_project_id")]
    pub project_id: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Web API key sent as `?key=`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OAuth access token sent as a bearer header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_store_base_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_project_id() -> String {
    PROJECT_PLACEHOLDER.to_string()
}

fn default_collection() -> String {
    "weather information".to_string()
}

fn default_store_timeout_secs() -> u64 {
    10
}

impl StoreConfig {
    /// Check if the project is configured (not the placeholder)
    pub fn is_configured(&self) -> bool {
        !self.project_id.is_empty() && self.project_id != PROJECT_PLACEHOLDER
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            project_id: default_project_id(),
            collection: default_collection(),
            api_key: None,
            bearer_token: None,
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weathercam")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            capture: CaptureConfig::default(),
            location: LocationConfig::default(),
            model: ModelConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (or `WEATHERCAM_CONFIG`),
    /// creating a default file if none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults there if missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Secrets may come from the environment rather than the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.store.api_key = Some(key);
            }
        }
        if let Ok(token) = std::env::var(BEARER_TOKEN_ENV) {
            if !token.is_empty() {
                self.store.bearer_token = Some(token);
            }
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.capture.interval_secs == 0 {
            result.add_error("capture.interval_secs", "Interval must be greater than 0");
        }

        if self.capture.cycle_timeout_secs == 0 {
            result.add_error(
                "capture.cycle_timeout_secs",
                "Cycle timeout must be greater than 0",
            );
        } else if self.capture.cycle_timeout_secs > self.capture.interval_secs.saturating_mul(20) {
            result.add_warning(
                "capture.cycle_timeout_secs",
                "Cycle timeout is much longer than the capture interval; ticks will be skipped",
            );
        }

        match self.capture.command.first() {
            None => result.add_error("capture.command", "Camera command must not be empty"),
            Some(program) if program.trim().is_empty() => {
                result.add_error("capture.command", "Camera program must not be blank")
            }
            Some(_) => {
                if !self.capture.command.iter().any(|arg| arg.contains("{output}")) {
                    result.add_error(
                        "capture.command",
                        "Camera command must contain the {output} placeholder",
                    );
                }
            }
        }

        match self.location.provider {
            LocationProviderKind::None => {}
            LocationProviderKind::Fixed => {
                match (self.location.latitude, self.location.longitude) {
                    (Some(lat), Some(lon)) => {
                        if !(-90.0..=90.0).contains(&lat) {
                            result.add_error("location.latitude", "Latitude must be within [-90, 90]");
                        }
                        if !(-180.0..=180.0).contains(&lon) {
                            result.add_error(
                                "location.longitude",
                                "Longitude must be within [-180, 180]",
                            );
                        }
                    }
                    _ => result.add_error(
                        "location",
                        "Fixed location provider needs both latitude and longitude",
                    ),
                }
            }
            LocationProviderKind::Http => {
                self.validate_url(&self.location.lookup_url, "location.lookup_url", &mut result);
                if self.location.timeout_secs == 0 {
                    result.add_error("location.timeout_secs", "Timeout must be greater than 0");
                }
            }
        }

        if !self.model.path.exists() {
            result.add_warning(
                "model.path",
                format!("Model file does not exist: {}", self.model.path.display()),
            );
        }

        self.validate_url(&self.store.base_url, "store.base_url", &mut result);

        if self.store.collection.trim().is_empty() {
            result.add_error("store.collection", "Collection name must not be empty");
        }

        if self.store.timeout_secs == 0 {
            result.add_error("store.timeout_secs", "Timeout must be greater than 0");
        }

        if !self.store.is_configured() {
            result.add_warning(
                "store.project_id",
                "Document store project not configured - results cannot be published",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weathercam");

        Ok(config_dir.join("config.toml"))
    }
}
