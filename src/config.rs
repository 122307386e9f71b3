use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::models::{Coordinates, Language};
use crate::transport::{DEFAULT_MODEL, GEMINI_API_URL};

/// Main configuration structure for Kisan Saathi
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub dialogue: DialogueConfig,
    pub geolocation: GeolocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Never stored in the config file in practice; set `GEMINI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_API_URL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Language code, one of hi, te, ta, en, ur.
    pub default_language: String,
    /// Optional YAML intent table replacing the built-in one.
    pub intents_path: Option<String>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            default_language: Language::English.code().to_string(),
            intents_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoProviderKind {
    /// Coordinates from config, env or flags.
    #[default]
    Static,
    /// Platform without location support.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub provider: GeoProviderKind,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timeout_secs: u64,
    /// How long a price turn may wait for an in-flight location request.
    /// Zero means never wait.
    pub await_pending_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            provider: GeoProviderKind::Static,
            latitude: None,
            longitude: None,
            timeout_secs: 10,
            await_pending_ms: 0,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let config_path =
            env::var("KISAN_CONFIG_PATH").unwrap_or_else(|_| "kisan.yaml".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> Self {
        let env_paths = [".env", "../.env"];
        let env_loaded = env_paths.iter().any(|path| {
            let loaded = dotenvy::from_path(path).is_ok();
            if loaded {
                tracing::info!("Loaded .env from: {}", path);
            }
            loaded
        });
        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let mut config = if Path::new(config_path).exists() {
            match fs::read_to_string(config_path) {
                Ok(contents) => match Self::from_yaml(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Gemini overrides
        if let Some(api_key) = var("GEMINI_API_KEY") {
            self.gemini.api_key = api_key;
        }
        if let Some(model) = var("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(base_url) = var("GEMINI_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Some(secs) = var("GEMINI_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.gemini.request_timeout_secs = secs;
        }

        // Dialogue overrides
        if let Some(language) = var("KISAN_LANGUAGE") {
            self.dialogue.default_language = language;
        }
        if let Some(path) = var("KISAN_INTENTS_PATH") {
            self.dialogue.intents_path = Some(path);
        }

        // Geolocation overrides
        if let Some(provider) = var("KISAN_GEO_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "static" => self.geolocation.provider = GeoProviderKind::Static,
                "none" | "unsupported" => self.geolocation.provider = GeoProviderKind::None,
                other => tracing::warn!("Unknown KISAN_GEO_PROVIDER '{}' - ignoring", other),
            }
        }
        if let Some(lat) = var("KISAN_LAT").and_then(|v| v.parse().ok()) {
            self.geolocation.latitude = Some(lat);
        }
        if let Some(lng) = var("KISAN_LNG").and_then(|v| v.parse().ok()) {
            self.geolocation.longitude = Some(lng);
        }
        if let Some(secs) = var("KISAN_GEO_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.geolocation.timeout_secs = secs;
        }
        if let Some(ms) = var("KISAN_GEO_AWAIT_MS").and_then(|v| v.parse().ok()) {
            self.geolocation.await_pending_ms = ms;
        }
    }

    /// Apply command-line flags, which win over file and environment, then
    /// validate again. Problems are logged, never fatal.
    pub fn apply_flag_overrides(
        &mut self,
        language: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) {
        if let Some(language) = language {
            self.dialogue.default_language = language;
        }
        if latitude.is_some() {
            self.geolocation.latitude = latitude;
        }
        if longitude.is_some() {
            self.geolocation.longitude = longitude;
        }

        if let Err(e) = self.validate() {
            tracing::warn!("Config validation warnings after flags: {} - continuing anyway", e);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.gemini.api_key.trim().is_empty() {
            return Err("GEMINI_API_KEY environment variable must be set".into());
        }
        if self.gemini.model.trim().is_empty() {
            return Err("gemini.model cannot be empty".into());
        }
        if self.gemini.request_timeout_secs == 0 {
            return Err("gemini.request_timeout_secs cannot be 0".into());
        }
        if self.geolocation.timeout_secs == 0 {
            return Err("geolocation.timeout_secs cannot be 0".into());
        }
        if self.dialogue.default_language.parse::<Language>().is_err() {
            return Err(format!(
                "dialogue.default_language '{}' is not a supported language",
                self.dialogue.default_language
            )
            .into());
        }
        if let Some(lat) = self.geolocation.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err("geolocation.latitude must be between -90 and 90".into());
            }
        }
        if let Some(lng) = self.geolocation.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return Err("geolocation.longitude must be between -180 and 180".into());
            }
        }
        Ok(())
    }

    /// Configured language, falling back to English for unknown codes.
    pub fn language(&self) -> Language {
        self.dialogue
            .default_language
            .parse()
            .unwrap_or_else(|e| {
                tracing::warn!("{} - using English", e);
                Language::English
            })
    }

    /// Fixed device coordinates, when both halves are configured.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.geolocation.latitude, self.geolocation.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini.request_timeout_secs)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geolocation.timeout_secs)
    }

    /// `None` when turns should not wait on pending location requests.
    pub fn geo_await_pending(&self) -> Option<Duration> {
        (self.geolocation.await_pending_ms > 0)
            .then(|| Duration::from_millis(self.geolocation.await_pending_ms))
    }
}
