//! Configuration loading and validation.
//!
//! Ported from the teacher's `config`-crate-backed layering: environment
//! variables override an optional config file, which overrides defaults.

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub credential: CredentialConfig,
    pub callback: CallbackConfig,
    pub transcode: TranscodeConfig,
    pub logging: LoggingConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("storage", &self.storage)
            .field("credential", &"<redacted>")
            .field("callback", &self.callback)
            .field("transcode", &self.transcode)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Development mode relaxes CORS and exposes the Swagger UI.
    pub development_mode: bool,
    /// Comma-separated referrer/CORS allow-list origins (`FOCUST_ALLOWED_ORIGINS`).
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            development_mode: false,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// A `Referer` header matches if it starts with one of the allowed origins.
    #[must_use]
    pub fn referrer_allowed(&self, referrer: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|origin| referrer.starts_with(origin.as_str()))
    }
}

/// The four filesystem store roots described in spec §3/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub uploads_root: String,
    pub originals_root: String,
    pub hls_root: String,
    pub presentations_root: String,
    /// Public host used to build absolute playlist/key URLs.
    pub public_host: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_root: "uploads".to_string(),
            originals_root: "originals".to_string(),
            hls_root: "hls".to_string(),
            presentations_root: "presentation_videos".to_string(),
            public_host: "localhost:8080".to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub secret: String,
    pub playback_ttl_seconds: i64,
    pub download_ttl_seconds: i64,
    pub require_filename_for_download: bool,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("secret", &"<redacted>")
            .field("playback_ttl_seconds", &self.playback_ttl_seconds)
            .field("download_ttl_seconds", &self.download_ttl_seconds)
            .field(
                "require_filename_for_download",
                &self.require_filename_for_download,
            )
            .finish()
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            playback_ttl_seconds: 3600,
            download_ttl_seconds: 900,
            require_filename_for_download: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// If set, added as `Authorization: Bearer <value>` on outgoing callbacks.
    pub bearer: Option<String>,
    /// Default lifecycle-tracking base URL used when an upload request
    /// does not supply one explicitly.
    pub default_lifecycle_url: Option<String>,
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for CallbackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackConfig")
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("default_lifecycle_url", &self.default_lifecycle_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            bearer: None,
            default_lifecycle_url: None,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub max_concurrent_jobs: usize,
    pub segment_seconds: u32,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            max_concurrent_jobs: 4,
            segment_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration with priority: environment variables > config
    /// file > defaults. Mirrors the teacher's `LESSONVAULT_`-prefixed
    /// loading convention, plus the spec's own unprefixed variable names
    /// (`SECRET_KEY`, `TOKEN_EXPIRY`, `CALLBACK_BEARER`,
    /// `DOWNLOAD_TOKEN_REQUIRE_FILENAME`, `FOCUST_ALLOWED_ORIGINS`) bound
    /// as explicit overrides after the structured environment pass.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, config::FileFormat::Yaml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("LESSONVAULT")
                .separator("_")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.apply_spec_env_overrides();
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Apply the literal environment variable names spec §6 documents,
    /// taking precedence over anything already loaded. Values already
    /// present in the structured `LESSONVAULT_*` environment still win
    /// if these are unset.
    fn apply_spec_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("SECRET_KEY") {
            if !secret.is_empty() {
                self.credential.secret = secret;
            }
        }
        if let Ok(ttl) = std::env::var("TOKEN_EXPIRY") {
            if let Ok(ttl) = ttl.parse::<i64>() {
                self.credential.playback_ttl_seconds = ttl;
            }
        }
        if let Ok(bearer) = std::env::var("CALLBACK_BEARER") {
            if !bearer.is_empty() {
                self.callback.bearer = Some(bearer);
            }
        }
        if let Ok(require) = std::env::var("DOWNLOAD_TOKEN_REQUIRE_FILENAME") {
            self.credential.require_filename_for_download =
                matches!(require.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(origins) = std::env::var("FOCUST_ALLOWED_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                self.server.allowed_origins = parsed;
            }
        }
    }

    /// Fail-fast validation at startup.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be between 1 and 65535, got 0".to_string());
        }
        if self.credential.secret.is_empty() {
            errors.push("credential.secret must not be empty".to_string());
        } else if self.credential.secret == "change-me-in-production"
            && !self.server.development_mode
        {
            errors.push(
                "credential.secret is set to the default value; set SECRET_KEY or enable server.development_mode for local development"
                    .to_string(),
            );
        }
        if self.credential.playback_ttl_seconds < 0 {
            errors.push("credential.playback_ttl_seconds must not be negative".to_string());
        }
        if self.credential.download_ttl_seconds < 0 {
            errors.push("credential.download_ttl_seconds must not be negative".to_string());
        }
        if self.transcode.max_concurrent_jobs == 0 {
            errors.push("transcode.max_concurrent_jobs must be greater than 0".to_string());
        }
        if !self.server.development_mode && self.server.allowed_origins.is_empty() {
            tracing::warn!(
                "no allowed_origins configured in production; web-audience referrer checks will reject every request"
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_internally_consistent() {
        let config = Config::default();
        assert_eq!(config.server.address(), "0.0.0.0:8080");
        assert_eq!(config.credential.playback_ttl_seconds, 3600);
        assert_eq!(config.credential.download_ttl_seconds, 900);
    }

    #[test]
    fn validate_rejects_default_secret_in_production() {
        let config = Config::default();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("default value")));
    }

    #[test]
    fn validate_allows_default_secret_in_development_mode() {
        let mut config = Config::default();
        config.server.development_mode = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut config = Config::default();
        config.server.development_mode = true;
        config.server.port = 0;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("port")));
    }

    #[test]
    fn referrer_allowed_matches_prefix() {
        let mut config = Config::default();
        config.server.allowed_origins = vec!["https://focustagency.com".to_string()];
        assert!(config.server.referrer_allowed("https://focustagency.com/lesson/1"));
        assert!(!config.server.referrer_allowed("https://evil.example.com"));
    }
}
