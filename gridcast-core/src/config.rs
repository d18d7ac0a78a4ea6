use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{Role, SourceId};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub registry: RegistryConfig,
    pub compositor: CompositorConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,

    /// Restart the compositor for a persisted active session on boot.
    pub resume_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            registry: RegistryConfig::default(),
            compositor: CompositorConfig::default(),
            media: MediaConfig::default(),
            logging: LoggingConfig::default(),
            resume_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// A provisioned account. Accounts are static configuration, there is no
/// signup flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,

    /// Argon2 PHC string (`$argon2id$...`), never a plaintext password.
    pub password_hash: String,

    pub role: Role,

    /// Required for `role: source`, ignored otherwise.
    #[serde(default)]
    pub home_source: Option<SourceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub users: Vec<UserConfig>,
    pub token_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            token_ttl_hours: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Where the session document lives. Unset means in-memory only, which
    /// loses sessions across restarts.
    pub data_path: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { data_path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub tick_rate_hz: u32,
    pub audio_sample_rate: u32,
    pub audio_channels: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1280,
            canvas_height: 720,
            tick_rate_hz: 30,
            audio_sample_rate: 48000,
            audio_channels: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Bound on each subscriber's frame queue; slow subscribers drop frames
    /// past this instead of stalling the publisher.
    pub subscriber_channel_capacity: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            subscriber_channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
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
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (GRIDCAST_SERVER_HOST, etc.)
        builder = builder.add_source(
            Environment::with_prefix("GRIDCAST")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Check for fatal misconfigurations. Collects every problem found so
    /// the operator can fix them in one pass instead of one per restart.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be nonzero".to_string());
        }
        if self.auth.token_ttl_hours == 0 {
            errors.push("auth.token_ttl_hours must be at least 1".to_string());
        }
        if self.compositor.canvas_width == 0 || self.compositor.canvas_height == 0 {
            errors.push("compositor canvas dimensions must be nonzero".to_string());
        }
        if self.compositor.tick_rate_hz == 0 {
            errors.push("compositor.tick_rate_hz must be nonzero".to_string());
        }
        if self.compositor.audio_sample_rate == 0 {
            errors.push("compositor.audio_sample_rate must be nonzero".to_string());
        }
        if self.compositor.audio_channels == 0 || self.compositor.audio_channels > 8 {
            errors.push("compositor.audio_channels must be between 1 and 8".to_string());
        }
        if self.media.subscriber_channel_capacity == 0 {
            errors.push("media.subscriber_channel_capacity must be nonzero".to_string());
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
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.compositor.tick_rate_hz, 30);
        assert_eq!(config.compositor.canvas_width, 1280);
        assert_eq!(config.auth.token_ttl_hours, 4);
        assert!(config.registry.data_path.is_none());
        assert!(config.resume_on_start);
    }

    #[test]
    fn test_http_address() {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                http_port: 9000,
            },
            ..Config::default()
        };

        assert_eq!(config.http_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.compositor.tick_rate_hz = 0;
        config.compositor.audio_channels = 99;
        config.media.subscriber_channel_capacity = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("tick_rate_hz")));
    }

    #[test]
    fn test_user_config_parses_source_role() {
        let yaml_as_json = serde_json::json!({
            "name": "gate-cam",
            "password_hash": "$argon2id$v=19$m=19456,t=2,p=1$abc$def",
            "role": "source",
            "home_source": "gate-north"
        });
        let user: UserConfig = serde_json::from_value(yaml_as_json).unwrap();
        assert_eq!(user.role, Role::Source);
        assert_eq!(
            user.home_source.as_ref().map(|s| s.as_str()),
            Some("gate-north")
        );
    }
}
