use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the web frontend, used in emails and AI property links
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub paypal: PayPalConfig,
    #[serde(default)]
    pub google: GoogleOAuthConfig,
    #[serde(default)]
    pub facebook: FacebookOAuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
    #[serde(default = "default_refresh_expiry_days")]
    pub refresh_expiry_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of the generative model API
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// Maximum number of cached model sessions kept in memory
    #[serde(default = "default_max_sessions")]
    pub max_cached_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_refresh_expiry_days() -> u64 {
    7
}

fn default_max_sessions() -> usize {
    256
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "".to_string(),
            port: 587,
            username: "".to_string(),
            password: "".to_string(),
            from_email: "noreply@estateflow.example".to_string(),
            from_name: "EstateFlow".to_string(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: "".to_string(),
            model: "gemini-2.0-flash".to_string(),
            max_cached_sessions: default_max_sessions(),
        }
    }
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api-m.sandbox.paypal.com".to_string(),
            client_id: "".to_string(),
            client_secret: "".to_string(),
        }
    }
}

impl Default for GoogleOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "".to_string(),
            client_secret: "".to_string(),
            redirect_uri: "postmessage".to_string(),
        }
    }
}

impl Default for FacebookOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "".to_string(),
            client_secret: "".to_string(),
            redirect_uri: "postmessage".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
            },
            database: DatabaseConfig {
                path: "./data/estateflow.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 1,
                refresh_expiry_days: 7,
            },
            smtp: SmtpConfig::default(),
            ai: AiConfig::default(),
            paypal: PayPalConfig::default(),
            google: GoogleOAuthConfig::default(),
            facebook: FacebookOAuthConfig::default(),
            frontend_url: default_frontend_url(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("ESTATEFLOW_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("estateflow-server.toml"),
            PathBuf::from("config/estateflow-server.toml"),
            PathBuf::from("/etc/estateflow/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server.port, 3001);
        assert_eq!(parsed.auth.refresh_expiry_days, 7);
        assert_eq!(parsed.ai.max_cached_sessions, 256);
    }

    #[test]
    fn test_partial_config_uses_section_defaults() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]
            path = "/tmp/test.db"

            [auth]
            jwt_secret = "secret"
            token_expiry_hours = 2
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(!config.smtp.enabled);
        assert_eq!(config.auth.refresh_expiry_days, 7);
        assert_eq!(config.frontend_url, "http://localhost:5173");
    }
}
