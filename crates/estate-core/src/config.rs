//! Listings service configuration
//!
//! Configuration is read once at startup from environment variables and
//! passed explicitly into every component. Every missing required
//! variable is reported in a single error.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtSettings,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &'static str| match get(key) {
            Some(value) => value,
            None => {
                missing.push(key);
                String::new()
            }
        };

        let surreal_url = required("SURREALDB_URL");
        let surreal_user = required("SURREALDB_USER");
        let surreal_pass = required("SURREALDB_PASS");
        let jwt_secret = required("JWT_SECRET");
        let brevo_api_key = required("BREVO_API_KEY");
        let sender_email = required("MAIL_SENDER_EMAIL");
        let cloud_name = required("CLOUDINARY_CLOUD_NAME");
        let cloud_key = required("CLOUDINARY_API_KEY");
        let cloud_secret = required("CLOUDINARY_API_SECRET");

        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired(missing.join(", ")));
        }

        let mut config = Self::default();

        // Server
        if let Some(env) = get("APP_ENV").or_else(|| get("NODE_ENV")) {
            config.server.environment = env.parse()?;
        }
        if let Some(host) = get("API_HOST") {
            config.server.host = host;
        }
        if let Some(port) = get("PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                value: port,
            })?;
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(url) = get("CLIENT_URL") {
            config.server.client_url = url.trim_end_matches('/').to_string();
        }

        // SurrealDB
        config.database.url = surreal_url;
        config.database.user = surreal_user;
        config.database.pass = surreal_pass;
        if let Some(ns) = get("SURREALDB_NAMESPACE") {
            config.database.namespace = ns;
        }
        if let Some(db) = get("SURREALDB_DATABASE") {
            config.database.database = db;
        }

        // JWT
        config.jwt.secret = jwt_secret;
        if let Some(expiry) = get("JWT_ACCESS_EXPIRY") {
            config.jwt.access_expiry = parse_env_duration("JWT_ACCESS_EXPIRY", &expiry)?;
        }
        if let Some(expiry) = get("JWT_REFRESH_EXPIRY") {
            config.jwt.refresh_expiry = parse_env_duration("JWT_REFRESH_EXPIRY", &expiry)?;
        }

        // Mail
        config.mail.brevo_api_key = brevo_api_key;
        config.mail.admin_email = get("ADMIN_EMAIL").unwrap_or_else(|| sender_email.clone());
        config.mail.sender_email = sender_email;
        if let Some(name) = get("MAIL_SENDER_NAME") {
            config.mail.sender_name = name;
        }

        // Object storage
        config.storage.cloud_name = cloud_name;
        config.storage.api_key = cloud_key;
        config.storage.api_secret = cloud_secret;
        if let Some(folder) = get("CLOUDINARY_FOLDER") {
            config.storage.folder = folder;
        }

        // Logging
        if let Some(format) = get("LOG_FORMAT") {
            config.logging.json_format = match format.to_lowercase().as_str() {
                "json" => true,
                "plain" | "pretty" | "text" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LOG_FORMAT".to_string(),
                        value: format,
                    })
                }
            };
        }

        Ok(config)
    }
}

fn parse_env_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse an expiry string such as `45s`, `30m`, `1h` or `7d`.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "duration".to_string(),
        value: value.to_string(),
    };

    let value = value.trim();
    let unit = value.chars().last().ok_or_else(invalid)?;
    let amount: u64 = value[..value.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    amount
        .checked_mul(multiplier)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "test" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "APP_ENV".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows none
    pub cors_origins: Vec<String>,
    /// Frontend base URL used in email links
    pub client_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            client_url: "http://localhost:5173".to_string(),
        }
    }
}

/// SurrealDB connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub namespace: String,
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "localhost:8000".to_string(),
            user: "root".to_string(),
            pass: "root".to_string(),
            namespace: "estate".to_string(),
            database: "listings".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Only the SurrealDB variables, for tools that do not serve HTTP
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = ["SURREALDB_URL", "SURREALDB_USER", "SURREALDB_PASS"]
            .into_iter()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired(missing.join(", ")));
        }

        let defaults = Self::default();
        Ok(Self {
            url: get("SURREALDB_URL").unwrap_or(defaults.url),
            user: get("SURREALDB_USER").unwrap_or(defaults.user),
            pass: get("SURREALDB_PASS").unwrap_or(defaults.pass),
            namespace: get("SURREALDB_NAMESPACE").unwrap_or(defaults.namespace),
            database: get("SURREALDB_DATABASE").unwrap_or(defaults.database),
        })
    }
}

/// Token signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    #[serde(skip_serializing)]
    pub secret: String,
    pub issuer: String,
    pub access_expiry: Duration,
    pub refresh_expiry: Duration,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: "development-secret-change-me".to_string(),
            issuer: "estate-listings".to_string(),
            access_expiry: Duration::from_secs(60 * 60),
            refresh_expiry: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Transactional email provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(skip_serializing)]
    pub brevo_api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    /// Receives tour requests
    pub admin_email: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            brevo_api_key: String::new(),
            sender_email: "no-reply@localhost".to_string(),
            sender_name: "Estate Listings".to_string(),
            admin_email: "no-reply@localhost".to_string(),
        }
    }
}

/// Image storage provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub cloud_name: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    pub folder: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "estate".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "estate_api=debug,tower_http=debug".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        [
            ("SURREALDB_URL", "localhost:8000"),
            ("SURREALDB_USER", "root"),
            ("SURREALDB_PASS", "root"),
            ("JWT_SECRET", "s3cret"),
            ("BREVO_API_KEY", "brevo"),
            ("MAIL_SENDER_EMAIL", "team@estate.test"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.jwt.access_expiry, Duration::from_secs(3600));
        assert_eq!(config.database.namespace, "estate");
    }

    #[test]
    fn test_missing_required_lists_every_variable() {
        let err = AppConfig::from_lookup(|_| None).unwrap_err();
        match err {
            ConfigError::MissingRequired(vars) => {
                assert!(vars.contains("SURREALDB_URL"));
                assert!(vars.contains("JWT_SECRET"));
                assert!(vars.contains("CLOUDINARY_API_SECRET"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_required_counts_as_missing() {
        let mut env = full_env();
        env.insert("JWT_SECRET", "   ".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingRequired(vars)) if vars == "JWT_SECRET"
        ));
    }

    #[test]
    fn test_database_only_lookup() {
        let env = full_env();
        let db = DatabaseConfig::from_lookup(|key| env.get(key).cloned()).unwrap();
        assert_eq!(db.url, "localhost:8000");
        assert_eq!(db.database, "listings");

        assert!(matches!(
            DatabaseConfig::from_lookup(|_| None),
            Err(ConfigError::MissingRequired(vars)) if vars.contains("SURREALDB_PASS")
        ));
    }

    #[test]
    fn test_full_env_loads_with_defaults() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.jwt.secret, "s3cret");
        assert_eq!(config.mail.admin_email, "team@estate.test");
        assert_eq!(config.storage.folder, "estate");
        assert_eq!(config.server.environment, Environment::Development);
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_overrides() {
        let mut env = full_env();
        env.insert("NODE_ENV", "production".to_string());
        env.insert("PORT", "3000".to_string());
        env.insert("JWT_REFRESH_EXPIRY", "14d".to_string());
        env.insert("CORS_ORIGINS", "http://a.test, http://b.test".to_string());
        env.insert("LOG_FORMAT", "json".to_string());

        let config = load(&env).unwrap();
        assert!(config.server.environment.is_production());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.jwt.refresh_expiry, Duration::from_secs(14 * 86400));
        assert_eq!(config.server.cors_origins.len(), 2);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_invalid_values() {
        let mut env = full_env();
        env.insert("PORT", "eighty".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue { key, .. }) if key == "PORT"
        ));

        let mut env = full_env();
        env.insert("JWT_ACCESS_EXPIRY", "1w".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue { key, .. }) if key == "JWT_ACCESS_EXPIRY"
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604800));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("0h").is_err());
        assert!(parse_duration("-1h").is_err());
    }

    proptest! {
        #[test]
        fn parse_duration_scales_units(n in 1u64..100_000) {
            prop_assert_eq!(parse_duration(&format!("{n}m")).unwrap().as_secs(), n * 60);
            prop_assert_eq!(parse_duration(&format!("{n}d")).unwrap().as_secs(), n * 86400);
        }

        #[test]
        fn parse_duration_never_panics(s in "\\PC{0,8}") {
            let _ = parse_duration(&s);
        }
    }
}
