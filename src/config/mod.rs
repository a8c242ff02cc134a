//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden with
//! `BAZAAR_*` environment variables. Every value is optional; missing ones
//! fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub views: ViewsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL used to build links in outgoing emails
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration (SQLite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path, `sqlite:` URL, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/bazaar.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Session lifetime in hours
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Mark the cookie `Secure` (HTTPS deployments)
    #[serde(default)]
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_hours: default_ttl_hours(),
            secure: false,
        }
    }
}

fn default_cookie_name() -> String {
    "bazaar.sid".to_string()
}

fn default_ttl_hours() -> i64 {
    24
}

/// Outbound mail configuration.
///
/// When `smtp_host` is unset, messages are written to the log instead of sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    /// Sender address
    #[serde(default = "default_mail_from")]
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from: default_mail_from(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_from() -> String {
    "shop@bazaar.local".to_string()
}

/// Product image upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory images are written to; served under `/images`
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("images")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/png".to_string(),
        "image/jpg".to_string(),
        "image/jpeg".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(mime_type))
    }
}

/// Storefront presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            items_per_page: default_items_per_page(),
        }
    }
}

fn default_items_per_page() -> u32 {
    6
}

/// Template location. Unset means the templates compiled into the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewsConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the defaults; malformed YAML is an error
    /// carrying the line and column.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides:
    ///
    /// - BAZAAR_SERVER_HOST, BAZAAR_SERVER_PORT, BAZAAR_SERVER_BASE_URL
    /// - BAZAAR_DATABASE_URL
    /// - BAZAAR_SESSION_SECURE
    /// - BAZAAR_MAIL_SMTP_HOST, BAZAAR_MAIL_SMTP_PORT, BAZAAR_MAIL_SMTP_USERNAME,
    ///   BAZAAR_MAIL_SMTP_PASSWORD, BAZAAR_MAIL_FROM
    /// - BAZAAR_UPLOAD_PATH
    pub fn load_with_env(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BAZAAR_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BAZAAR_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(base_url) = std::env::var("BAZAAR_SERVER_BASE_URL") {
            self.server.base_url = base_url;
        }

        if let Ok(url) = std::env::var("BAZAAR_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secure) = std::env::var("BAZAAR_SESSION_SECURE") {
            match secure.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.session.secure = true,
                "0" | "false" | "no" => self.session.secure = false,
                _ => {}
            }
        }

        if let Ok(host) = std::env::var("BAZAAR_MAIL_SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Ok(port) = std::env::var("BAZAAR_MAIL_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("BAZAAR_MAIL_SMTP_USERNAME") {
            self.mail.smtp_username = Some(username);
        }
        if let Ok(password) = std::env::var("BAZAAR_MAIL_SMTP_PASSWORD") {
            self.mail.smtp_password = Some(password);
        }
        if let Ok(from) = std::env::var("BAZAAR_MAIL_FROM") {
            self.mail.from = from;
        }

        if let Ok(path) = std::env::var("BAZAAR_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.ttl_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "session.ttl_hours must be positive".to_string(),
            ));
        }
        if self.shop.items_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "shop.items_per_page must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENV_VARS: &[&str] = &[
        "BAZAAR_SERVER_HOST",
        "BAZAAR_SERVER_PORT",
        "BAZAAR_SERVER_BASE_URL",
        "BAZAAR_DATABASE_URL",
        "BAZAAR_SESSION_SECURE",
        "BAZAAR_MAIL_SMTP_HOST",
        "BAZAAR_MAIL_SMTP_PORT",
        "BAZAAR_MAIL_SMTP_USERNAME",
        "BAZAAR_MAIL_SMTP_PASSWORD",
        "BAZAAR_MAIL_FROM",
        "BAZAAR_UPLOAD_PATH",
    ];

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        let guard = super::CONFIG_ENV_MUTEX
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
        guard
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = Config::load(Path::new("nonexistent_bazaar.yml")).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "data/bazaar.db");
        assert_eq!(config.session.cookie_name, "bazaar.sid");
        assert_eq!(config.session.ttl_hours, 24);
        assert!(config.mail.smtp_host.is_none());
        assert_eq!(config.upload.path, PathBuf::from("images"));
        assert_eq!(config.shop.items_per_page, 6);
        assert!(config.views.path.is_none());
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8080\nshop:\n  items_per_page: 2\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.shop.items_per_page, 2);
        assert_eq!(config.session.ttl_hours, 24);
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9000
  base_url: "https://shop.example.com"
database:
  url: "sqlite:/var/lib/bazaar.db"
  max_connections: 4
session:
  cookie_name: "sid"
  ttl_hours: 2
  secure: true
mail:
  smtp_host: "smtp.example.com"
  smtp_port: 465
  smtp_username: "mailer"
  smtp_password: "secret"
  from: "noreply@example.com"
upload:
  path: "/srv/images"
  max_file_size: 1024
views:
  path: "templates"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.base_url, "https://shop.example.com");
        assert_eq!(config.database.url, "sqlite:/var/lib/bazaar.db");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.session.cookie_name, "sid");
        assert!(config.session.secure);
        assert_eq!(config.mail.smtp_host.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.mail.smtp_port, 465);
        assert_eq!(config.mail.from, "noreply@example.com");
        assert_eq!(config.upload.path, PathBuf::from("/srv/images"));
        assert_eq!(config.upload.max_file_size, 1024);
        // Unspecified list keeps its default
        assert_eq!(config.upload.allowed_types.len(), 3);
        assert_eq!(config.views.path, Some(PathBuf::from("templates")));
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_load_rejects_non_positive_ttl() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "session:\n  ttl_hours: 0\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("ttl_hours"));
    }

    #[test]
    fn test_upload_type_check_is_case_insensitive() {
        let upload = UploadConfig::default();
        assert!(upload.is_type_allowed("image/png"));
        assert!(upload.is_type_allowed("IMAGE/JPEG"));
        assert!(upload.is_type_allowed("image/jpg"));
        assert!(!upload.is_type_allowed("image/gif"));
        assert!(!upload.is_type_allowed("application/pdf"));
    }

    #[test]
    fn test_env_override_server_and_mail() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 3000\n").unwrap();

        std::env::set_var("BAZAAR_SERVER_PORT", "4000");
        std::env::set_var("BAZAAR_SERVER_BASE_URL", "https://bazaar.test");
        std::env::set_var("BAZAAR_MAIL_SMTP_HOST", "smtp.test");
        std::env::set_var("BAZAAR_SESSION_SECURE", "true");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.base_url, "https://bazaar.test");
        assert_eq!(config.mail.smtp_host.as_deref(), Some("smtp.test"));
        assert!(config.session.secure);

        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_env_override_invalid_port_ignored() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8080\n").unwrap();

        std::env::set_var("BAZAAR_SERVER_PORT", "not_a_number");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);

        std::env::remove_var("BAZAAR_SERVER_PORT");
    }
}
