//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::views::IndexSchema;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_HOST: &str = "127.0.0.1";
    pub const DEV_PORT: u16 = 8080;
    pub const DEV_COUCHBASE_URL: &str = "http://127.0.0.1:8092";
    pub const DEV_BUCKET: &str = "jenkins";
    pub const DEV_VIEW_TIMEOUT_SECS: u64 = 30;
}

/// View service URL selecting the in-process backend.
pub const MEMORY_VIEWS_URL: &str = "memory:";

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// View service connection settings.
#[derive(Debug, Clone)]
pub struct ViewSettings {
    /// Base URL of the view REST API, or `memory:`
    pub url: String,
    /// Bucket holding the job documents
    pub bucket: String,
    /// Design document holding both report views
    pub design_doc: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Deployed index definition version
    pub schema: IndexSchema,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ViewSettings {
    /// Whether the in-process view backend is selected.
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_VIEWS_URL
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// View service settings
    pub views: ViewSettings,
    /// Release used by breakdown requests without a build parameter
    pub default_release: Option<String>,
    /// Directory holding the landing page and its assets
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `GB_HOST`: Server host (default: 127.0.0.1)
    /// - `GB_PORT`: Server port (default: 8080)
    /// - `GB_COUCHBASE_URL`: View REST API base URL, or `memory:`
    /// - `GB_BUCKET`: Bucket name (default: jenkins)
    /// - `GB_DESIGN_DOC`: Design document name (default: bucket name)
    /// - `GB_COUCHBASE_USER` / `GB_COUCHBASE_PASSWORD`: Basic auth credentials
    /// - `GB_INDEX_SCHEMA`: Index definition version, v1 or v2 (default: v2)
    /// - `GB_DEFAULT_RELEASE`: Release shown by the breakdown when no build is given
    /// - `GB_VIEW_TIMEOUT_SECS`: View request timeout (default: 30)
    /// - `GB_STATIC_DIR`: Landing page directory
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let host = env::var("GB_HOST").unwrap_or_else(|_| defaults::DEV_HOST.to_string());

        let port = env::var("GB_PORT")
            .unwrap_or_else(|_| defaults::DEV_PORT.to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("GB_PORT must be a valid port number"))?;

        let url = env::var("GB_COUCHBASE_URL")
            .unwrap_or_else(|_| defaults::DEV_COUCHBASE_URL.to_string());

        let bucket = env::var("GB_BUCKET").unwrap_or_else(|_| defaults::DEV_BUCKET.to_string());
        let design_doc = env::var("GB_DESIGN_DOC").unwrap_or_else(|_| bucket.clone());

        let schema = match env::var("GB_INDEX_SCHEMA") {
            Ok(s) => IndexSchema::parse(&s)
                .ok_or(ConfigError::InvalidValue("GB_INDEX_SCHEMA must be 'v1' or 'v2'"))?,
            Err(_) => IndexSchema::default(),
        };

        let timeout_secs = env::var("GB_VIEW_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults::DEV_VIEW_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("GB_VIEW_TIMEOUT_SECS must be a valid number"))?;

        let views = ViewSettings {
            url,
            bucket,
            design_doc,
            username: env::var("GB_COUCHBASE_USER").ok(),
            password: env::var("GB_COUCHBASE_PASSWORD").ok().map(SecretString::from),
            schema,
            timeout_secs,
        };

        let default_release = env::var("GB_DEFAULT_RELEASE")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let static_dir = env::var("GB_STATIC_DIR").ok().map(PathBuf::from);

        let config = Config {
            environment,
            host,
            port,
            views,
            default_release,
            static_dir,
        };

        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.views.url == defaults::DEV_COUCHBASE_URL {
            errors.push(format!(
                "GB_COUCHBASE_URL is using development default '{}'. Set the production view service URL.",
                defaults::DEV_COUCHBASE_URL
            ));
        }

        if self.views.is_memory() {
            errors.push(
                "GB_COUCHBASE_URL selects the in-memory view backend, which holds no data in production."
                    .to_string(),
            );
        }

        if self.views.username.is_some() && self.views.password.is_none() {
            errors.push("GB_COUCHBASE_USER is set without GB_COUCHBASE_PASSWORD.".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
