use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Default attachment cap shared by every service schema (5 MiB).
pub const DEFAULT_ATTACHMENT_CAP_BYTES: u64 = 5 * 1024 * 1024;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Endpoints and secrets the intake saga needs before it can leave `Idle`.
///
/// All of these are required: a missing value fails `serve` at startup
/// rather than failing the first submission at runtime. The record-keeping
/// token never leaves this process; form frontends talk to this service, not
/// to the record-keeping backend directly.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Record-keeping submission endpoint.
    pub record_url: String,
    /// Shared secret presented to the record-keeping endpoint.
    pub record_token: String,
    /// Internal payment-preparation endpoint.
    pub payment_preparation_url: String,
    /// Payment provider API base URL (intent status lookups).
    pub provider_url: String,
    /// Provider publishable key.
    pub provider_publishable_key: String,
    /// Return URL handed to the provider for authentication redirects.
    pub payment_return_url: String,
    /// Upper bound for a single attachment, in bytes.
    pub attachment_cap_bytes: u64,
}

impl IntakeConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let attachment_cap_bytes = match env::var("INTAKE_ATTACHMENT_CAP_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidAttachmentCap)?,
            Err(_) => DEFAULT_ATTACHMENT_CAP_BYTES,
        };

        Ok(Self {
            record_url: required_var("INTAKE_RECORD_URL")?,
            record_token: required_var("INTAKE_RECORD_TOKEN")?,
            payment_preparation_url: required_var("INTAKE_PAYMENT_PREP_URL")?,
            provider_url: required_var("INTAKE_PROVIDER_URL")?,
            provider_publishable_key: required_var("INTAKE_PROVIDER_KEY")?,
            payment_return_url: required_var("INTAKE_RETURN_URL")?,
            attachment_cap_bytes,
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar { name }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAttachmentCap,
    MissingVar { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAttachmentCap => {
                write!(f, "INTAKE_ATTACHMENT_CAP_BYTES must be a byte count")
            }
            ConfigError::MissingVar { name } => {
                write!(f, "required environment variable {name} is not set")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
