use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::projects::Verdict;

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

/// Top-level configuration for the portal.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
    /// JSON file with the accounts and profiles to load at startup.
    pub seed_file: Option<PathBuf>,
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

        let workflow = match env::var("APP_SHORTLIST_VERDICTS") {
            Ok(raw) => WorkflowConfig::parse_verdicts(&raw)?,
            Err(_) => WorkflowConfig::default(),
        };

        let seed_file = env::var("APP_SEED_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow,
            seed_file,
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

/// Verdicts a teacher may hand out when deciding an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub shortlist_verdicts: Vec<Verdict>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            shortlist_verdicts: vec![Verdict::Accepted, Verdict::Declined],
        }
    }
}

impl WorkflowConfig {
    /// Parse a comma-separated list such as `accepted,rejected`. Pending is never a decision.
    pub fn parse_verdicts(raw: &str) -> Result<Self, ConfigError> {
        let mut shortlist_verdicts = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            match Verdict::from_label(entry) {
                Some(verdict) if !verdict.is_pending() => {
                    if !shortlist_verdicts.contains(&verdict) {
                        shortlist_verdicts.push(verdict);
                    }
                }
                _ => return Err(ConfigError::InvalidVerdict(entry.to_string())),
            }
        }

        if shortlist_verdicts.is_empty() {
            return Err(ConfigError::InvalidVerdict(raw.to_string()));
        }
        Ok(Self { shortlist_verdicts })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidVerdict(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidVerdict(value) => write!(
                f,
                "APP_SHORTLIST_VERDICTS must list accepted and/or rejected (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidVerdict(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
