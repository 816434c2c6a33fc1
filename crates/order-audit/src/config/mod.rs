use std::env;
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::audit::{
    AuditRules, RuleError, DEFAULT_ALERT_FAILURE_THRESHOLD, DEFAULT_PENDING_OVERDUE_DAYS,
};

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
    pub audit: AuditSettings,
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
            audit: AuditSettings::from_env()?,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Thresholds and the agency-rule registry handed to the audit engine.
#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub pending_overdue_threshold_days: u32,
    pub alert_failure_threshold: f64,
    pub rules: AuditRules,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            pending_overdue_threshold_days: DEFAULT_PENDING_OVERDUE_DAYS,
            alert_failure_threshold: DEFAULT_ALERT_FAILURE_THRESHOLD,
            rules: AuditRules::standard(),
        }
    }
}

impl AuditSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let pending_overdue_threshold_days = match env::var("AUDIT_PENDING_OVERDUE_DAYS") {
            Ok(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidOverdueThreshold)?,
            Err(_) => DEFAULT_PENDING_OVERDUE_DAYS,
        };

        let alert_failure_threshold = match env::var("AUDIT_ALERT_FAILURE_THRESHOLD") {
            Ok(value) => parse_alert_threshold(&value)?,
            Err(_) => DEFAULT_ALERT_FAILURE_THRESHOLD,
        };

        let mut rules = AuditRules::standard();
        if let Ok(path) = env::var("AUDIT_AGENCY_RULES_PATH") {
            let path = PathBuf::from(path);
            let payload = fs::read_to_string(&path).map_err(|source| ConfigError::AgencyRules {
                path: path.clone(),
                source: AgencyRulesSource::Io(source),
            })?;
            rules
                .apply_overrides_json(&payload)
                .map_err(|source| ConfigError::AgencyRules {
                    path,
                    source: AgencyRulesSource::Rule(source),
                })?;
        }

        Ok(Self {
            pending_overdue_threshold_days,
            alert_failure_threshold,
            rules,
        })
    }
}

/// Parses a failure-rate percentage, accepting values between 0 and 100 inclusive.
pub fn parse_alert_threshold(value: &str) -> Result<f64, ConfigError> {
    let threshold = value
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidAlertThreshold)?;

    if (0.0..=100.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ConfigError::InvalidAlertThreshold)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidOverdueThreshold,
    InvalidAlertThreshold,
    AgencyRules { path: PathBuf, source: AgencyRulesSource },
}

#[derive(Debug)]
pub enum AgencyRulesSource {
    Io(std::io::Error),
    Rule(RuleError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidOverdueThreshold => {
                write!(f, "AUDIT_PENDING_OVERDUE_DAYS must be a non-negative integer")
            }
            ConfigError::InvalidAlertThreshold => {
                write!(f, "AUDIT_ALERT_FAILURE_THRESHOLD must be a number between 0 and 100")
            }
            ConfigError::AgencyRules { path, source } => match source {
                AgencyRulesSource::Io(err) => {
                    write!(f, "unable to read agency rules '{}': {err}", path.display())
                }
                AgencyRulesSource::Rule(err) => {
                    write!(f, "invalid agency rules in '{}': {err}", path.display())
                }
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidOverdueThreshold
            | ConfigError::InvalidAlertThreshold => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::AgencyRules { source, .. } => match source {
                AgencyRulesSource::Io(err) => Some(err),
                AgencyRulesSource::Rule(err) => Some(err),
            },
        }
    }
}
