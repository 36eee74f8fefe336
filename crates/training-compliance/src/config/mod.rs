use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_PASS_THRESHOLD: u8 = 80;
const DEFAULT_VALIDITY_MONTHS: u32 = 12;

/// Deployment stage, from `APP_ENV`.
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

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub certification: CertificationSettings,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses an optional variable, falling back to `default` when it is unset.
fn parse_var<T, F>(
    key: &str,
    default: T,
    accept: F,
    error: fn(String) -> ConfigError,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&T) -> bool,
{
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<T>()
        .ok()
        .filter(|value| accept(value))
        .ok_or(error(raw))
}

impl AppConfig {
    /// Reads `.env` (when present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));
        let server = ServerConfig {
            host: var_or("APP_HOST", "127.0.0.1"),
            port: parse_var("APP_PORT", 3000, |_| true, |_| ConfigError::InvalidPort)?,
        };
        let telemetry = TelemetryConfig {
            log_level: var_or("APP_LOG_LEVEL", "info"),
        };
        let certification = CertificationSettings {
            pass_threshold: parse_var(
                "CERTIFICATION_PASS_THRESHOLD",
                DEFAULT_PASS_THRESHOLD,
                |value: &u8| *value <= 100,
                ConfigError::InvalidPassThreshold,
            )?,
            validity_months: parse_var(
                "CERTIFICATE_VALIDITY_MONTHS",
                DEFAULT_VALIDITY_MONTHS,
                |value: &u32| *value > 0,
                ConfigError::InvalidValidityMonths,
            )?,
        };

        Ok(Self {
            environment,
            server,
            telemetry,
            certification,
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

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Certification dials: passing score and how long an issued certificate stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificationSettings {
    pub pass_threshold: u8,
    pub validity_months: u32,
}

impl Default for CertificationSettings {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            validity_months: DEFAULT_VALIDITY_MONTHS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPassThreshold(String),
    InvalidValidityMonths(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPassThreshold(raw) => write!(
                f,
                "CERTIFICATION_PASS_THRESHOLD must be an integer between 0 and 100 (got '{raw}')"
            ),
            ConfigError::InvalidValidityMonths(raw) => write!(
                f,
                "CERTIFICATE_VALIDITY_MONTHS must be a positive integer (got '{raw}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidPassThreshold(_)
            | ConfigError::InvalidValidityMonths(_) => None,
        }
    }
}
