use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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
    pub leasing: LeasingConfig,
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
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            leasing: LeasingConfig::from_env()?,
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
    pub ansi: bool,
}

/// Bounds on external calls made by the leasing services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasingConfig {
    pub storage_timeout: Duration,
    pub identity_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub currency: String,
}

impl LeasingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            storage_timeout: millis_var("LEASING_STORAGE_TIMEOUT_MS")?
                .unwrap_or(defaults.storage_timeout),
            identity_timeout: millis_var("LEASING_IDENTITY_TIMEOUT_MS")?
                .unwrap_or(defaults.identity_timeout),
            retry_attempts: match env::var("LEASING_RETRY_ATTEMPTS") {
                Ok(raw) => match raw.trim().parse::<u32>() {
                    Ok(attempts) if attempts > 0 => attempts,
                    _ => {
                        return Err(ConfigError::InvalidNumber {
                            key: "LEASING_RETRY_ATTEMPTS",
                        })
                    }
                },
                Err(_) => defaults.retry_attempts,
            },
            retry_backoff: millis_var("LEASING_RETRY_BACKOFF_MS")?
                .unwrap_or(defaults.retry_backoff),
            currency: env::var("LEASING_CURRENCY")
                .map(|value| value.trim().to_ascii_uppercase())
                .ok()
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.currency),
        })
    }
}

impl Default for LeasingConfig {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_millis(2_000),
            identity_timeout: Duration::from_millis(2_000),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            currency: "NGN".to_string(),
        }
    }
}

fn millis_var(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|millis| Some(Duration::from_millis(millis)))
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "LEASING_STORAGE_TIMEOUT_MS",
            "LEASING_IDENTITY_TIMEOUT_MS",
            "LEASING_RETRY_ATTEMPTS",
            "LEASING_RETRY_BACKOFF_MS",
            "LEASING_CURRENCY",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.leasing, LeasingConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn leasing_bounds_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LEASING_STORAGE_TIMEOUT_MS", "750");
        env::set_var("LEASING_RETRY_ATTEMPTS", "5");
        env::set_var("LEASING_CURRENCY", " usd ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.leasing.storage_timeout, Duration::from_millis(750));
        assert_eq!(config.leasing.retry_attempts, 5);
        assert_eq!(config.leasing.currency, "USD");
        assert_eq!(config.leasing.identity_timeout, Duration::from_millis(2_000));
        reset_env();
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LEASING_RETRY_ATTEMPTS", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key }) => assert_eq!(key, "LEASING_RETRY_ATTEMPTS"),
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }
}
