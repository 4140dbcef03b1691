use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{Duration, NaiveTime};

use crate::scheduling::{AlertThresholds, PrepWindow, SchedulingPolicy, TurnoverCoverage};

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
    pub scheduling: SchedulingPolicy,
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
        let ansi = match env::var("APP_LOG_ANSI") {
            Ok(raw) => parse_flag("APP_LOG_ANSI", &raw)?,
            Err(_) => false,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, ansi },
            scheduling: load_scheduling_policy()?,
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

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("{name} has an invalid value `{value}`: expected {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("TURNOVER_ALERT_RED_DAYS ({red}) must not exceed TURNOVER_ALERT_YELLOW_DAYS ({yellow})")]
    AlertThresholdOrder { red: i64, yellow: i64 },
}

fn load_scheduling_policy() -> Result<SchedulingPolicy, ConfigError> {
    let defaults = SchedulingPolicy::default();

    let lead_minutes = parse_var::<u32>("TURNOVER_PREP_LEAD_MINUTES", "minutes as an integer")?;
    let max_days_ahead = parse_var::<u32>("TURNOVER_PREP_MAX_DAYS_AHEAD", "days as an integer")?;
    let prep_window = PrepWindow {
        lead_before_check_in: lead_minutes
            .map(|minutes| Duration::minutes(i64::from(minutes)))
            .unwrap_or(defaults.prep_window.lead_before_check_in),
        max_ahead_of_check_in: max_days_ahead
            .map(|days| Duration::days(i64::from(days)))
            .or(defaults.prep_window.max_ahead_of_check_in),
    };

    let red_days = parse_var::<u32>("TURNOVER_ALERT_RED_DAYS", "days as an integer")?
        .map(i64::from)
        .unwrap_or(defaults.alerts.red_days);
    let yellow_days = parse_var::<u32>("TURNOVER_ALERT_YELLOW_DAYS", "days as an integer")?
        .map(i64::from)
        .unwrap_or(defaults.alerts.yellow_days);
    if red_days > yellow_days {
        return Err(ConfigError::AlertThresholdOrder {
            red: red_days,
            yellow: yellow_days,
        });
    }
    let coverage = match env::var("TURNOVER_ALERT_SECURED_BY") {
        Ok(raw) => TurnoverCoverage::parse(&raw).ok_or(ConfigError::InvalidValue {
            name: "TURNOVER_ALERT_SECURED_BY",
            value: raw,
            expected: "`assigned` or `finished`",
        })?,
        Err(_) => defaults.alerts.coverage,
    };

    let scheduler_window_days =
        match parse_var::<u32>("TURNOVER_SCHEDULER_WINDOW_DAYS", "a positive number of days")? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    name: "TURNOVER_SCHEDULER_WINDOW_DAYS",
                    value: "0".to_string(),
                    expected: "a positive number of days",
                })
            }
            Some(days) => i64::from(days),
            None => defaults.scheduler_window_days,
        };

    Ok(SchedulingPolicy {
        prep_window,
        alerts: AlertThresholds {
            red_days,
            yellow_days,
            coverage,
        },
        scheduler_window_days,
        check_in_time: parse_time("TURNOVER_CHECK_IN_TIME")?.unwrap_or(defaults.check_in_time),
        check_out_time: parse_time("TURNOVER_CHECK_OUT_TIME")?.unwrap_or(defaults.check_out_time),
    })
}

fn parse_var<T: FromStr>(
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name,
                value: raw,
                expected,
            }),
        Err(_) => Ok(None),
    }
}

fn parse_time(name: &'static str) -> Result<Option<NaiveTime>, ConfigError> {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name,
                value: raw,
                expected: "a HH:MM time",
            }),
        Err(_) => Ok(None),
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            expected: "a boolean",
        }),
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

    const VARS: &[&str] = &[
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "APP_LOG_LEVEL",
        "APP_LOG_ANSI",
        "TURNOVER_PREP_LEAD_MINUTES",
        "TURNOVER_PREP_MAX_DAYS_AHEAD",
        "TURNOVER_ALERT_RED_DAYS",
        "TURNOVER_ALERT_YELLOW_DAYS",
        "TURNOVER_ALERT_SECURED_BY",
        "TURNOVER_SCHEDULER_WINDOW_DAYS",
        "TURNOVER_CHECK_IN_TIME",
        "TURNOVER_CHECK_OUT_TIME",
    ];

    fn reset_env() {
        for var in VARS {
            env::remove_var(var);
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
        assert!(!config.telemetry.ansi);
        assert_eq!(config.scheduling, SchedulingPolicy::default());
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
    fn scheduling_policy_reads_turnover_variables() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TURNOVER_PREP_LEAD_MINUTES", "90");
        env::set_var("TURNOVER_PREP_MAX_DAYS_AHEAD", "3");
        env::set_var("TURNOVER_ALERT_RED_DAYS", "1");
        env::set_var("TURNOVER_ALERT_YELLOW_DAYS", "4");
        env::set_var("TURNOVER_ALERT_SECURED_BY", "finished");
        env::set_var("TURNOVER_SCHEDULER_WINDOW_DAYS", "14");
        env::set_var("TURNOVER_CHECK_IN_TIME", "16:30");

        let policy = AppConfig::load().expect("config loads").scheduling;
        assert_eq!(policy.prep_window.lead_before_check_in, Duration::minutes(90));
        assert_eq!(policy.prep_window.max_ahead_of_check_in, Some(Duration::days(3)));
        assert_eq!(policy.alerts.red_days, 1);
        assert_eq!(policy.alerts.yellow_days, 4);
        assert_eq!(policy.alerts.coverage, TurnoverCoverage::Finished);
        assert_eq!(policy.scheduler_window_days, 14);
        assert_eq!(
            policy.check_in_time,
            NaiveTime::from_hms_opt(16, 30, 0).expect("valid time")
        );
        assert_eq!(
            policy.check_out_time,
            NaiveTime::from_hms_opt(11, 0, 0).expect("valid time")
        );
        reset_env();
    }

    #[test]
    fn invalid_turnover_values_name_the_variable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TURNOVER_CHECK_OUT_TIME", "noon");
        let err = AppConfig::load().expect_err("bad time rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "TURNOVER_CHECK_OUT_TIME",
                ..
            }
        ));

        reset_env();
        env::set_var("TURNOVER_ALERT_RED_DAYS", "6");
        let err = AppConfig::load().expect_err("red after yellow rejected");
        assert!(matches!(
            err,
            ConfigError::AlertThresholdOrder { red: 6, yellow: 5 }
        ));

        reset_env();
        env::set_var("TURNOVER_SCHEDULER_WINDOW_DAYS", "0");
        assert!(AppConfig::load().is_err());
        reset_env();
    }
}
