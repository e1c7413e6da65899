use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CUTOFF: &str = "17:00:00";
/// UTC+08:00, the station's local time
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;
const CUTOFF_FORMAT: &str = "%H:%M:%S";

/// Settings read from `config/*.toml` and `APP__*` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// `sqlite://...` or `postgres://...`
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Bind address
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `development`, `test`, `production`, ...
    #[validate(length(min = 1))]
    pub environment: String,

    /// Default level for this crate when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit one JSON object per log line
    #[serde(default)]
    pub log_json: bool,

    /// Apply pending migrations before serving
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated origins allowed to call the API
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Accept any origin outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Connection pool bounds
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Pool timeouts, in seconds
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Whole-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Offset of the station's local clock from UTC, in minutes
    #[serde(default = "default_utc_offset_minutes")]
    #[validate(custom = "validate_utc_offset")]
    pub business_utc_offset_minutes: i32,

    /// Local time of day (HH:MM:SS) from which new orders are scheduled for the next day
    #[serde(default = "default_order_cutoff_time")]
    #[validate(custom = "validate_cutoff_time")]
    pub order_cutoff_time: String,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything except the basics
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            business_utc_offset_minutes: default_utc_offset_minutes(),
            order_cutoff_time: default_order_cutoff_time(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_deref()
            .is_some_and(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
    }

    /// Any origin is accepted in development or when explicitly opted in.
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// The station's UTC offset. Out-of-range values fall back to UTC+8.
    pub fn business_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.business_utc_offset_minutes * 60)
            .or_else(|| FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Parsed order cutoff; an unparsable value falls back to 17:00.
    pub fn order_cutoff(&self) -> NaiveTime {
        NaiveTime::parse_from_str(&self.order_cutoff_time, CUTOFF_FORMAT)
            .unwrap_or_else(|_| default_cutoff())
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_origins_missing");
            err.message = Some(
                "outside development set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
                    .into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_pool_bounds");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}
fn default_order_cutoff_time() -> String {
    DEFAULT_CUTOFF.to_string()
}
fn default_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some("log_level must be one of trace, debug, info, warn, error".into());
            Err(err)
        }
    }
}

fn validate_utc_offset(minutes: i32) -> Result<(), ValidationError> {
    // chrono accepts strictly less than a day in either direction
    if minutes.abs() < 24 * 60 {
        Ok(())
    } else {
        Err(ValidationError::new("utc_offset_out_of_range"))
    }
}

fn validate_cutoff_time(value: &str) -> Result<(), ValidationError> {
    NaiveTime::parse_from_str(value, CUTOFF_FORMAT)
        .map(|_| ())
        .map_err(|_| {
            let mut err = ValidationError::new("invalid_cutoff_time");
            err.message = Some("order_cutoff_time must be formatted as HH:MM:SS".into());
            err
        })
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("refill_station_api={},tower_http=info,sqlx=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // RUN_ENV wins over APP_ENV
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!(profile = %run_env, "Loading configuration");

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "No '{}' directory; using built-in defaults and APP__* variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://refill_station.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!(errors = ?e, "Rejected configuration values");
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!(errors = ?e, "Rejected configuration combination");
        AppConfigError::Validation(e)
    })?;

    info!(environment = %app_config.environment, port = app_config.port, "Configuration loaded");
    Ok(app_config)
}
