use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const MIN_SECRET_LEN: usize = 64;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Signing key shipped in `config/development.toml`.
const DEV_DEFAULT_JWT_SECRET: &str =
    "windowworks_development_signing_key_used_only_for_local_runs_Q8v2Lx7pTz";

/// Service settings, layered from `config/*.toml` and `APP__*` variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,

    /// HS256 signing key.
    #[validate(custom = "validate_jwt_secret")]
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: usize,
    #[serde(default = "defaults::auth_issuer")]
    pub auth_issuer: String,
    #[serde(default = "defaults::auth_audience")]
    pub auth_audience: String,

    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// `development`, `staging` or `production`.
    pub environment: String,

    #[serde(default = "defaults::log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated origins for the browser front ends.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default = "defaults::db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "defaults::db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "defaults::db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "defaults::db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "defaults::db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Buffer of the domain event channel; sends past it are dropped.
    #[serde(default = "defaults::event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// `WM` in `WM-2025-0001`.
    #[serde(default = "defaults::order_number_prefix")]
    #[validate(length(min = 1, max = 8))]
    pub order_number_prefix: String,
    /// `CT` in `CT-2025-0001`.
    #[serde(default = "defaults::contract_number_prefix")]
    #[validate(length(min = 1, max = 8))]
    pub contract_number_prefix: String,
    /// ISO 4217 code stamped on new orders.
    #[serde(default = "defaults::currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,
}

mod defaults {
    pub(super) const ENVIRONMENT: &str = "development";
    pub(super) const LOG_LEVEL: &str = "info";
    pub(super) const PORT: u16 = 8080;

    pub(super) fn port() -> u16 {
        PORT
    }
    pub(super) fn log_level() -> String {
        LOG_LEVEL.into()
    }
    pub(super) fn auth_issuer() -> String {
        "windowworks-api".into()
    }
    pub(super) fn auth_audience() -> String {
        "windowworks-clients".into()
    }
    pub(super) fn db_max_connections() -> u32 {
        16
    }
    pub(super) fn db_min_connections() -> u32 {
        2
    }
    pub(super) fn db_connect_timeout_secs() -> u64 {
        30
    }
    pub(super) fn db_idle_timeout_secs() -> u64 {
        600
    }
    pub(super) fn db_acquire_timeout_secs() -> u64 {
        8
    }
    pub(super) fn event_channel_capacity() -> usize {
        1024
    }
    pub(super) fn order_number_prefix() -> String {
        "WM".into()
    }
    pub(super) fn contract_number_prefix() -> String {
        "CT".into()
    }
    pub(super) fn currency() -> String {
        "EUR".into()
    }
}

impl AppConfig {
    /// Builds a config from the required settings; everything else takes its default.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            auth_issuer: defaults::auth_issuer(),
            auth_audience: defaults::auth_audience(),
            host,
            port,
            environment,
            log_level: defaults::log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: defaults::db_max_connections(),
            db_min_connections: defaults::db_min_connections(),
            db_connect_timeout_secs: defaults::db_connect_timeout_secs(),
            db_idle_timeout_secs: defaults::db_idle_timeout_secs(),
            db_acquire_timeout_secs: defaults::db_acquire_timeout_secs(),
            event_channel_capacity: defaults::event_channel_capacity(),
            order_number_prefix: defaults::order_number_prefix(),
            contract_number_prefix: defaults::contract_number_prefix(),
            default_currency: defaults::currency(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    fn cors_origins_configured(&self) -> bool {
        self.cors_allowed_origins
            .as_deref()
            .is_some_and(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
    }

    /// Settings that are fine on a laptop but not on a shared deployment.
    fn deployment_problems(&self) -> Vec<(&'static str, &'static str)> {
        if self.is_development() {
            return Vec::new();
        }

        let mut problems = Vec::new();
        if !self.cors_allow_any_origin && !self.cors_origins_configured() {
            problems.push((
                "cors_allowed_origins",
                "List the front-end origins in APP__CORS_ALLOWED_ORIGINS or set APP__CORS_ALLOW_ANY_ORIGIN=true",
            ));
        }
        if self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            problems.push((
                "jwt_secret",
                "The development signing key is only accepted when environment = development",
            ));
        }
        problems
    }

    fn validate_deployment(&self) -> Result<(), ValidationErrors> {
        let problems = self.deployment_problems();
        if problems.is_empty() {
            return Ok(());
        }

        let mut errors = ValidationErrors::new();
        for (field, message) in problems {
            let mut err = ValidationError::new("deployment");
            err.message = Some(message.into());
            errors.add(field, err);
        }
        Err(errors)
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Ok(());
    }
    let mut err = ValidationError::new("log_level");
    err.message = Some(format!("Expected one of {}", LOG_LEVELS.join(", ")).into());
    Err(err)
}

/// Returns the first way in which `secret` is too weak to sign tokens.
fn secret_weakness(secret: &str) -> Option<&'static str> {
    let trimmed = secret.trim();
    let lower = trimmed.to_ascii_lowercase();
    let distinct = trimmed.chars().collect::<HashSet<_>>().len();

    if trimmed.len() < MIN_SECRET_LEN {
        Some("Signing key must be at least 64 characters")
    } else if distinct == 1 {
        Some("Signing key is a single repeated character")
    } else if ["changeme", "password", "secret123", "12345", "abcdef"]
        .iter()
        .any(|fragment| lower.contains(fragment))
    {
        Some("Signing key contains a well-known placeholder")
    } else if distinct < 10 {
        Some("Signing key needs at least 10 distinct characters")
    } else {
        None
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    match secret_weakness(secret) {
        None => Ok(()),
        Some(reason) => {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some(reason.into());
            Err(err)
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("windowworks_api={level},tower_http=debug,sea_orm=warn"));
    let builder = fmt().with_env_filter(EnvFilter::new(filter));

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// Reads `config/default.toml`, then `config/<RUN_ENV>.toml`, then `APP__*`
/// variables, and rejects settings that fail validation.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| defaults::ENVIRONMENT.to_string());
    info!(environment = %run_env, "Loading configuration");

    if !Path::new(CONFIG_DIR).is_dir() {
        warn!(dir = CONFIG_DIR, "No config directory; using defaults and APP__* variables");
    }

    let settings = Config::builder()
        .set_default("database_url", "sqlite://windowworks.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", defaults::PORT)?
        .set_default("environment", defaults::ENVIRONMENT)?
        .set_default("log_level", defaults::LOG_LEVEL)?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // No built-in default: a key must be supplied explicitly.
    if settings.get_string("jwt_secret").is_err() {
        error!("APP__JWT_SECRET is not set");
        return Err(ConfigError::NotFound("jwt_secret".into()).into());
    }

    let app_config: AppConfig = settings.try_deserialize()?;
    app_config
        .validate()
        .and_then(|()| app_config.validate_deployment())
        .map_err(|e| {
            error!(errors = ?e, "Rejected configuration");
            AppConfigError::Validation(e)
        })?;

    info!(
        environment = %app_config.environment,
        port = app_config.port,
        "Configuration loaded"
    );
    Ok(app_config)
}
