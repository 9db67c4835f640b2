use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_VELOCITY_WINDOW_DAYS: u32 = 30;
const DEFAULT_EXPIRY_ALERT_DAYS: u32 = 20;
const DEFAULT_ALERT_LIMIT: usize = 5;
const DEFAULT_HORIZON_DAYS: u32 = 7;
const DEFAULT_MIN_HISTORY_DAYS: usize = 5;
const DEFAULT_SUPPLIER_MATCH_THRESHOLD: u8 = 85;
const DEFAULT_STOCK_MINIMO: i32 = 5;

/// Payment-method adjustments applied at the point of sale.
///
/// Percentages are plain numbers (`10.5` means 10.5%). The record is read once
/// per settlement and passed down explicitly.
#[derive(Clone, Debug, Default, Deserialize, Validate, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Discount for cash payments
    #[serde(default)]
    #[validate(custom = "validate_percentage")]
    pub cash_discount_pct: Decimal,

    /// Surcharge for credit-card payments
    #[serde(default)]
    #[validate(custom = "validate_percentage")]
    pub credit_surcharge_pct: Decimal,

    /// Surcharge for QR payments
    #[serde(default)]
    #[validate(custom = "validate_percentage")]
    pub qr_surcharge_pct: Decimal,
}

/// Expiration and shortage risk settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    /// Trailing window used for sales velocity, in days
    #[serde(default = "default_velocity_window_days")]
    #[validate(range(min = 1, max = 365))]
    pub velocity_window_days: u32,

    /// Lots expiring within this many days raise a dashboard alert
    #[serde(default = "default_expiry_alert_days")]
    pub expiry_alert_days: u32,

    /// Maximum alerts returned per list
    #[serde(default = "default_alert_limit")]
    pub alert_limit: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            velocity_window_days: DEFAULT_VELOCITY_WINDOW_DAYS,
            expiry_alert_days: DEFAULT_EXPIRY_ALERT_DAYS,
            alert_limit: DEFAULT_ALERT_LIMIT,
        }
    }
}

/// Demand forecast batch settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForecastConfig {
    /// Number of days predicted, starting at the run date
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Pairs with fewer distinct sale days are skipped
    #[serde(default = "default_min_history_days")]
    #[validate(range(min = 2))]
    pub min_history_days: usize,

    /// Pseudo-observations pulling each weekday effect towards zero
    #[serde(default = "default_seasonality_shrinkage")]
    pub seasonality_shrinkage: f64,

    /// Trend/seasonality backfitting passes
    #[serde(default = "default_backfit_iterations")]
    #[validate(range(min = 1, max = 100))]
    pub backfit_iterations: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            min_history_days: DEFAULT_MIN_HISTORY_DAYS,
            seasonality_shrinkage: default_seasonality_shrinkage(),
            backfit_iterations: default_backfit_iterations(),
        }
    }
}

/// Spreadsheet/invoice import settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct IngestionConfig {
    /// Supplier names must score strictly above this (0-100) to be suggested
    #[serde(default = "default_supplier_match_threshold")]
    #[validate(range(max = 100))]
    pub supplier_match_threshold: u8,

    /// Reorder threshold given to products created by an import
    #[serde(default = "default_stock_minimo")]
    #[validate(range(min = 0))]
    pub default_stock_minimo: i32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            supplier_match_threshold: DEFAULT_SUPPLIER_MATCH_THRESHOLD,
            default_stock_minimo: DEFAULT_STOCK_MINIMO,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// DB idle timeout (seconds)
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// DB acquire timeout (seconds)
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    #[serde(default)]
    #[validate]
    pub risk: RiskConfig,

    #[serde(default)]
    #[validate]
    pub forecast: ForecastConfig,

    #[serde(default)]
    #[validate]
    pub ingestion: IngestionConfig,
}

impl AppConfig {
    /// Builds a configuration with defaults for everything except the essentials.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            pricing: PricingConfig::default(),
            risk: RiskConfig::default(),
            forecast: ForecastConfig::default(),
            ingestion: IngestionConfig::default(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.forecast.horizon_days == 0 || self.forecast.horizon_days > 31 {
            let mut err = ValidationError::new("horizon_days");
            err.message = Some("forecast.horizon_days must be between 1 and 31".into());
            errors.add("forecast", err);
        }

        if !self.forecast.seasonality_shrinkage.is_finite()
            || self.forecast.seasonality_shrinkage < 0.0
        {
            let mut err = ValidationError::new("seasonality_shrinkage");
            err.message =
                Some("forecast.seasonality_shrinkage must be a finite, non-negative number".into());
            errors.add("forecast", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
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

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_velocity_window_days() -> u32 {
    DEFAULT_VELOCITY_WINDOW_DAYS
}

fn default_expiry_alert_days() -> u32 {
    DEFAULT_EXPIRY_ALERT_DAYS
}

fn default_alert_limit() -> usize {
    DEFAULT_ALERT_LIMIT
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

fn default_min_history_days() -> usize {
    DEFAULT_MIN_HISTORY_DAYS
}

fn default_seasonality_shrinkage() -> f64 {
    1.0
}

fn default_backfit_iterations() -> usize {
    10
}

fn default_supplier_match_threshold() -> u8 {
    DEFAULT_SUPPLIER_MATCH_THRESHOLD
}

fn default_stock_minimo() -> i32 {
    DEFAULT_STOCK_MINIMO
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_percentage(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() || *value > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("percentage");
        err.message = Some("Percentages must be between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("retail_ledger={},sea_orm=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`], reading files from `config_dir`.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://retail_ledger.db?mode=rwc")?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(
            File::with_name(&config_dir.join("default").to_string_lossy()).required(false),
        )
        .add_source(File::with_name(&config_dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new("sqlite::memory:".into(), "test".into())
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.risk.velocity_window_days, 30);
        assert_eq!(cfg.forecast.horizon_days, 7);
        assert_eq!(cfg.forecast.min_history_days, 5);
        assert_eq!(cfg.ingestion.supplier_match_threshold, 85);
    }

    #[test]
    fn zero_event_channel_capacity_is_invalid() {
        let mut cfg = base_config();
        cfg.event_channel_capacity = 0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("event_channel_capacity"));

        cfg.event_channel_capacity = 1;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_percentages() {
        let mut cfg = base_config();
        cfg.pricing.credit_surcharge_pct = dec!(120);
        assert!(cfg.validate().is_err());

        cfg.pricing.credit_surcharge_pct = dec!(-1);
        assert!(cfg.validate().is_err());

        cfg.pricing.credit_surcharge_pct = dec!(10.5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_pool_bounds() {
        let mut cfg = base_config();
        cfg.db_min_connections = 20;
        cfg.db_max_connections = 5;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn rejects_unbounded_horizon() {
        let mut cfg = base_config();
        cfg.forecast.horizon_days = 90;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn loads_pricing_from_file() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
            database_url = "sqlite::memory:"
            environment = "test"

            [pricing]
            cash_discount_pct = "5"
            credit_surcharge_pct = "10.5"
            qr_surcharge_pct = "3"
            "#
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.pricing.cash_discount_pct, dec!(5));
        assert_eq!(cfg.pricing.credit_surcharge_pct, dec!(10.5));
        assert_eq!(cfg.pricing.qr_surcharge_pct, dec!(3));
    }
}
