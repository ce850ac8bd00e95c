use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DATABASE_URL: &str = "sqlite://labels.db?mode=rwc";
pub const DEFAULT_LINE_DB_URL_TEMPLATE: &str = "postgres://{user}:{password}@{server}/{database}";
pub const DEFAULT_SERIAL_TOKEN: &str = "#SN#";
pub const DEFAULT_PRIMARY_LABEL_NAME: &str = "Primary";
const DEFAULT_PRINTER_BACKEND: &str = "bartender";
const DEFAULT_BARTENDER_EXECUTABLE: &str = "bartend.exe";
const DEFAULT_PRINT_TIMEOUT_SECS: u64 = 60;

/// Printing application configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PrinterConfig {
    /// Printer backend: "bartender" or "dry-run"
    #[serde(default = "default_printer_backend")]
    #[validate(custom = "validate_printer_backend")]
    pub backend: String,

    /// Path to the BarTender executable
    #[serde(default = "default_bartender_executable")]
    #[validate(length(min = 1))]
    pub executable: String,

    /// Printer to use instead of the one saved in the template
    #[serde(default)]
    pub printer_name: Option<String>,

    /// Number of identical copies per print job
    #[serde(default = "default_copies")]
    #[validate(range(min = 1, max = 999))]
    pub copies: u32,

    /// Show the BarTender window while printing
    #[serde(default = "default_true_bool")]
    pub visible: bool,

    /// Close BarTender once the print job has been sent
    #[serde(default = "default_true_bool")]
    pub close_after_print: bool,

    /// Upper bound on a single print invocation, in seconds
    #[serde(default = "default_print_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            backend: default_printer_backend(),
            executable: default_bartender_executable(),
            printer_name: None,
            copies: default_copies(),
            visible: default_true_bool(),
            close_after_print: default_true_bool(),
            timeout_secs: default_print_timeout_secs(),
        }
    }
}

impl PrinterConfig {
    /// Print timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_dry_run(&self) -> bool {
        self.backend.eq_ignore_ascii_case("dry-run")
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Label database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Schema that holds the label tables, if any
    #[serde(default)]
    pub label_schema: Option<String>,

    /// URL used to reach a production line database.
    /// Example: "postgres://{user}:{password}@{server}/{database}"
    #[serde(default = "default_line_db_url_template")]
    #[validate(custom = "validate_line_db_url_template")]
    pub line_db_url_template: String,

    /// Token replaced by the serial number in stored display/label queries
    #[serde(default = "default_serial_token")]
    #[validate(length(min = 1))]
    pub serial_token: String,

    /// `LabelName` of the template printed when none is requested
    #[serde(default = "default_primary_label_name")]
    #[validate(length(min = 1))]
    pub primary_label_name: String,

    /// Printing application configuration
    #[serde(default)]
    #[validate]
    pub printer: PrinterConfig,
}

impl AppConfig {
    /// Creates a new configuration
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            label_schema: None,
            line_db_url_template: default_line_db_url_template(),
            serial_token: default_serial_token(),
            primary_label_name: default_primary_label_name(),
            printer: PrinterConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && self.printer.is_dry_run() {
            let mut err = ValidationError::new("dry_run_in_production");
            err.message = Some(
                "The dry-run printer backend must not be configured in production. Set APP__PRINTER__BACKEND=bartender."
                    .into(),
            );
            errors.add("printer", err);
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

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    4
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

fn default_line_db_url_template() -> String {
    DEFAULT_LINE_DB_URL_TEMPLATE.to_string()
}

fn default_serial_token() -> String {
    DEFAULT_SERIAL_TOKEN.to_string()
}

fn default_primary_label_name() -> String {
    DEFAULT_PRIMARY_LABEL_NAME.to_string()
}

fn default_printer_backend() -> String {
    DEFAULT_PRINTER_BACKEND.to_string()
}

fn default_bartender_executable() -> String {
    DEFAULT_BARTENDER_EXECUTABLE.to_string()
}

fn default_copies() -> u32 {
    1
}

fn default_print_timeout_secs() -> u64 {
    DEFAULT_PRINT_TIMEOUT_SECS
}

fn default_true_bool() -> bool {
    true
}

fn validate_printer_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "bartender" | "dry-run" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_printer_backend");
            err.message = Some("printer.backend must be 'bartender' or 'dry-run'".into());
            Err(err)
        }
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}

fn validate_line_db_url_template(template: &str) -> Result<(), ValidationError> {
    if !template.contains("{database}") {
        let mut err = ValidationError::new("missing_database_placeholder");
        err.message = Some("line_db_url_template must contain {database}".into());
        return Err(err);
    }
    if !template.contains("://") {
        let mut err = ValidationError::new("missing_url_scheme");
        err.message = Some("line_db_url_template must start with a URL scheme".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("label_printer={},label_cli={}", level, level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Loads application configuration from the working directory
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (`{dir}/default.toml`)
/// 3. Environment-specific config (`{dir}/{env}.toml`)
/// 4. Environment variables (APP__*)
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
        .set_default("database_url", DEFAULT_DATABASE_URL)?
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
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Environment variables are process-wide; serialize the tests touching them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn setup_test_config(content: &str, filename: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_DIR);
        std::fs::create_dir(&config_path).unwrap();

        let file_path = config_path.join(filename);
        let mut file = File::create(file_path).unwrap();
        writeln!(file, "{}", content).unwrap();
        temp_dir
    }

    #[test]
    fn test_load_config_success() {
        let _guard = ENV_LOCK.lock().unwrap();
        let default_content = r#"
            database_url = "sqlite://default.db"
            environment = "development"
            log_level = "debug"

            [printer]
            backend = "dry-run"
            copies = 2
        "#;

        let temp_dir = setup_test_config(default_content, "default.toml");

        env::set_var("APP__DATABASE_URL", "sqlite://override.db");
        env::set_var("RUN_ENV", "development");

        let config = load_config_from(&temp_dir.path().join(CONFIG_DIR)).unwrap();

        env::remove_var("APP__DATABASE_URL");
        env::remove_var("RUN_ENV");

        assert_eq!(config.database_url, "sqlite://override.db");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.printer.copies, 2);
        assert!(config.printer.is_dry_run());
        assert_eq!(config.serial_token, DEFAULT_SERIAL_TOKEN);
        assert_eq!(config.primary_label_name, DEFAULT_PRIMARY_LABEL_NAME);
    }

    #[test]
    fn test_environment_profile_overrides_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        let default_content = r#"
            database_url = "sqlite://default.db"
            line_db_url_template = "postgres://{user}:{password}@{server}/{database}"
        "#;
        let line_content = r#"
            line_db_url_template = "sqlite://{database}?mode=ro"
            label_schema = "labels"
        "#;

        let temp_dir = setup_test_config(default_content, "default.toml");
        let config_path = temp_dir.path().join(CONFIG_DIR);
        let mut profile = File::create(config_path.join("staging.toml")).unwrap();
        writeln!(profile, "{}", line_content).unwrap();

        env::set_var("RUN_ENV", "staging");
        let config = load_config_from(&config_path).unwrap();
        env::remove_var("RUN_ENV");

        assert_eq!(config.environment, "staging");
        assert_eq!(config.line_db_url_template, "sqlite://{database}?mode=ro");
        assert_eq!(config.label_schema.as_deref(), Some("labels"));
    }

    #[test]
    fn test_validation_failure() {
        let _guard = ENV_LOCK.lock().unwrap();
        let invalid_content = r#"
            database_url = "sqlite://default.db"
            log_level = "loud"
            line_db_url_template = "no-scheme"
        "#;

        let temp_dir = setup_test_config(invalid_content, "default.toml");
        env::set_var("RUN_ENV", "development");
        let result = load_config_from(&temp_dir.path().join(CONFIG_DIR));
        env::remove_var("RUN_ENV");

        assert!(matches!(result, Err(AppConfigError::Validation(_))));

        if let Err(AppConfigError::Validation(errors)) = result {
            assert!(errors.field_errors().contains_key("log_level"));
            assert!(errors.field_errors().contains_key("line_db_url_template"));
        }
    }
}
