//! Panel configuration parsing and startup validation.
//!
//! The daemon is configured from a single TOML file. Secrets are never
//! stored inline: the service-account section names an environment variable
//! holding the password, and startup validation fails closed when the
//! scheduler is enabled without usable credentials.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum scheduler cycle interval.
pub const MIN_CYCLE_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum scheduler cycle interval.
pub const MAX_CYCLE_INTERVAL: Duration = Duration::from_secs(3600);

/// Top-level panel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PanelConfig {
    /// Upstream election API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Service-account credentials for the gate and the scheduler.
    ///
    /// Required whenever the scheduler is enabled; without it the daemon
    /// has no identity of its own and refuses to start the worker rather
    /// than silently skipping report generation.
    #[serde(default)]
    pub service_account: Option<ServiceAccountConfig>,

    /// Sealed-election gate settings.
    #[serde(default)]
    pub gate: GateConfig,

    /// Report scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Panel HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl PanelConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Validate startup prerequisites.
    ///
    /// The scheduler mutates election state under a service identity; if it
    /// is enabled the service account must be configured and its password
    /// environment variable must resolve. Interval bounds are checked here
    /// too so a typoed `cycle_interval_secs = 0` fails at startup instead
    /// of spinning the worker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violated
    /// prerequisite.
    pub fn validate_startup_prerequisites(&self) -> Result<(), ConfigError> {
        let cycle = Duration::from_secs(self.scheduler.cycle_interval_secs);
        if cycle < MIN_CYCLE_INTERVAL || cycle > MAX_CYCLE_INTERVAL {
            return Err(ConfigError::Validation(format!(
                "scheduler.cycle_interval_secs out of range: {}s (allowed {}..={}s)",
                self.scheduler.cycle_interval_secs,
                MIN_CYCLE_INTERVAL.as_secs(),
                MAX_CYCLE_INTERVAL.as_secs(),
            )));
        }

        if self.scheduler.zero_report_lead_min_secs > self.scheduler.zero_report_lead_max_secs {
            return Err(ConfigError::Validation(
                "scheduler zero-report window is inverted (lead min > lead max)".to_string(),
            ));
        }
        if self.scheduler.final_report_lag_min_secs > self.scheduler.final_report_lag_max_secs {
            return Err(ConfigError::Validation(
                "scheduler final-report window is inverted (lag min > lag max)".to_string(),
            ));
        }

        let Some(account) = &self.service_account else {
            if self.scheduler.enabled {
                return Err(ConfigError::Validation(
                    "scheduler.enabled = true but no [service_account] configured. \
                     The report scheduler requires machine credentials. \
                     Either configure a service account or disable the scheduler."
                        .to_string(),
                ));
            }
            return Ok(());
        };

        if account.email.is_empty() {
            return Err(ConfigError::Validation(
                "service_account.email is empty".to_string(),
            ));
        }
        if std::env::var(&account.password_env).is_err() {
            return Err(ConfigError::Validation(format!(
                "service_account.password_env names '{}' but that environment \
                 variable is not set",
                account.password_env,
            )));
        }
        Ok(())
    }
}

/// Upstream election API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the election API (e.g. `http://localhost:5110`).
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    ///
    /// Every outbound call is bounded so a hung upstream cannot wedge a
    /// request handler or stall the scheduler past one cycle.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Page size used for bounded election listings.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            page_limit: default_page_limit(),
        }
    }
}

/// Service-account credentials used by the gate and the scheduler.
///
/// The password is referenced by environment-variable name; the config file
/// itself never carries it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountConfig {
    /// Admin login email for the machine identity.
    pub email: String,

    /// Name of the environment variable holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

/// Sealed-election gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Seconds the cached sealed-state snapshot stays valid.
    #[serde(default = "default_gate_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_gate_ttl(),
        }
    }
}

/// Report scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Whether the background report worker runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between scheduler cycles.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Seconds between the zero-report and final-report passes of one
    /// cycle, to avoid bursting the upstream API.
    #[serde(default = "default_pipeline_gap")]
    pub pipeline_gap_secs: u64,

    /// Zero-report eligibility: minimum seconds before election start.
    #[serde(default = "default_zero_lead_min")]
    pub zero_report_lead_min_secs: i64,

    /// Zero-report eligibility: maximum seconds before election start.
    #[serde(default = "default_zero_lead_max")]
    pub zero_report_lead_max_secs: i64,

    /// Final-report eligibility: minimum seconds after election end.
    #[serde(default = "default_final_lag_min")]
    pub final_report_lag_min_secs: i64,

    /// Final-report eligibility: maximum seconds after election end.
    #[serde(default = "default_final_lag_max")]
    pub final_report_lag_max_secs: i64,

    /// Optional path to the processed-marker database.
    ///
    /// When set, each `(election, phase)` pipeline records a durable marker
    /// after a fully successful run and is never re-executed, closing the
    /// double-generation window the time heuristic leaves open. When unset
    /// the window heuristic stands alone.
    #[serde(default)]
    pub marker_db: Option<PathBuf>,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle_interval_secs: default_cycle_interval(),
            pipeline_gap_secs: default_pipeline_gap(),
            zero_report_lead_min_secs: default_zero_lead_min(),
            zero_report_lead_max_secs: default_zero_lead_max(),
            final_report_lag_min_secs: default_final_lag_min(),
            final_report_lag_max_secs: default_final_lag_max(),
            marker_db: None,
        }
    }
}

/// Panel HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the panel listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:5110".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_page_limit() -> u32 {
    1000
}

fn default_password_env() -> String {
    "URNA_SERVICE_PASSWORD".to_string()
}

const fn default_gate_ttl() -> u64 {
    60
}

const fn default_true() -> bool {
    true
}

const fn default_cycle_interval() -> u64 {
    60
}

const fn default_pipeline_gap() -> u64 {
    5
}

const fn default_zero_lead_min() -> i64 {
    30
}

const fn default_zero_lead_max() -> i64 {
    90
}

const fn default_final_lag_min() -> i64 {
    60
}

const fn default_final_lag_max() -> i64 {
    180
}

fn default_bind() -> String {
    "127.0.0.1:5115".to_string()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = PanelConfig::from_toml("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5110");
        assert_eq!(config.api.page_limit, 1000);
        assert_eq!(config.gate.cache_ttl_secs, 60);
        assert_eq!(config.scheduler.cycle_interval_secs, 60);
        assert_eq!(config.scheduler.pipeline_gap_secs, 5);
        assert_eq!(config.scheduler.zero_report_lead_min_secs, 30);
        assert_eq!(config.scheduler.zero_report_lead_max_secs, 90);
        assert_eq!(config.scheduler.final_report_lag_min_secs, 60);
        assert_eq!(config.scheduler.final_report_lag_max_secs, 180);
        assert!(config.scheduler.enabled);
        assert!(config.service_account.is_none());
        assert_eq!(config.server.bind, "127.0.0.1:5115");
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [api]
            base_url = "http://elections.internal:5110"
            request_timeout_secs = 10
            page_limit = 500

            [service_account]
            email = "svc-reports@example.com"
            password_env = "TEST_SVC_PASSWORD"

            [gate]
            cache_ttl_secs = 30

            [scheduler]
            enabled = true
            cycle_interval_secs = 120
            marker_db = "/var/lib/urna/markers.db"

            [server]
            bind = "0.0.0.0:8080"
        "#;

        let config = PanelConfig::from_toml(toml).unwrap();
        assert_eq!(config.api.base_url, "http://elections.internal:5110");
        assert_eq!(config.api.request_timeout_secs, 10);
        assert_eq!(config.gate.cache_ttl_secs, 30);
        assert_eq!(config.scheduler.cycle_interval_secs, 120);
        assert_eq!(
            config.scheduler.marker_db.as_deref(),
            Some(std::path::Path::new("/var/lib/urna/markers.db"))
        );
        let account = config.service_account.as_ref().unwrap();
        assert_eq!(account.email, "svc-reports@example.com");
        assert_eq!(account.password_env, "TEST_SVC_PASSWORD");
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn scheduler_enabled_requires_service_account() {
        let config = PanelConfig::from_toml("[scheduler]\nenabled = true\n").unwrap();
        let err = config.validate_startup_prerequisites().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("service_account"));
    }

    #[test]
    fn scheduler_disabled_needs_no_service_account() {
        let config = PanelConfig::from_toml("[scheduler]\nenabled = false\n").unwrap();
        assert!(config.validate_startup_prerequisites().is_ok());
    }

    #[test]
    fn cycle_interval_out_of_range_rejected() {
        let config =
            PanelConfig::from_toml("[scheduler]\nenabled = false\ncycle_interval_secs = 0\n")
                .unwrap();
        let err = config.validate_startup_prerequisites().unwrap_err();
        assert!(err.to_string().contains("cycle_interval_secs"));

        let config =
            PanelConfig::from_toml("[scheduler]\nenabled = false\ncycle_interval_secs = 7200\n")
                .unwrap();
        assert!(config.validate_startup_prerequisites().is_err());
    }

    #[test]
    fn inverted_window_rejected() {
        let toml = r"
            [scheduler]
            enabled = false
            zero_report_lead_min_secs = 120
            zero_report_lead_max_secs = 90
        ";
        let config = PanelConfig::from_toml(toml).unwrap();
        let err = config.validate_startup_prerequisites().unwrap_err();
        assert!(err.to_string().contains("zero-report window"));
    }

    #[test]
    fn missing_password_env_rejected() {
        let toml = r#"
            [service_account]
            email = "svc@example.com"
            password_env = "URNA_TEST_DEFINITELY_UNSET_VAR"

            [scheduler]
            enabled = true
        "#;
        let config = PanelConfig::from_toml(toml).unwrap();
        let err = config.validate_startup_prerequisites().unwrap_err();
        assert!(err.to_string().contains("URNA_TEST_DEFINITELY_UNSET_VAR"));
    }
}
