use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

/// Kernel tuning, typically parsed from TOML and overridden by `COOPOS_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Cpu units that must remain in the cycle before another unit of work
    /// is started.
    #[serde(default = "default_cpu_safety_margin")]
    pub cpu_safety_margin: f64,
    /// Consecutive failed steps after which a thread is reaped. 0 = never.
    #[serde(default = "default_max_thread_faults")]
    pub max_thread_faults: u32,
    /// Hop distance at which an influence seed's contribution reaches zero.
    #[serde(default = "default_influence_max_dist")]
    pub influence_max_dist: u32,
    /// Decimal places kept in accumulated influence values.
    #[serde(default = "default_influence_precision")]
    pub influence_precision: u32,
    /// Decimal places used by read-only influence reports.
    #[serde(default = "default_report_precision")]
    pub report_precision: u32,
    /// Actor method invoked by legacy threads when none is configured.
    #[serde(default = "default_method")]
    pub default_method: String,
}

fn default_cpu_safety_margin() -> f64 { 0.0 }
fn default_max_thread_faults() -> u32 { 3 }
fn default_influence_max_dist() -> u32 { 15 }
fn default_influence_precision() -> u32 { 5 }
fn default_report_precision() -> u32 { 3 }
fn default_method() -> String { "run".to_string() }

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            cpu_safety_margin: default_cpu_safety_margin(),
            max_thread_faults: default_max_thread_faults(),
            influence_max_dist: default_influence_max_dist(),
            influence_precision: default_influence_precision(),
            report_precision: default_report_precision(),
            default_method: default_method(),
        }
    }
}

impl KernelConfig {
    /// Parse config from a TOML string, then apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, KernelError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KernelError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from defaults plus environment (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, KernelError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parsed::<f64>("COOPOS_CPU_SAFETY_MARGIN") {
            self.cpu_safety_margin = v;
        }
        if let Some(v) = env_parsed::<u32>("COOPOS_MAX_THREAD_FAULTS") {
            self.max_thread_faults = v;
        }
        if let Some(v) = env_parsed::<u32>("COOPOS_INFLUENCE_MAX_DIST") {
            self.influence_max_dist = v;
        }
        if let Some(v) = env_parsed::<u32>("COOPOS_INFLUENCE_PRECISION") {
            self.influence_precision = v;
        }
        if let Some(v) = env_parsed::<u32>("COOPOS_REPORT_PRECISION") {
            self.report_precision = v;
        }
        if let Some(v) = env_opt("COOPOS_DEFAULT_METHOD") {
            self.default_method = v;
        }
    }

    /// Validate the config, rejecting values the kernel cannot honor.
    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.cpu_safety_margin.is_finite() || self.cpu_safety_margin < 0.0 {
            return Err(KernelError::Config(format!(
                "cpu_safety_margin must be a non-negative number, got {}",
                self.cpu_safety_margin
            )));
        }
        if self.influence_max_dist == 0 {
            return Err(KernelError::Config(
                "influence_max_dist must be at least 1".to_string(),
            ));
        }
        // f64 carries ~15 significant digits; more decimals are noise.
        if self.influence_precision > 12 || self.report_precision > 12 {
            return Err(KernelError::Config(format!(
                "precision must be at most 12 decimals, got {}/{}",
                self.influence_precision, self.report_precision
            )));
        }
        if self.default_method.is_empty() {
            return Err(KernelError::Config("default_method must not be empty".to_string()));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Kernel config loaded:");
        tracing::info!("  cpu:        safety_margin={}", self.cpu_safety_margin);
        tracing::info!("  threads:    max_faults={}", self.max_thread_faults);
        tracing::info!(
            "  influence:  max_dist={}, precision={}, report_precision={}",
            self.influence_max_dist,
            self.influence_precision,
            self.report_precision
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.cpu_safety_margin, 0.0);
        assert_eq!(config.max_thread_faults, 3);
        assert_eq!(config.influence_max_dist, 15);
        assert_eq!(config.influence_precision, 5);
        assert_eq!(config.report_precision, 3);
        assert_eq!(config.default_method, "run");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: KernelConfig = toml::from_str("cpu_safety_margin = 2.5\n").unwrap();
        assert_eq!(config.cpu_safety_margin, 2.5);
        assert_eq!(config.influence_max_dist, 15);
    }

    #[test]
    fn validate_rejects_zero_horizon() {
        let config = KernelConfig {
            influence_max_dist: 0,
            ..KernelConfig::default()
        };
        assert!(matches!(config.validate(), Err(KernelError::Config(_))));
    }

    #[test]
    fn validate_rejects_negative_margin() {
        let config = KernelConfig {
            cpu_safety_margin: -1.0,
            ..KernelConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = KernelConfig::from_toml("cpu_safety_margin = \"lots\"").unwrap_err();
        assert!(matches!(err, KernelError::ConfigParse(_)));
    }
}
