use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, ScheduleError};
use crate::solver::SolverOptions;
use crate::weights::WeightConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub bind: String,
    /// Seconds a request may spend building and solving before it is abandoned.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub weighting: WeightConfig,
    pub solver: SolverOptions,
    pub server: ServerConfig,
}

impl SchedulerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SchedulerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.weighting.validate()?;
        if self.solver.threads == 0 {
            return Err(ScheduleError::config("solver threads must be at least 1"));
        }
        if let Some(limit) = self.solver.time_limit_secs {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ScheduleError::config(format!(
                    "solver time limit must be positive, got {limit}"
                )));
            }
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ScheduleError::config("request timeout must be at least 1 second"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::RequiredOverlap;
    use std::io::Write;

    #[test]
    fn empty_object_gives_defaults() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"weighting": {{"overlap": "sum"}}, "solver": {{"threads": 4}}}}"#
        )
        .unwrap();

        let config = SchedulerConfig::load(file.path()).unwrap();
        assert_eq!(config.weighting.overlap, RequiredOverlap::Sum);
        assert_eq!(config.solver.threads, 4);
        assert_eq!(config.solver.random_seed, 1234);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = SchedulerConfig::default();
        config.solver.threads = 0;
        assert!(matches!(config.validate(), Err(ScheduleError::Config(_))));

        let mut config = SchedulerConfig::default();
        config.solver.time_limit_secs = Some(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SchedulerConfig::load(Path::new("/nonexistent/scheduler.json")).unwrap_err();
        assert!(matches!(err, ScheduleError::Io(_)));
    }
}
