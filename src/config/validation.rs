//! Configuration validation

use thiserror::Error;

use super::{AnalysisConfig, CacheConfig, Config, HttpConfig, PolicyThresholds, ProvidersConfig};

/// A configuration value that cannot be scheduled against.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Validation hook implemented by each configuration section.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.cache.validate()?;
        self.http.validate()?;
        self.providers.validate()?;
        self.analysis.validate()?;
        self.policy.validate()?;
        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_entries_per_source == 0 {
            return Err(ValidationError::new("cache.max_entries_per_source must be > 0"));
        }
        if self.ttl_seconds == 0 {
            return Err(ValidationError::new("cache.ttl_seconds must be > 0"));
        }
        Ok(())
    }
}

impl Validate for HttpConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_seconds == 0 {
            return Err(ValidationError::new("http.timeout_seconds must be > 0"));
        }
        if self.backoff_initial_ms == 0 {
            return Err(ValidationError::new("http.backoff_initial_ms must be > 0"));
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(ValidationError::new(
                "http.backoff_max_ms must be >= http.backoff_initial_ms",
            ));
        }
        Ok(())
    }
}

impl Validate for ProvidersConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.osv.batch_size == 0 {
            return Err(ValidationError::new("providers.osv.batch_size must be > 0"));
        }
        if self.osv.max_concurrency == 0 {
            return Err(ValidationError::new("providers.osv.max_concurrency must be > 0"));
        }
        if self.github.max_concurrency == 0 {
            return Err(ValidationError::new(
                "providers.github.max_concurrency must be > 0",
            ));
        }
        Ok(())
    }
}

impl Validate for AnalysisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.global_concurrency == 0 {
            return Err(ValidationError::new("analysis.global_concurrency must be > 0"));
        }
        if self.registry_concurrency == 0 {
            return Err(ValidationError::new("analysis.registry_concurrency must be > 0"));
        }
        Ok(())
    }
}

impl Validate for PolicyThresholds {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.abandonment_threshold_days <= 0 {
            return Err(ValidationError::new(
                "policy.abandonment_threshold_days must be > 0",
            ));
        }
        if self.churn_medium_threshold > self.churn_high_threshold {
            return Err(ValidationError::new(
                "policy.churn_medium_threshold must not exceed churn_high_threshold",
            ));
        }
        if self.bus_factor_zero_threshold > self.bus_factor_one_threshold {
            return Err(ValidationError::new(
                "policy.bus_factor_zero_threshold must not exceed bus_factor_one_threshold",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_churn_thresholds() {
        let thresholds = PolicyThresholds {
            churn_medium_threshold: 15,
            churn_high_threshold: 10,
            ..PolicyThresholds::default()
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let analysis = AnalysisConfig {
            global_concurrency: 0,
            ..AnalysisConfig::default()
        };
        assert!(analysis.validate().is_err());
    }
}
