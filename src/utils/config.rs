use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::runner::slot_search::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Timeouts {
    /// Per HTTP request (ms)
    pub request_ms: u64,
    /// Default wait for UI elements (ms)
    pub element_ms: u64,
    /// Pause after clicking a calendar date before reading its slots (ms)
    pub slot_settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_ms: 30000,
            element_ms: 10000,
            slot_settle_ms: 2000,
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RunConfig {
    /// API base URL, e.g. https://stage-api.ecarehealth.com
    pub base_url: String,
    /// Provider portal URL for the UI suite
    pub app_url: String,
    /// Value of the X-TENANT-ID header
    pub tenant: String,
    pub credentials: Credentials,
    pub timeouts: Timeouts,
    /// Days scanned by the slot search before giving up
    pub max_slot_attempts: u32,
    pub output_dir: PathBuf,
    pub headless: bool,
    /// Domain for generated patient emails
    pub email_domain: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            app_url: String::new(),
            tenant: String::new(),
            credentials: Credentials::default(),
            timeouts: Timeouts::default(),
            max_slot_attempts: DEFAULT_MAX_ATTEMPTS,
            output_dir: PathBuf::from("./output"),
            headless: false,
            email_domain: "thinkitive.com".to_string(),
        }
    }
}

impl RunConfig {
    /// Defaults, then the YAML file (if any), then `ECARE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn apply_env<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("ECARE_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("ECARE_APP_URL") {
            self.app_url = v;
        }
        if let Some(v) = get("ECARE_TENANT") {
            self.tenant = v;
        }
        if let Some(v) = get("ECARE_USERNAME") {
            self.credentials.username = v;
        }
        if let Some(v) = get("ECARE_PASSWORD") {
            self.credentials.password = v;
        }
        if let Some(v) = get("ECARE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ECARE_HEADLESS") {
            self.headless = v == "true" || v == "1";
        }
        if let Some(v) = get("ECARE_MAX_SLOT_ATTEMPTS") {
            self.max_slot_attempts = v.parse().map_err(|_| ConfigError::Invalid {
                field: "maxSlotAttempts",
                reason: format!("'{}' is not a positive integer", v),
            })?;
        }
        Ok(())
    }

    /// Check the values the API suite needs.
    pub fn validate_api(&self) -> Result<(), ConfigError> {
        self.validate_common()?;
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("baseUrl"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "baseUrl",
                reason: format!("'{}' is not an http(s) URL", self.base_url),
            });
        }
        if self.tenant.trim().is_empty() {
            return Err(ConfigError::Missing("tenant"));
        }
        Ok(())
    }

    /// Check the values the UI suite needs.
    pub fn validate_ui(&self) -> Result<(), ConfigError> {
        self.validate_common()?;
        if self.app_url.trim().is_empty() {
            return Err(ConfigError::Missing("appUrl"));
        }
        Ok(())
    }

    fn validate_common(&self) -> Result<(), ConfigError> {
        if self.credentials.username.is_empty() {
            return Err(ConfigError::Missing("credentials.username"));
        }
        if self.credentials.password.is_empty() {
            return Err(ConfigError::Missing("credentials.password"));
        }
        if self.max_slot_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "maxSlotAttempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const YAML: &str = r#"
baseUrl: https://stage-api.example.com
appUrl: https://portal.example.com
tenant: stage_tenant
credentials:
  username: rose@example.com
  password: secret
timeouts:
  requestMs: 5000
maxSlotAttempts: 10
"#;

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = RunConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.tenant, "stage_tenant");
        assert_eq!(config.timeouts.request_ms, 5000);
        // Unset keys keep their defaults
        assert_eq!(config.timeouts.slot_settle_ms, 2000);
        assert_eq!(config.max_slot_attempts, 10);
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert!(config.validate_api().is_ok());
        assert!(config.validate_ui().is_ok());
    }

    #[test]
    fn test_env_wins_over_file() {
        let mut config = RunConfig::from_yaml(YAML).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("ECARE_TENANT", "other"),
            ("ECARE_HEADLESS", "1"),
            ("ECARE_MAX_SLOT_ATTEMPTS", "5"),
        ]);
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.tenant, "other");
        assert!(config.headless);
        assert_eq!(config.max_slot_attempts, 5);
    }

    #[test]
    fn test_bad_env_number_is_rejected() {
        let mut config = RunConfig::default();
        let err = config
            .apply_env(|k| (k == "ECARE_MAX_SLOT_ATTEMPTS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "maxSlotAttempts", .. }));
    }

    #[test]
    fn test_missing_values_are_reported() {
        let config = RunConfig::default();
        assert!(matches!(
            config.validate_api(),
            Err(ConfigError::Missing("credentials.username"))
        ));

        let mut config = RunConfig::from_yaml(YAML).unwrap();
        config.tenant.clear();
        assert!(matches!(config.validate_api(), Err(ConfigError::Missing("tenant"))));

        config.base_url = "ftp://nope".into();
        assert!(matches!(
            config.validate_api(),
            Err(ConfigError::Invalid { field: "baseUrl", .. })
        ));
    }
}
