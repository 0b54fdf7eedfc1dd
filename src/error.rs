use thiserror::Error;

use crate::runner::context::ContextField;

/// Every way a single step can fail. None of these escape the step executor:
/// they are folded into a failed `StepResult`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    #[error("step '{step}' requires {field} but it is not set")]
    PreconditionUnmet { step: String, field: ContextField },

    #[error("{check} failed{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    ValidationFailed {
        check: String,
        detail: Option<String>,
    },

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("no available slot found after {attempts} attempts")]
    NoSlotAvailable { attempts: u32 },

    #[error("expected field '{field}' missing from response")]
    ExtractionFailed { field: String },
}

impl StepError {
    /// Label used for the validation entry that records this error.
    pub fn check_label(&self) -> &'static str {
        match self {
            StepError::PreconditionUnmet { .. } => "Preconditions Met",
            StepError::ValidationFailed { .. } => "Validation",
            StepError::ActionFailed(_) => "Action Completed",
            StepError::NoSlotAvailable { .. } => "Slot Available",
            StepError::ExtractionFailed { .. } => "Data Extracted",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
