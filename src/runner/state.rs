use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Expected or observed outcome of a step's action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Outcome {
    /// Exact HTTP status code.
    Status(u16),
    /// Any of the listed status codes.
    AnyStatus(Vec<u16>),
    /// UI interaction sequence result.
    Success(bool),
    /// No action was attempted.
    NotAttempted,
}

impl Outcome {
    pub fn accepts_status(&self, code: u16) -> bool {
        match self {
            Outcome::Status(expected) => *expected == code,
            Outcome::AnyStatus(codes) => codes.contains(&code),
            _ => false,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Status(code) => write!(f, "{}", code),
            Outcome::AnyStatus(codes) => {
                let joined: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
                f.write_str(&joined.join("/"))
            }
            Outcome::Success(true) => f.write_str("success"),
            Outcome::Success(false) => f.write_str("failure"),
            Outcome::NotAttempted => f.write_str("not attempted"),
        }
    }
}

/// One check run against an action's outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub check: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Validation {
    pub fn pass(check: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: true,
            detail: None,
        }
    }

    pub fn fail(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }

    pub fn from_bool(check: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Passed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Passed => "PASSED",
            StepStatus::Failed => "FAILED",
        }
    }
}

/// Lifecycle of a step inside the workflow runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

/// Immutable record of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_index: u32,
    pub name: String,
    pub target_description: String,
    pub expected_outcome: Outcome,
    pub actual_outcome: Outcome,
    pub validations: Vec<Validation>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_snapshot: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_snapshot: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }

    /// Detail of the first failed validation, if any.
    pub fn first_failure(&self) -> Option<String> {
        self.validations.iter().find(|v| !v.passed).map(|v| {
            v.detail
                .as_ref()
                .map(|d| format!("{}: {}", v.check, d))
                .unwrap_or_else(|| v.check.clone())
        })
    }
}

/// Mutable builder for a `StepResult` while its step is running.
/// `finish` consumes it, so a result is produced exactly once.
#[derive(Debug)]
pub struct StepRecorder {
    step_index: u32,
    name: String,
    target_description: String,
    expected_outcome: Outcome,
    actual_outcome: Outcome,
    validations: Vec<Validation>,
    error: Option<String>,
    input_snapshot: Option<BTreeMap<String, String>>,
    extracted_snapshot: Option<BTreeMap<String, String>>,
    started_at: Instant,
}

impl StepRecorder {
    pub fn start(step_index: u32, name: &str, target: &str, expected: Outcome) -> Self {
        Self {
            step_index,
            name: name.to_string(),
            target_description: target.to_string(),
            expected_outcome: expected,
            actual_outcome: Outcome::NotAttempted,
            validations: Vec::new(),
            error: None,
            input_snapshot: None,
            extracted_snapshot: None,
            started_at: Instant::now(),
        }
    }

    pub fn actual(&mut self, outcome: Outcome) {
        self.actual_outcome = outcome;
    }

    pub fn validation(&mut self, validation: Validation) {
        self.validations.push(validation);
    }

    pub fn error(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    pub fn input(&mut self, snapshot: BTreeMap<String, String>) {
        if !snapshot.is_empty() {
            self.input_snapshot = Some(snapshot);
        }
    }

    pub fn extracted(&mut self, snapshot: BTreeMap<String, String>) {
        if !snapshot.is_empty() {
            self.extracted_snapshot
                .get_or_insert_with(BTreeMap::new)
                .extend(snapshot);
        }
    }

    pub fn all_passed(&self) -> bool {
        self.validations.iter().all(|v| v.passed)
    }

    pub fn finish(self) -> StepResult {
        let status = if self.all_passed() {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        };

        StepResult {
            step_index: self.step_index,
            name: self.name,
            target_description: self.target_description,
            expected_outcome: self.expected_outcome,
            actual_outcome: self.actual_outcome,
            validations: self.validations,
            status,
            error: self.error,
            input_snapshot: self.input_snapshot,
            extracted_snapshot: self.extracted_snapshot,
            duration_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// A step the runner never started because an earlier blocking step failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedStep {
    pub step_index: u32,
    pub name: String,
    pub reason: String,
}
