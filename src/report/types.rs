use crate::runner::state::{SkippedStep, StepResult, StepStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Percentage of recorded steps that passed, or "n/a" for an empty run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SuccessRateRepr", try_from = "SuccessRateRepr")]
pub enum SuccessRate {
    Percent(u32),
    NotApplicable,
}

pub const NOT_APPLICABLE: &str = "n/a";

impl SuccessRate {
    /// Rounded to the nearest integer, except that a mixed run never shows
    /// 0 or 100.
    pub fn compute(passed: usize, total: usize) -> Self {
        if total == 0 {
            return SuccessRate::NotApplicable;
        }
        let rounded = (100.0 * passed as f64 / total as f64).round() as u32;
        let percent = if passed == total {
            100
        } else if passed == 0 {
            0
        } else {
            rounded.clamp(1, 99)
        };
        SuccessRate::Percent(percent)
    }

    pub fn is_perfect(&self) -> bool {
        matches!(self, SuccessRate::Percent(100))
    }

    /// Width for progress bars; 0 for an empty run.
    pub fn bar_width(&self) -> u32 {
        match self {
            SuccessRate::Percent(p) => *p,
            SuccessRate::NotApplicable => 0,
        }
    }
}

impl fmt::Display for SuccessRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessRate::Percent(p) => write!(f, "{}%", p),
            SuccessRate::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SuccessRateRepr {
    Percent(u32),
    Label(String),
}

impl From<SuccessRate> for SuccessRateRepr {
    fn from(rate: SuccessRate) -> Self {
        match rate {
            SuccessRate::Percent(p) => SuccessRateRepr::Percent(p),
            SuccessRate::NotApplicable => SuccessRateRepr::Label(NOT_APPLICABLE.to_string()),
        }
    }
}

impl TryFrom<SuccessRateRepr> for SuccessRate {
    type Error = String;

    fn try_from(repr: SuccessRateRepr) -> Result<Self, Self::Error> {
        match repr {
            SuccessRateRepr::Percent(p) if p <= 100 => Ok(SuccessRate::Percent(p)),
            SuccessRateRepr::Percent(p) => Err(format!("success rate {} out of range", p)),
            SuccessRateRepr::Label(l) if l == NOT_APPLICABLE => Ok(SuccessRate::NotApplicable),
            SuccessRateRepr::Label(l) => Err(format!("unknown success rate '{}'", l)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub success_rate: SuccessRate,
}

impl ReportSummary {
    pub fn from_results(results: &[StepResult], skipped: &[SkippedStep]) -> Self {
        let passed = results
            .iter()
            .filter(|r| r.status == StepStatus::Passed)
            .count();
        let total = results.len();
        Self {
            total_tests: total,
            passed_tests: passed,
            failed_tests: total - passed,
            skipped_tests: skipped.len(),
            success_rate: SuccessRate::compute(passed, total),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total_tests > 0 && self.failed_tests == 0 && self.skipped_tests == 0
    }
}

/// Environment a run was executed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    pub session_id: String,
    pub suite: String,
    pub execution_date: String,
    pub base_url: String,
    pub tenant: String,
}

/// Machine-readable run report. Everything the HTML and JUnit renderers
/// show is derived from this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredReport {
    pub session_id: String,
    pub suite: String,
    pub execution_date: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub tenant: String,
    pub summary: ReportSummary,
    pub skipped: Vec<SkippedStep>,
    pub results: Vec<StepResult>,
}
