pub mod driver;
pub mod error;
pub mod fixtures;
pub mod report;
pub mod runner;
pub mod suite;
pub mod utils;

// Re-export common items
pub use error::{ConfigError, StepError};
pub use report::generate_report;
pub use runner::{Outcome, StepResult, StepStatus, WorkflowOutcome, WorkflowRunner};
pub use suite::{run_suites, Suite, SuiteRun};
pub use utils::RunConfig;
