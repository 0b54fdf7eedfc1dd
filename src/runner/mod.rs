pub mod context;
pub mod events;
pub mod executor;
pub mod slot_search;
pub mod state;
pub mod step;

use std::time::Instant;

use crate::driver::traits::PlatformDriver;
use context::SessionContext;
use events::{EventEmitter, RunEvent};
use executor::StepExecutor;
use state::{SkippedStep, StepState};
use step::StepSpec;

pub use state::{Outcome, StepResult, StepStatus, Validation};

/// Final state of every step after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    pub states: Vec<(String, StepState)>,
    /// 1-based index of the blocking step that ended the run early
    pub halted_at: Option<u32>,
    pub duration_ms: u64,
}

impl WorkflowOutcome {
    fn count(&self, pred: impl Fn(&StepState) -> bool) -> usize {
        self.states.iter().filter(|(_, s)| pred(s)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|s| matches!(s, StepState::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, StepState::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, StepState::Skipped { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }
}

/// Runs steps strictly in order against one driver and one session context.
pub struct WorkflowRunner {
    suite: String,
    driver: Box<dyn PlatformDriver>,
    emitter: EventEmitter,
}

impl WorkflowRunner {
    pub fn new(suite: &str, driver: Box<dyn PlatformDriver>, emitter: EventEmitter) -> Self {
        Self {
            suite: suite.to_string(),
            driver,
            emitter,
        }
    }

    pub async fn run(&self, steps: &[StepSpec], ctx: &mut SessionContext) -> WorkflowOutcome {
        let started = Instant::now();
        let mut states: Vec<(String, StepState)> = steps
            .iter()
            .map(|s| (s.name.clone(), StepState::Pending))
            .collect();
        let mut halted_at = None;

        self.emitter.emit(RunEvent::RunStarted {
            suite: self.suite.clone(),
            session_id: ctx.session_id.clone(),
            step_count: steps.len(),
        });

        let executor = StepExecutor::new(self.driver.as_ref());

        for (i, step) in steps.iter().enumerate() {
            let index = i as u32 + 1;

            if let Some(blocker) = halted_at {
                let reason = format!("blocking step {} failed", blocker);
                self.emitter.emit(RunEvent::StepSkipped {
                    suite: self.suite.clone(),
                    index,
                    name: step.name.clone(),
                    reason: reason.clone(),
                });
                ctx.record_skip(SkippedStep {
                    step_index: index,
                    name: step.name.clone(),
                    reason: reason.clone(),
                });
                states[i].1 = StepState::Skipped { reason };
                continue;
            }

            states[i].1 = StepState::Running;
            self.emitter.emit(RunEvent::StepStarted {
                suite: self.suite.clone(),
                index,
                name: step.name.clone(),
                target: step.target.clone(),
            });

            let result = executor.execute(index, step, ctx).await;

            if result.passed() {
                self.emitter.emit(RunEvent::StepPassed {
                    suite: self.suite.clone(),
                    index,
                    duration_ms: result.duration_ms,
                });
                states[i].1 = StepState::Passed;
            } else {
                let error = result
                    .error
                    .clone()
                    .or_else(|| result.first_failure())
                    .unwrap_or_else(|| "step failed".to_string());
                self.emitter.emit(RunEvent::StepFailed {
                    suite: self.suite.clone(),
                    index,
                    error: error.clone(),
                    duration_ms: result.duration_ms,
                });
                states[i].1 = StepState::Failed { error };
                if step.is_blocking() {
                    halted_at = Some(index);
                }
            }

            ctx.record(result);
        }

        let outcome = WorkflowOutcome {
            states,
            halted_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        self.emitter.emit(RunEvent::RunFinished {
            suite: self.suite.clone(),
            passed: outcome.passed(),
            failed: outcome.failed(),
            skipped: outcome.skipped(),
            duration_ms: outcome.duration_ms,
        });

        outcome
    }
}
