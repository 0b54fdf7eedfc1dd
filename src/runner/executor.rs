use log::{debug, warn};

use super::context::SessionContext;
use super::state::{Outcome, StepRecorder, StepResult, Validation};
use super::step::StepSpec;
use crate::driver::traits::{PlatformDriver, RawOutcome};
use crate::error::StepError;

/// Runs one step: precondition check, exactly one action, every validator,
/// then extraction into the session context.
///
/// Never returns an error. Anything that goes wrong ends up as a failed
/// validation in the returned `StepResult`.
pub struct StepExecutor<'a> {
    driver: &'a dyn PlatformDriver,
}

impl<'a> StepExecutor<'a> {
    pub fn new(driver: &'a dyn PlatformDriver) -> Self {
        Self { driver }
    }

    pub async fn execute(
        &self,
        step_index: u32,
        step: &StepSpec,
        ctx: &mut SessionContext,
    ) -> StepResult {
        let mut rec = StepRecorder::start(step_index, &step.name, &step.target, step.expected.clone());

        if let Some(field) = ctx.first_missing(&step.preconditions) {
            let err = StepError::PreconditionUnmet {
                step: step.name.clone(),
                field,
            };
            warn!("{}", err);
            record_error(&mut rec, &err);
            return rec.finish();
        }

        rec.input(step.input_snapshot(ctx));
        let request = step.build_request(ctx);
        debug!(
            "[{}] step {} -> {}",
            self.driver.platform_name(),
            step_index,
            request.describe()
        );

        let raw = match self.driver.perform(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                let err = match e.downcast_ref::<StepError>() {
                    Some(step_err) => step_err.clone(),
                    None => StepError::ActionFailed(format!("{:#}", e)),
                };
                warn!("Step {} '{}' failed: {}", step_index, step.name, err);
                rec.actual(Outcome::Success(false));
                record_error(&mut rec, &err);
                self.capture(step_index, step).await;
                return rec.finish();
            }
        };

        rec.actual(actual_outcome(&raw));
        let mut validations = step.run_validators(&raw, ctx);
        if validations.is_empty() {
            validations.push(Validation::pass("Action Completed"));
        }
        let failure = first_failure(&validations);
        for validation in validations {
            rec.validation(validation);
        }

        match failure {
            Some(failure) => rec.error(failure),
            None => match step.run_extractor(&raw, ctx) {
                Some(Ok(update)) => {
                    ctx.apply(&update);
                    rec.validation(Validation::pass("Data Extracted"));
                    rec.extracted(update.snapshot);
                }
                Some(Err(err)) => {
                    warn!("Step {} '{}': {}", step_index, step.name, err);
                    record_error(&mut rec, &err);
                }
                None => {}
            },
        }

        let result = rec.finish();
        if !result.passed() {
            self.capture(step_index, step).await;
        }
        result
    }

    async fn capture(&self, step_index: u32, step: &StepSpec) {
        let label = format!("step{}_{}", step_index, step.name.replace(' ', "_"));
        match self.driver.capture_failure(&label).await {
            Ok(Some(path)) => debug!("Saved failure capture to {}", path),
            Ok(None) => {}
            Err(e) => debug!("Failure capture unavailable: {:#}", e),
        }
    }
}

fn actual_outcome(raw: &RawOutcome) -> Outcome {
    match raw.status_code {
        Some(code) => Outcome::Status(code),
        None => Outcome::Success(raw.success),
    }
}

fn record_error(rec: &mut StepRecorder, err: &StepError) {
    let detail = match err {
        StepError::ValidationFailed {
            detail: Some(detail),
            ..
        } => detail.clone(),
        other => other.to_string(),
    };
    rec.validation(Validation::fail(err.check_label(), detail));
    rec.error(err.to_string());
}

fn first_failure(validations: &[Validation]) -> Option<String> {
    validations.iter().find(|v| !v.passed).map(|v| {
        StepError::ValidationFailed {
            check: v.check.clone(),
            detail: v.detail.clone(),
        }
        .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{sample_context, MockDriver};
    use crate::driver::traits::{ActionRequest, ApiRequest};
    use crate::runner::context::{ContextField, ContextUpdate};
    use crate::runner::state::StepStatus;
    use crate::runner::step::checks;
    use serde_json::json;

    fn token_step() -> StepSpec {
        StepSpec::new("Provider Login", "POST /login", |_| {
            ActionRequest::Api(ApiRequest::new("POST", "/login"))
        })
        .expect(Outcome::Status(200))
        .validate(checks::status(Outcome::Status(200)))
        .extract(|raw, _| {
            let token = raw
                .str_field("data.access_token")
                .ok_or_else(|| StepError::ExtractionFailed {
                    field: "data.access_token".into(),
                })?;
            Ok(ContextUpdate::new()
                .set(ContextField::AccessToken, token)
                .note("tokenLength", token.len()))
        })
    }

    #[tokio::test]
    async fn test_unmet_precondition_skips_action() {
        let driver = MockDriver::new();
        let mut ctx = sample_context();
        let step = StepSpec::new("Add Provider", "POST /provider", |_| {
            ActionRequest::Api(ApiRequest::new("POST", "/provider"))
        })
        .requires(ContextField::AccessToken)
        .validate(checks::status(Outcome::Status(201)));

        let result = StepExecutor::new(&driver).execute(2, &step, &mut ctx).await;

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.actual_outcome, Outcome::NotAttempted);
        assert_eq!(result.validations[0].check, "Preconditions Met");
        assert!(result.error.unwrap().contains("requires accessToken"));
        assert_eq!(driver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_success_applies_extraction() {
        let driver = MockDriver::new();
        driver.respond(200, json!({"data": {"access_token": "t".repeat(1200)}}));
        let mut ctx = sample_context();

        let result = StepExecutor::new(&driver)
            .execute(1, &token_step(), &mut ctx)
            .await;

        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(result.actual_outcome, Outcome::Status(200));
        assert_eq!(result.validations.len(), 2);
        assert_eq!(result.validations[1].check, "Data Extracted");
        assert_eq!(ctx.access_token.as_ref().map(String::len), Some(1200));
        assert_eq!(
            result.extracted_snapshot.unwrap().get("tokenLength").map(String::as_str),
            Some("1200")
        );
        assert_eq!(driver.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_field_is_failed_validation() {
        let driver = MockDriver::new();
        driver.respond(200, json!({"data": {}}));
        let mut ctx = sample_context();

        let result = StepExecutor::new(&driver)
            .execute(1, &token_step(), &mut ctx)
            .await;

        assert_eq!(result.status, StepStatus::Failed);
        assert!(result.validations[0].passed);
        assert_eq!(result.validations[1].check, "Data Extracted");
        assert!(!result.validations[1].passed);
        assert!(ctx.access_token.is_none());
    }

    #[tokio::test]
    async fn test_all_validators_run_after_failure() {
        let driver = MockDriver::new();
        driver.respond(500, json!({"message": "boom"}));
        let mut ctx = sample_context();
        let step = StepSpec::new("Add Provider", "POST /provider", |_| {
            ActionRequest::Api(ApiRequest::new("POST", "/provider"))
        })
        .validate(checks::status(Outcome::Status(201)))
        .validate(checks::message(|_| "Provider created successfully.".to_string()))
        .validate(|_, _| Validation::pass("Always"));

        let result = StepExecutor::new(&driver).execute(2, &step, &mut ctx).await;

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.validations.len(), 3);
        assert!(!result.validations[0].passed);
        assert!(!result.validations[1].passed);
        assert!(result.validations[2].passed);
        assert!(result.error.unwrap().starts_with("Status Code 201 failed"));
    }

    #[tokio::test]
    async fn test_transport_error_becomes_data() {
        let driver = MockDriver::new();
        driver.fail("connection refused");
        let mut ctx = sample_context();

        let result = StepExecutor::new(&driver)
            .execute(1, &token_step(), &mut ctx)
            .await;

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.actual_outcome, Outcome::Success(false));
        assert_eq!(result.validations.len(), 1);
        assert_eq!(result.validations[0].check, "Action Completed");
        assert!(result.validations[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn test_step_without_validators_passes_on_completed_action() {
        let driver = MockDriver::new();
        driver.respond(200, json!({}));
        let mut ctx = sample_context();
        let step = StepSpec::new("Ping", "GET /health", |_| {
            ActionRequest::Api(ApiRequest::new("GET", "/health"))
        });

        let result = StepExecutor::new(&driver).execute(1, &step, &mut ctx).await;

        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(result.actual_outcome, Outcome::Status(200));
        assert_eq!(result.validations.len(), 1);
        assert_eq!(result.validations[0].check, "Action Completed");
        assert!(result.validations[0].passed);
        assert_eq!(driver.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_slot_error_keeps_its_kind() {
        let driver = MockDriver::new();
        driver.fail_with(StepError::NoSlotAvailable { attempts: 30 });
        let mut ctx = sample_context();
        let step = StepSpec::new("Book Appointment", "book", |_| {
            ActionRequest::Api(ApiRequest::new("POST", "/appointment"))
        })
        .validate(checks::completed("Booked"));

        let result = StepExecutor::new(&driver).execute(5, &step, &mut ctx).await;

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.validations[0].check, "Slot Available");
        assert_eq!(
            result.error.as_deref(),
            Some("no available slot found after 30 attempts")
        );
    }
}
