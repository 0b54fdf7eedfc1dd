use std::collections::BTreeMap;

use super::context::{ContextField, ContextUpdate, SessionContext};
use super::state::{Outcome, Validation};
use crate::driver::traits::{ActionRequest, RawOutcome};
use crate::error::StepError;

pub type RequestBuilder = Box<dyn Fn(&SessionContext) -> ActionRequest + Send + Sync>;
pub type Validator = Box<dyn Fn(&RawOutcome, &SessionContext) -> Validation + Send + Sync>;
pub type Extractor =
    Box<dyn Fn(&RawOutcome, &SessionContext) -> Result<ContextUpdate, StepError> + Send + Sync>;
pub type SnapshotFn = Box<dyn Fn(&SessionContext) -> BTreeMap<String, String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criticality {
    /// Failure skips every later step
    #[default]
    Blocking,
    NonBlocking,
}

/// Declarative description of one workflow step.
pub struct StepSpec {
    pub name: String,
    pub target: String,
    pub expected: Outcome,
    pub preconditions: Vec<ContextField>,
    pub criticality: Criticality,
    request: RequestBuilder,
    validators: Vec<Validator>,
    extractor: Option<Extractor>,
    input_snapshot: Option<SnapshotFn>,
}

impl StepSpec {
    pub fn new<F>(name: &str, target: &str, request: F) -> Self
    where
        F: Fn(&SessionContext) -> ActionRequest + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            expected: Outcome::Success(true),
            preconditions: Vec::new(),
            criticality: Criticality::Blocking,
            request: Box::new(request),
            validators: Vec::new(),
            extractor: None,
            input_snapshot: None,
        }
    }

    pub fn expect(mut self, outcome: Outcome) -> Self {
        self.expected = outcome;
        self
    }

    pub fn requires(mut self, field: ContextField) -> Self {
        if !self.preconditions.contains(&field) {
            self.preconditions.push(field);
        }
        self
    }

    pub fn non_blocking(mut self) -> Self {
        self.criticality = Criticality::NonBlocking;
        self
    }

    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&RawOutcome, &SessionContext) -> Validation + Send + Sync + 'static,
    {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn extract<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&RawOutcome, &SessionContext) -> Result<ContextUpdate, StepError>
            + Send
            + Sync
            + 'static,
    {
        self.extractor = Some(Box::new(extractor));
        self
    }

    pub fn snapshot<F>(mut self, snapshot: F) -> Self
    where
        F: Fn(&SessionContext) -> BTreeMap<String, String> + Send + Sync + 'static,
    {
        self.input_snapshot = Some(Box::new(snapshot));
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.criticality == Criticality::Blocking
    }

    pub fn build_request(&self, ctx: &SessionContext) -> ActionRequest {
        (self.request)(ctx)
    }

    pub fn run_validators(&self, raw: &RawOutcome, ctx: &SessionContext) -> Vec<Validation> {
        self.validators.iter().map(|v| v(raw, ctx)).collect()
    }

    pub fn run_extractor(
        &self,
        raw: &RawOutcome,
        ctx: &SessionContext,
    ) -> Option<Result<ContextUpdate, StepError>> {
        self.extractor.as_ref().map(|e| e(raw, ctx))
    }

    pub fn input_snapshot(&self, ctx: &SessionContext) -> BTreeMap<String, String> {
        self.input_snapshot
            .as_ref()
            .map(|s| s(ctx))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for StepSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSpec")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("expected", &self.expected)
            .field("preconditions", &self.preconditions)
            .field("criticality", &self.criticality)
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// Reusable validators.
pub mod checks {
    use super::*;

    /// Status code matches the step's expectation.
    pub fn status(expected: Outcome) -> impl Fn(&RawOutcome, &SessionContext) -> Validation {
        move |raw, _| {
            let label = format!("Status Code {}", expected);
            match raw.status_code {
                Some(code) if expected.accepts_status(code) => {
                    Validation::pass(label).with_detail(format!("Got {}", code))
                }
                Some(code) => Validation::fail(label, format!("Got {}", code)),
                None => Validation::fail(label, "no status code in outcome"),
            }
        }
    }

    /// `message` field of the body equals the text built from the context.
    pub fn message<F>(expected: F) -> impl Fn(&RawOutcome, &SessionContext) -> Validation
    where
        F: Fn(&SessionContext) -> String,
    {
        move |raw, ctx| {
            let want = expected(ctx);
            let got = raw.str_field("message").unwrap_or_default();
            Validation::from_bool(
                "Success Message",
                got == want,
                format!("Expected: \"{}\", Actual: \"{}\"", want, got),
            )
        }
    }

    /// The UI sequence ran to completion.
    pub fn completed(label: &str) -> impl Fn(&RawOutcome, &SessionContext) -> Validation {
        let label = label.to_string();
        move |raw, _| {
            if raw.success {
                Validation::pass(label.clone())
            } else {
                Validation::fail(label.clone(), "interaction sequence did not complete")
            }
        }
    }
}
