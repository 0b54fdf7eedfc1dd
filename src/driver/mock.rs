//! Scripted drivers for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{ActionRequest, PlatformDriver, RawOutcome, SlotCalendar, SlotView};
use crate::error::StepError;
use crate::fixtures::{generate_patient, generate_provider};
use crate::runner::context::SessionContext;

enum Reply {
    Outcome(RawOutcome),
    Error(String),
    StepError(StepError),
}

/// Replays queued replies in order and records every request it receives.
/// With the queue empty it answers `200 {}`.
#[derive(Default)]
pub struct MockDriver {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<ActionRequest>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: Value) {
        self.push(Reply::Outcome(RawOutcome::http(status, body)));
    }

    pub fn respond_ui(&self, body: Value) {
        self.push(Reply::Outcome(RawOutcome::ui(body)));
    }

    pub fn fail(&self, message: &str) {
        self.push(Reply::Error(message.to_string()));
    }

    pub fn fail_with(&self, err: StepError) {
        self.push(Reply::StepError(err));
    }

    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<ActionRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PlatformDriver for MockDriver {
    fn platform_name(&self) -> &str {
        "mock"
    }

    async fn perform(&self, request: &ActionRequest) -> Result<RawOutcome> {
        self.calls.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Outcome(raw)) => Ok(raw),
            Some(Reply::Error(message)) => Err(anyhow::anyhow!(message)),
            Some(Reply::StepError(err)) => Err(err.into()),
            None => Ok(RawOutcome::http(200, Value::Object(Default::default()))),
        }
    }
}

/// Lets a test keep a handle on the mock after boxing it into a runner.
pub struct SharedDriver(pub Arc<MockDriver>);

#[async_trait]
impl PlatformDriver for SharedDriver {
    fn platform_name(&self) -> &str {
        "shared"
    }

    async fn perform(&self, request: &ActionRequest) -> Result<RawOutcome> {
        self.0.perform(request).await
    }
}

/// Replays one view per opened date; dates past the script show no slots.
pub struct ScriptedCalendar {
    script: Mutex<VecDeque<Result<SlotView, String>>>,
    opened: Mutex<Vec<NaiveDate>>,
    selected: Mutex<Vec<(NaiveDate, usize)>>,
}

impl ScriptedCalendar {
    pub fn new(script: Vec<Result<SlotView, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            opened: Mutex::new(Vec::new()),
            selected: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<NaiveDate> {
        self.opened.lock().unwrap().clone()
    }

    pub fn selected(&self) -> Vec<(NaiveDate, usize)> {
        self.selected.lock().unwrap().clone()
    }
}

#[async_trait]
impl SlotCalendar for ScriptedCalendar {
    async fn open_date(&self, date: NaiveDate) -> Result<SlotView> {
        self.opened.lock().unwrap().push(date);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(view)) => Ok(view),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(SlotView::NoSlots),
        }
    }

    async fn select_slot(&self, date: NaiveDate, index: usize) -> Result<()> {
        self.selected.lock().unwrap().push((date, index));
        Ok(())
    }
}

/// Session context with seeded fixtures.
pub fn sample_context() -> SessionContext {
    let mut rng = StdRng::seed_from_u64(11);
    let provider = generate_provider(&mut rng, chrono::Utc::now());
    let patient = generate_patient(&mut rng, "example.com");
    SessionContext::new("test-session", provider, patient)
}
