use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::state::{SkippedStep, StepResult};
use crate::fixtures::{PatientProfile, ProviderProfile};

/// Named session fields a step can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextField {
    AccessToken,
    ProviderId,
    PatientId,
    /// Browser session is signed in.
    SignedIn,
    /// Provider from this run's profile exists in the web app.
    ProviderOnboarded,
    /// Patient from this run's profile exists in the web app.
    PatientRegistered,
}

impl ContextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextField::AccessToken => "accessToken",
            ContextField::ProviderId => "providerId",
            ContextField::PatientId => "patientId",
            ContextField::SignedIn => "signedIn",
            ContextField::ProviderOnboarded => "providerOnboarded",
            ContextField::PatientRegistered => "patientRegistered",
        }
    }
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial update produced by a step's extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextUpdate {
    values: Vec<(ContextField, String)>,
    /// Diagnostic values shown in the report, never read back by steps.
    pub snapshot: BTreeMap<String, String>,
}

impl ContextUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: ContextField, value: impl Into<String>) -> Self {
        self.values.push((field, value.into()));
        self
    }

    /// Set a flag-style field (`SignedIn` and friends).
    pub fn mark(self, field: ContextField) -> Self {
        self.set(field, "true")
    }

    pub fn note(mut self, key: &str, value: impl ToString) -> Self {
        self.snapshot.insert(key.to_string(), value.to_string());
        self
    }
}

/// State owned by a single suite run. Threaded explicitly through the
/// workflow runner; nothing else holds a reference to it.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub access_token: Option<String>,
    pub provider_id: Option<String>,
    pub patient_id: Option<String>,
    signed_in: bool,
    provider_onboarded: bool,
    patient_registered: bool,
    provider_profile: ProviderProfile,
    patient_profile: PatientProfile,
    results: Vec<StepResult>,
    skipped: Vec<SkippedStep>,
}

impl SessionContext {
    pub fn new(session_id: &str, provider: ProviderProfile, patient: PatientProfile) -> Self {
        Self {
            session_id: session_id.to_string(),
            access_token: None,
            provider_id: None,
            patient_id: None,
            signed_in: false,
            provider_onboarded: false,
            patient_registered: false,
            provider_profile: provider,
            patient_profile: patient,
            results: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn provider(&self) -> &ProviderProfile {
        &self.provider_profile
    }

    pub fn patient(&self) -> &PatientProfile {
        &self.patient_profile
    }

    pub fn is_set(&self, field: ContextField) -> bool {
        match field {
            ContextField::AccessToken => self.access_token.is_some(),
            ContextField::ProviderId => self.provider_id.is_some(),
            ContextField::PatientId => self.patient_id.is_some(),
            ContextField::SignedIn => self.signed_in,
            ContextField::ProviderOnboarded => self.provider_onboarded,
            ContextField::PatientRegistered => self.patient_registered,
        }
    }

    /// First field in `fields` that is not populated yet.
    pub fn first_missing(&self, fields: &[ContextField]) -> Option<ContextField> {
        fields.iter().copied().find(|f| !self.is_set(*f))
    }

    pub fn apply(&mut self, update: &ContextUpdate) {
        for (field, value) in &update.values {
            match field {
                ContextField::AccessToken => self.access_token = Some(value.clone()),
                ContextField::ProviderId => self.provider_id = Some(value.clone()),
                ContextField::PatientId => self.patient_id = Some(value.clone()),
                ContextField::SignedIn => self.signed_in = value == "true",
                ContextField::ProviderOnboarded => self.provider_onboarded = value == "true",
                ContextField::PatientRegistered => self.patient_registered = value == "true",
            }
        }
    }

    /// `Authorization` header value for the current token.
    pub fn bearer(&self) -> Option<String> {
        self.access_token.as_ref().map(|t| format!("Bearer {}", t))
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn skipped(&self) -> &[SkippedStep] {
        &self.skipped
    }

    pub(crate) fn record(&mut self, result: StepResult) {
        self.results.push(result);
    }

    pub(crate) fn record_skip(&mut self, skipped: SkippedStep) {
        self.skipped.push(skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::sample_context;

    #[test]
    fn test_apply_update_sets_fields() {
        let mut ctx = sample_context();
        assert_eq!(
            ctx.first_missing(&[ContextField::AccessToken, ContextField::ProviderId]),
            Some(ContextField::AccessToken)
        );

        let update = ContextUpdate::new()
            .set(ContextField::AccessToken, "tok")
            .mark(ContextField::SignedIn)
            .note("tokenLength", 3);
        ctx.apply(&update);

        assert_eq!(ctx.bearer().as_deref(), Some("Bearer tok"));
        assert!(ctx.is_set(ContextField::SignedIn));
        assert_eq!(
            ctx.first_missing(&[ContextField::AccessToken, ContextField::ProviderId]),
            Some(ContextField::ProviderId)
        );
    }

    #[test]
    fn test_field_names() {
        assert_eq!(ContextField::PatientId.to_string(), "patientId");
        assert_eq!(
            serde_json::to_string(&ContextField::AccessToken).unwrap(),
            "\"accessToken\""
        );
    }
}
