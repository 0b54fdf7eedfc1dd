pub mod api;
pub mod ui;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::driver::{ApiDriver, PlatformDriver, WebDriver};
use crate::error::ConfigError;
use crate::fixtures::{generate_patient, generate_provider};
use crate::report::{self, EmittedReport, ReportFiles, ReportMeta};
use crate::runner::context::SessionContext;
use crate::runner::events::{EventEmitter, RunEvent};
use crate::runner::step::StepSpec;
use crate::runner::{WorkflowOutcome, WorkflowRunner};
use crate::utils::RunConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Suite {
    /// REST workflow against the API
    Api,
    /// Browser workflow against the provider portal
    Ui,
    /// Both, each with its own session
    All,
}

impl Suite {
    pub fn name(&self) -> &'static str {
        match self {
            Suite::Api => "api",
            Suite::Ui => "ui",
            Suite::All => "all",
        }
    }

    /// The concrete suites to run.
    pub fn expand(self) -> Vec<Suite> {
        match self {
            Suite::All => vec![Suite::Api, Suite::Ui],
            other => vec![other],
        }
    }

    /// Steps in run order; `All` lists every concrete suite's steps.
    pub fn steps(&self, config: &RunConfig, now: DateTime<Utc>) -> Vec<StepSpec> {
        let today = now.date_naive();
        match self {
            Suite::Api => api::steps(config, today),
            Suite::Ui => ui::steps(config, today),
            Suite::All => self
                .expand()
                .iter()
                .flat_map(|s| s.steps(config, now))
                .collect(),
        }
    }

    pub fn validate(&self, config: &RunConfig) -> Result<(), ConfigError> {
        match self {
            Suite::Api => config.validate_api(),
            Suite::Ui => config.validate_ui(),
            Suite::All => config.validate_api().and_then(|_| config.validate_ui()),
        }
    }
}

/// Everything one suite run produced.
#[derive(Debug)]
pub struct SuiteRun {
    pub suite: Suite,
    pub session_id: String,
    pub outcome: WorkflowOutcome,
    pub report: EmittedReport,
    pub files: ReportFiles,
}

impl SuiteRun {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Fresh session with this run's generated provider and patient.
pub fn new_context<R: Rng + ?Sized>(
    rng: &mut R,
    now: DateTime<Utc>,
    config: &RunConfig,
) -> SessionContext {
    let provider = generate_provider(rng, now);
    let patient = generate_patient(rng, &config.email_domain);
    SessionContext::new(&uuid::Uuid::new_v4().to_string(), provider, patient)
}

/// Run `suite`'s steps on `driver` and build the report. Does not touch disk.
/// `suite` must be concrete: API and UI steps need different drivers.
pub async fn execute(
    suite: Suite,
    config: &RunConfig,
    driver: Box<dyn PlatformDriver>,
    emitter: EventEmitter,
    mut ctx: SessionContext,
    now: DateTime<Utc>,
) -> Result<(WorkflowOutcome, EmittedReport)> {
    if suite == Suite::All {
        anyhow::bail!("'all' must be expanded before running");
    }
    let steps = suite.steps(config, now);
    let runner = WorkflowRunner::new(suite.name(), driver, emitter);
    let outcome = runner.run(&steps, &mut ctx).await;

    let meta = ReportMeta {
        session_id: ctx.session_id.clone(),
        suite: suite.name().to_string(),
        execution_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        base_url: match suite {
            Suite::Ui => config.app_url.clone(),
            _ => config.base_url.clone(),
        },
        tenant: config.tenant.clone(),
    };
    let report = report::emit(ctx.results(), ctx.skipped(), &meta);
    Ok((outcome, report))
}

/// Run one concrete suite end to end and persist its reports.
pub async fn run_suite(suite: Suite, config: &RunConfig, emitter: EventEmitter) -> Result<SuiteRun> {
    suite.validate(config)?;

    let now = Utc::now();
    let mut rng = StdRng::from_entropy();
    let ctx = new_context(&mut rng, now, config);
    let session_id = ctx.session_id.clone();

    let driver: Box<dyn PlatformDriver> = match suite {
        Suite::Api => Box::new(ApiDriver::new(config)?),
        Suite::Ui => Box::new(WebDriver::new(config).await?),
        Suite::All => anyhow::bail!("'all' must be expanded before running"),
    };

    let (outcome, report) = execute(suite, config, driver, emitter.clone(), ctx, now).await?;
    let files = report::write_reports(&report, &config.output_dir)
        .with_context(|| format!("Failed to write {} reports", suite.name()))?;

    info!("JSON report written to {}", files.json.display());
    emitter.emit(RunEvent::Log {
        suite: suite.name().to_string(),
        message: format!("Report written to {}", files.html.display()),
    });

    Ok(SuiteRun {
        suite,
        session_id,
        outcome,
        report,
        files,
    })
}

/// Run every suite `suite` expands to. Each gets its own session; with
/// `parallel` they run as separate tasks.
pub async fn run_suites(
    suite: Suite,
    config: RunConfig,
    emitter: EventEmitter,
    parallel: bool,
) -> Result<Vec<SuiteRun>> {
    let suites = suite.expand();
    let mut runs = Vec::with_capacity(suites.len());

    if parallel && suites.len() > 1 {
        let config = Arc::new(config);
        let handles: Vec<_> = suites
            .into_iter()
            .map(|s| {
                let config = config.clone();
                let emitter = emitter.clone();
                tokio::spawn(async move { run_suite(s, &config, emitter).await })
            })
            .collect();

        for handle in handles {
            runs.push(handle.await.context("Suite task panicked")??);
        }
    } else {
        for s in suites {
            runs.push(run_suite(s, &config, emitter.clone()).await?);
        }
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use crate::report::SuccessRate;
    use chrono::TimeZone;

    fn config() -> RunConfig {
        let mut config = RunConfig {
            base_url: "https://stage-api.example.com".to_string(),
            app_url: "https://portal.example.com".to_string(),
            tenant: "stage_tenant".to_string(),
            ..RunConfig::default()
        };
        config.credentials.username = "rose@example.com".to_string();
        config.credentials.password = "secret".to_string();
        config
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 24, 8, 7, 34).unwrap()
    }

    #[test]
    fn test_expand() {
        assert_eq!(Suite::All.expand(), vec![Suite::Api, Suite::Ui]);
        assert_eq!(Suite::Ui.expand(), vec![Suite::Ui]);
    }

    #[test]
    fn test_validate_per_suite() {
        let mut c = config();
        c.app_url.clear();
        assert!(Suite::Api.validate(&c).is_ok());
        assert!(matches!(
            Suite::Ui.validate(&c),
            Err(ConfigError::Missing("appUrl"))
        ));
        assert!(Suite::All.validate(&c).is_err());
    }

    #[test]
    fn test_step_counts() {
        assert_eq!(Suite::Api.steps(&config(), now()).len(), 7);
        assert_eq!(Suite::Ui.steps(&config(), now()).len(), 5);

        let all: Vec<String> = Suite::All
            .steps(&config(), now())
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(all.len(), 12);
        assert_eq!(all[0], "Provider Login");
        assert_eq!(all[7], Suite::Ui.steps(&config(), now())[0].name);
    }

    #[tokio::test]
    async fn test_execute_refuses_unexpanded_all() {
        let mock = MockDriver::new();
        let ctx = new_context(&mut StdRng::seed_from_u64(1), now(), &config());

        let err = execute(
            Suite::All,
            &config(),
            Box::new(mock),
            EventEmitter::default(),
            ctx,
            now(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("must be expanded"));
    }

    #[tokio::test]
    async fn test_execute_builds_report_for_halted_run() {
        let mock = MockDriver::new();
        mock.respond(401, serde_json::json!({"message": "Bad credentials"}));
        let mut rng = StdRng::seed_from_u64(3);
        let ctx = new_context(&mut rng, now(), &config());
        let session = ctx.session_id.clone();

        let (outcome, report) = execute(
            Suite::Api,
            &config(),
            Box::new(mock),
            EventEmitter::default(),
            ctx,
            now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.halted_at, Some(1));
        let s = &report.structured;
        assert_eq!(s.session_id, session);
        assert_eq!(s.execution_date, "2025-07-24T08:07:34.000Z");
        assert_eq!(s.summary.total_tests, 1);
        assert_eq!(s.summary.failed_tests, 1);
        assert_eq!(s.summary.skipped_tests, 6);
        assert_eq!(s.summary.success_rate, SuccessRate::Percent(0));
        assert_eq!(s.skipped[0].name, "Add Provider");
        assert!(report.rendered.contains("Some tests failed or were skipped"));
    }

    #[tokio::test]
    async fn test_seeded_context_is_reproducible() {
        let a = new_context(&mut StdRng::seed_from_u64(9), now(), &config());
        let b = new_context(&mut StdRng::seed_from_u64(9), now(), &config());
        assert_eq!(a.provider(), b.provider());
        assert_eq!(a.patient(), b.patient());
        assert_ne!(a.session_id, b.session_id);
    }
}
