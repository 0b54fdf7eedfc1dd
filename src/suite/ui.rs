//! Provider portal workflow driven through the browser.

use chrono::NaiveDate;

use crate::driver::traits::{ActionRequest, Selector, UiCommand, UiSequence};
use crate::runner::context::{ContextField, ContextUpdate, SessionContext};
use crate::runner::state::Outcome;
use crate::runner::step::{checks, StepSpec};
use crate::utils::RunConfig;
use UiCommand::*;

const SETTINGS_MENU: &str =
    "a:has-text(\"Settings\"), button:has-text(\"Settings\"), [data-testid*=\"settings\"]";
const FIRST_OPTION: &str = "li[role=\"option\"]:first-child";
const SECOND_OPTION: &str = "li[role=\"option\"]:nth-child(2)";
const EMAIL_INPUT: &str = "input[name=\"email\"], input[type=\"email\"]";
const SUCCESS_TOAST: &str = "text=/successfully/i";
const APPOINTMENT_TYPE: &str = "New Patient Visit";
const BOOKING_TIMEZONE: &str = "Indian Standard Time (GMT +05:30)";
const PATIENT_MOBILE: &str = "9876544400";

fn click(selector: Selector) -> UiCommand {
    Click(selector)
}

fn button(name: &str) -> Selector {
    Selector::role("button", name)
}

fn combobox(name: &str) -> Selector {
    Selector::role("combobox", name)
}

/// Open a combobox and pick the option with exactly `text`.
fn choose(name: &str, text: &str) -> Vec<UiCommand> {
    vec![
        click(combobox(name)),
        Fill(combobox(name), text.to_string()),
        ExpectVisible(Selector::text(text)),
        click(Selector::text(text)),
    ]
}

fn sequence(label: &str, commands: Vec<UiCommand>) -> ActionRequest {
    ActionRequest::Ui(UiSequence {
        label: label.to_string(),
        commands,
    })
}

fn ui_step<F>(name: &str, target: &str, commands: F) -> StepSpec
where
    F: Fn(&SessionContext) -> Vec<UiCommand> + Send + Sync + 'static,
{
    let label = name.to_string();
    StepSpec::new(name, target, move |ctx| sequence(&label, commands(ctx)))
        .expect(Outcome::Success(true))
        .validate(checks::completed("Interaction Completed"))
}

/// The five UI steps. `today` is where the slot search starts.
pub fn steps(config: &RunConfig, today: NaiveDate) -> Vec<StepSpec> {
    vec![
        login(config),
        add_provider(),
        set_availability(),
        register_patient(),
        book_appointment(today, config.max_slot_attempts),
    ]
}

fn login(config: &RunConfig) -> StepSpec {
    let username = config.credentials.username.clone();
    let password = config.credentials.password.clone();
    let shown_user = username.clone();

    ui_step("Login", "/auth/login", move |_| {
        vec![
            Goto("/auth/login".to_string()),
            click(Selector::placeholder("Email")),
            Fill(Selector::placeholder("Email"), username.clone()),
            Press(Selector::placeholder("Email"), "Tab".to_string()),
            Fill(Selector::css("input[type=\"password\"]"), password.clone()),
            click(button("Let's get Started")),
            WaitFor(Selector::css(SETTINGS_MENU), 0),
        ]
    })
    .snapshot(move |_| [("username".to_string(), shown_user.clone())].into())
    .extract(|_, _| Ok(ContextUpdate::new().mark(ContextField::SignedIn)))
}

fn add_provider() -> StepSpec {
    ui_step(
        "Add Provider User",
        "Settings > User Settings > Providers",
        |ctx| {
            let p = ctx.provider();
            vec![
                click(Selector::css(SETTINGS_MENU)),
                Pause(500),
                click(Selector::text("User Settings")),
                Pause(500),
                click(Selector::text("Providers")),
                click(button("Add Provider User")),
                Fill(
                    Selector::css("input[name=\"firstName\"], input[placeholder*=\"First Name\" i]"),
                    p.first_name.clone(),
                ),
                Fill(
                    Selector::css("input[name=\"lastName\"], input[placeholder*=\"Last Name\" i]"),
                    p.last_name.clone(),
                ),
                click(Selector::css("input[name=\"role\"][role=\"combobox\"]")),
                Pause(500),
                click(Selector::text("Provider")),
                click(Selector::css("input[name=\"gender\"][role=\"combobox\"]")),
                Pause(500),
                click(Selector::text(p.gender.label())),
                Fill(Selector::css(EMAIL_INPUT), p.email.clone()),
                ExpectVisible(Selector::css("button:has-text(\"Save\")")),
                click(Selector::css("button:has-text(\"Save\")")),
                ExpectVisible(Selector::css(SUCCESS_TOAST)),
            ]
        },
    )
    .requires(ContextField::SignedIn)
    .snapshot(|ctx| ctx.provider().snapshot())
    .extract(|_, ctx| {
        Ok(ContextUpdate::new()
            .mark(ContextField::ProviderOnboarded)
            .note("providerName", ctx.provider().full_name()))
    })
}

fn set_availability() -> StepSpec {
    ui_step(
        "Set Availability",
        "Scheduling > Availability",
        |ctx| {
            let full_name = ctx.provider().full_name();
            let mut commands = vec![
                Pause(500),
                click(Selector::role("tab", "Scheduling")),
                click(Selector::text("Availability")),
                click(button("Edit Availability")),
            ];
            commands.extend(choose("Select Provider", &full_name));
            commands.extend([
                click(combobox("Time Zone")),
                click(Selector::css(FIRST_OPTION)),
                click(combobox("Booking Window")),
                click(Selector::css(FIRST_OPTION)),
                click(Selector::text("Monday")),
                click(combobox("Start Time")),
                WaitFor(Selector::css("li[role=\"option\"]"), 0),
                click(Selector::css(FIRST_OPTION)),
                click(combobox("End Time")),
                WaitFor(Selector::css("li[role=\"option\"]"), 0),
                click(Selector::css(SECOND_OPTION)),
                click(combobox("Appointment Type")),
                click(Selector::text(APPOINTMENT_TYPE)),
                click(combobox("Duration")),
                click(Selector::css(FIRST_OPTION)),
                click(button("Save")),
                ExpectVisible(Selector::css(SUCCESS_TOAST)),
            ]);
            commands
        },
    )
    .requires(ContextField::SignedIn)
    .requires(ContextField::ProviderOnboarded)
    .snapshot(|ctx| {
        [
            ("provider".to_string(), ctx.provider().full_name()),
            ("day".to_string(), "Monday".to_string()),
            ("appointmentType".to_string(), APPOINTMENT_TYPE.to_string()),
        ]
        .into()
    })
}

fn register_patient() -> StepSpec {
    ui_step("Register Patient", "Create > New Patient", |ctx| {
        let p = ctx.patient();
        vec![
            Pause(500),
            click(Selector::text("Create")),
            click(Selector::role("menuitem", "New Patient")),
            click(Selector::text("Enter Patient Details")),
            click(button("Next")),
            Fill(Selector::css("input[name=\"firstName\"]"), p.first_name.clone()),
            Fill(Selector::css("input[name=\"lastName\"]"), p.last_name.clone()),
            Fill(
                Selector::css("input[name=\"birthDate\"]"),
                p.birth_date.format("%m-%d-%Y").to_string(),
            ),
            click(combobox("Gender")),
            click(Selector::text(p.gender.label())),
            Fill(
                Selector::css("input[name=\"mobileNumber\"]"),
                PATIENT_MOBILE.to_string(),
            ),
            Fill(Selector::css(EMAIL_INPUT), p.email.clone()),
            click(button("Save")),
            ExpectVisible(Selector::role("tab", "Patients")),
        ]
    })
    .requires(ContextField::SignedIn)
    .snapshot(|ctx| ctx.patient().snapshot())
    .extract(|_, ctx| {
        Ok(ContextUpdate::new()
            .mark(ContextField::PatientRegistered)
            .note("patientName", ctx.patient().full_name()))
    })
}

fn book_appointment(today: NaiveDate, max_attempts: u32) -> StepSpec {
    ui_step(
        "Book Appointment",
        "Scheduling > Appointments > New Appointment",
        move |ctx| {
            let patient = ctx.patient().full_name();
            let provider = ctx.provider().full_name();
            let mut commands = vec![
                click(Selector::role("tab", "Scheduling")),
                click(Selector::text("Appointments")),
                click(button("Schedule Appointment")),
                click(Selector::role("menuitem", "New Appointment")),
            ];
            commands.extend(choose("Patient Name", &patient));
            commands.extend([
                click(combobox("Appointment Type")),
                click(Selector::role("option", APPOINTMENT_TYPE)),
                click(Selector::placeholder("Reason")),
                Fill(Selector::placeholder("Reason"), "Fever".to_string()),
            ]);
            commands.extend(choose("Timezone", BOOKING_TIMEZONE));
            commands.push(click(button("Telehealth")));
            commands.extend(choose("Provider", &provider));
            commands.extend([
                click(Selector::css("button:has-text(\"View availability\")")),
                PickSlot {
                    from: today,
                    max_attempts,
                },
                Screenshot("appointment_booked.png".to_string()),
                click(button("Save And Close")),
                Pause(2000),
            ]);
            commands
        },
    )
    .requires(ContextField::SignedIn)
    .requires(ContextField::ProviderOnboarded)
    .requires(ContextField::PatientRegistered)
    .snapshot(|ctx| {
        [
            ("patient".to_string(), ctx.patient().full_name()),
            ("provider".to_string(), ctx.provider().full_name()),
            ("reason".to_string(), "Fever".to_string()),
        ]
        .into()
    })
    .extract(|raw, _| {
        let mut update = ContextUpdate::new();
        if let Some(date) = raw.str_field("slot.date") {
            update = update.note("slotDate", date);
        }
        if let Some(attempt) = raw.field("slot.attempt") {
            update = update.note("searchAttempts", attempt);
        }
        Ok(update)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{sample_context, MockDriver, SharedDriver};
    use crate::error::StepError;
    use crate::runner::events::EventEmitter;
    use crate::runner::state::StepStatus;
    use crate::runner::WorkflowRunner;
    use serde_json::json;
    use std::sync::Arc;

    fn config() -> RunConfig {
        RunConfig {
            app_url: "https://portal.example.com".to_string(),
            max_slot_attempts: 12,
            ..RunConfig::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 24).unwrap()
    }

    fn sequence_of(mock: &MockDriver, n: usize) -> UiSequence {
        match &mock.calls()[n] {
            ActionRequest::Ui(seq) => seq.clone(),
            other => panic!("expected UI sequence, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_ui_workflow() {
        let mock = Arc::new(MockDriver::new());
        for _ in 0..4 {
            mock.respond_ui(json!({}));
        }
        mock.respond_ui(json!({"slot": {"date": "2025-07-28", "index": 0, "attempt": 5}}));
        let runner = WorkflowRunner::new(
            "ui",
            Box::new(SharedDriver(mock.clone())),
            EventEmitter::default(),
        );
        let mut ctx = sample_context();

        let outcome = runner.run(&steps(&config(), today()), &mut ctx).await;

        assert!(outcome.is_success(), "{:?}", ctx.results());
        assert_eq!(mock.call_count(), 5);

        // Generated profile flows into the form
        let provider_form = sequence_of(&mock, 1);
        assert!(provider_form
            .commands
            .contains(&Fill(
                Selector::css("input[name=\"firstName\"], input[placeholder*=\"First Name\" i]"),
                ctx.provider().first_name.clone()
            )));

        let booking = sequence_of(&mock, 4);
        assert!(booking.commands.contains(&PickSlot {
            from: today(),
            max_attempts: 12
        }));

        let extracted = ctx.results()[4].extracted_snapshot.clone().unwrap();
        assert_eq!(extracted.get("slotDate").map(String::as_str), Some("2025-07-28"));
        assert_eq!(extracted.get("searchAttempts").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn test_no_slot_fails_booking() {
        let mock = Arc::new(MockDriver::new());
        for _ in 0..4 {
            mock.respond_ui(json!({}));
        }
        mock.fail_with(StepError::NoSlotAvailable { attempts: 12 });
        let runner = WorkflowRunner::new(
            "ui",
            Box::new(SharedDriver(mock.clone())),
            EventEmitter::default(),
        );
        let mut ctx = sample_context();

        let outcome = runner.run(&steps(&config(), today()), &mut ctx).await;

        assert_eq!(outcome.passed(), 4);
        assert_eq!(outcome.failed(), 1);
        let booking = &ctx.results()[4];
        assert_eq!(booking.status, StepStatus::Failed);
        assert_eq!(booking.validations[0].check, "Slot Available");
        assert_eq!(booking.actual_outcome, Outcome::Success(false));
    }

    #[tokio::test]
    async fn test_failed_login_skips_everything() {
        let mock = Arc::new(MockDriver::new());
        mock.fail("Login: command 6 (click role=button) timed out");
        let runner = WorkflowRunner::new(
            "ui",
            Box::new(SharedDriver(mock.clone())),
            EventEmitter::default(),
        );
        let mut ctx = sample_context();

        let outcome = runner.run(&steps(&config(), today()), &mut ctx).await;

        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.skipped(), 4);
        assert_eq!(ctx.results()[0].validations[0].check, "Action Completed");
        assert!(!ctx.is_set(ContextField::SignedIn));
    }
}
