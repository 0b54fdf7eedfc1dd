//! REST booking workflow: login, provider, availability, patient, appointment.

use chrono::{NaiveDate, Weekday};
use serde_json::{json, Map, Value};

use crate::driver::traits::{ActionRequest, ApiRequest, RawOutcome};
use crate::error::StepError;
use crate::fixtures::{appointment_window, next_weekday, PatientProfile};
use crate::runner::context::{ContextField, ContextUpdate, SessionContext};
use crate::runner::state::{Outcome, Validation};
use crate::runner::step::{checks, StepSpec};
use crate::utils::RunConfig;

pub const LOGIN_PATH: &str = "/api/master/login";
pub const PROVIDER_PATH: &str = "/api/master/provider";
pub const PROVIDER_LIST_PATH: &str = "/api/master/provider?page=0&size=20";
pub const AVAILABILITY_PATH: &str = "/api/master/provider/availability-setting";
pub const PATIENT_PATH: &str = "/api/master/patient";
pub const PATIENT_LIST_PATH: &str = "/api/master/patient?page=0&size=20&searchString=";
pub const APPOINTMENT_PATH: &str = "/api/master/appointment";

/// Shortest token the login endpoint is expected to hand out.
const MIN_TOKEN_LEN: usize = 1000;
/// Availability window, in EST, and the matching booking hour in UTC.
const AVAILABILITY_DAY: Weekday = Weekday::Mon;
const BOOKING_HOUR_UTC: u32 = 17;
const SLOT_MINUTES: i64 = 30;

/// Request carrying the session's bearer token when there is one.
fn authed(ctx: &SessionContext, method: &str, path: &str) -> ApiRequest {
    let req = ApiRequest::new(method, path);
    match ctx.bearer() {
        Some(bearer) => req.header("Authorization", bearer),
        None => req,
    }
}

/// Entry of `data.content` whose first and last name match.
pub fn find_by_name<'a>(raw: &'a RawOutcome, first: &str, last: &str) -> Option<&'a Value> {
    raw.field("data.content")?.as_array()?.iter().find(|entry| {
        entry.get("firstName").and_then(Value::as_str) == Some(first)
            && entry.get("lastName").and_then(Value::as_str) == Some(last)
    })
}

fn uuid_of(entry: Option<&Value>) -> Option<&str> {
    entry?
        .get("uuid")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
}

fn token_len(raw: &RawOutcome) -> usize {
    raw.str_field("data.access_token").map_or(0, str::len)
}

/// The seven API steps. `today` anchors the booking date.
pub fn steps(config: &RunConfig, today: NaiveDate) -> Vec<StepSpec> {
    let tenant = config.tenant.clone();
    let username = config.credentials.username.clone();
    let password = config.credentials.password.clone();

    vec![
        login(tenant.clone(), username, password),
        add_provider(),
        get_provider(),
        set_availability(tenant.clone()),
        create_patient(today),
        get_patient(),
        book_appointment(tenant, today),
    ]
}

fn login(tenant: String, username: String, password: String) -> StepSpec {
    let shown_user = username.clone();
    StepSpec::new("Provider Login", &format!("POST {}", LOGIN_PATH), move |_| {
        ActionRequest::Api(ApiRequest::new("POST", LOGIN_PATH).json(json!({
            "username": username,
            "password": password,
            "xTENANTID": tenant,
        })))
    })
    .expect(Outcome::Status(200))
    .snapshot(move |_| [("username".to_string(), shown_user.clone())].into())
    .validate(checks::status(Outcome::Status(200)))
    .validate(|raw, _| {
        Validation::from_bool(
            "Access Token Present",
            token_len(raw) > 0,
            "data.access_token",
        )
    })
    .validate(|raw, _| {
        let len = token_len(raw);
        Validation::from_bool(
            format!("Token Length > {} chars", MIN_TOKEN_LEN),
            len > MIN_TOKEN_LEN,
            format!("{} chars", len),
        )
    })
    .extract(|raw, _| {
        let token = raw
            .str_field("data.access_token")
            .ok_or_else(|| StepError::ExtractionFailed {
                field: "data.access_token".to_string(),
            })?;
        Ok(ContextUpdate::new()
            .set(ContextField::AccessToken, token)
            .note("tokenLength", token.len()))
    })
}

fn add_provider() -> StepSpec {
    StepSpec::new("Add Provider", &format!("POST {}", PROVIDER_PATH), |ctx| {
        let p = ctx.provider();
        ActionRequest::Api(authed(ctx, "POST", PROVIDER_PATH).json(merged(vec![
            json!({
                "roleType": "PROVIDER",
                "active": false,
                "admin_access": true,
                "status": false,
                "avatar": "",
                "role": "PROVIDER",
                "firstName": p.first_name,
                "lastName": p.last_name,
                "gender": p.gender.as_str(),
                "phone": "",
                "npi": "",
                "specialities": null,
                "groupNpiNumber": "",
            }),
            json!({
                "licensedStates": null,
                "licenseNumber": "",
                "acceptedInsurances": null,
                "experience": "",
                "taxonomyNumber": "",
                "workLocations": null,
                "email": p.email,
                "officeFaxNumber": "",
                "areaFocus": "",
                "hospitalAffiliation": "",
                "ageGroupSeen": null,
                "spokenLanguages": null,
                "providerEmployment": "",
            }),
            json!({
                "insurance_verification": "",
                "prior_authorization": "",
                "secondOpinion": "",
                "careService": null,
                "bio": "",
                "expertise": "",
                "workExperience": "",
                "licenceInformation": [{ "uuid": "", "licenseState": "", "licenseNumber": "" }],
                "deaInformation": [{ "deaState": "", "deaNumber": "", "deaTermDate": "", "deaActiveDate": "" }],
            }),
        ])))
    })
    .requires(ContextField::AccessToken)
    .expect(Outcome::Status(201))
    .snapshot(|ctx| ctx.provider().snapshot())
    .validate(checks::status(Outcome::Status(201)))
    .validate(checks::message(|_| "Provider created successfully.".to_string()))
}

fn get_provider() -> StepSpec {
    StepSpec::new("Get Provider", &format!("GET {}", PROVIDER_PATH), |ctx| {
        ActionRequest::Api(authed(ctx, "GET", PROVIDER_LIST_PATH))
    })
    .requires(ContextField::AccessToken)
    .expect(Outcome::Status(200))
    .validate(checks::status(Outcome::Status(200)))
    .validate(|raw, ctx| {
        let p = ctx.provider();
        let found = find_by_name(raw, &p.first_name, &p.last_name).is_some();
        Validation::from_bool(
            "Created Provider Found",
            found,
            format!("{} in provider list", p.full_name()),
        )
    })
    .extract(|raw, ctx| {
        let p = ctx.provider();
        let uuid = uuid_of(find_by_name(raw, &p.first_name, &p.last_name)).ok_or_else(|| {
            StepError::ExtractionFailed {
                field: "providerId".to_string(),
            }
        })?;
        Ok(ContextUpdate::new()
            .set(ContextField::ProviderId, uuid)
            .note("providerUuid", uuid)
            .note("providerName", p.full_name()))
    })
}

fn set_availability(tenant: String) -> StepSpec {
    StepSpec::new(
        "Set Availability",
        &format!("POST {}", AVAILABILITY_PATH),
        move |ctx| {
            ActionRequest::Api(authed(ctx, "POST", AVAILABILITY_PATH).json(json!({
                "setToWeekdays": false,
                "providerId": ctx.provider_id.clone().unwrap_or_default(),
                "bookingWindow": "3",
                "timezone": "EST",
                "bufferTime": 0,
                "initialConsultTime": 0,
                "followupConsultTime": 0,
                "settings": [{ "type": "NEW", "slotTime": SLOT_MINUTES.to_string(), "minNoticeUnit": "8_HOUR" }],
                "blockDays": [],
                "daySlots": [{
                    "day": "MONDAY",
                    "startTime": "12:00:00",
                    "endTime": "13:00:00",
                    "availabilityMode": "VIRTUAL",
                }],
                "bookBefore": "undefined undefined",
                "xTENANTID": tenant,
            })))
        },
    )
    .requires(ContextField::AccessToken)
    .requires(ContextField::ProviderId)
    .expect(Outcome::Status(200))
    .snapshot(|ctx| {
        [
            (
                "providerId".to_string(),
                ctx.provider_id.clone().unwrap_or_default(),
            ),
            (
                "schedule".to_string(),
                "Monday 12:00-13:00 EST (Virtual)".to_string(),
            ),
        ]
        .into()
    })
    .validate(checks::status(Outcome::Status(200)))
    .validate(checks::message(|ctx| {
        format!(
            "Availability added successfully for provider {}",
            ctx.provider().full_name()
        )
    }))
}

/// Fold several JSON objects into one; later keys win.
fn merged(parts: Vec<Value>) -> Value {
    let mut body = Map::new();
    for part in parts {
        if let Value::Object(fields) = part {
            body.extend(fields);
        }
    }
    Value::Object(body)
}

fn empty_address() -> Value {
    json!({ "line1": "", "line2": "", "city": "", "state": "", "country": "", "zipcode": "" })
}

/// Blank self-pay insurance entry the registration form submits.
fn blank_insurance() -> Value {
    let address = empty_address();
    merged(vec![
        json!({
            "active": true,
            "insuranceId": "",
            "copayType": "FIXED",
            "coInsurance": "",
            "claimNumber": "",
            "note": "",
            "deductibleAmount": "",
            "employerName": "",
            "employerAddress": address.clone(),
        }),
        json!({
            "subscriberFirstName": "",
            "subscriberLastName": "",
            "subscriberMiddleName": "",
            "subscriberSsn": "",
            "subscriberMobileNumber": "",
            "subscriberAddress": address.clone(),
            "groupId": "",
            "memberId": "",
            "groupName": "",
        }),
        json!({
            "frontPhoto": "",
            "backPhoto": "",
            "insuredFirstName": "",
            "insuredLastName": "",
            "address": address,
            "insuredBirthDate": "",
            "coPay": "",
            "insurancePayer": {},
        }),
    ])
}

pub fn patient_body(p: &PatientProfile, signed_date: &str) -> Value {
    merged(vec![
        json!({
            "phoneNotAvailable": true,
            "emailNotAvailable": true,
            "registrationDate": "",
            "firstName": p.first_name,
            "middleName": "",
            "lastName": p.last_name,
            "timezone": "IST",
            "birthDate": format!("{}T00:00:00.000Z", p.birth_date),
            "gender": p.gender.as_str(),
        }),
        json!({
            "ssn": "",
            "mrn": "",
            "languages": null,
            "avatar": "",
            "mobileNumber": "",
            "faxNumber": "",
            "homePhone": "",
            "address": empty_address(),
        }),
        json!({
            "emergencyContacts": [{ "firstName": "", "lastName": "", "mobile": "" }],
            "patientInsurances": [blank_insurance()],
            "emailConsent": false,
            "messageConsent": false,
            "callConsent": false,
            "patientConsentEntities": [{ "signedDate": signed_date }],
        }),
    ])
}

fn create_patient(today: NaiveDate) -> StepSpec {
    let signed = format!("{}T00:00:00.000Z", today);
    StepSpec::new("Create Patient", &format!("POST {}", PATIENT_PATH), move |ctx| {
        ActionRequest::Api(authed(ctx, "POST", PATIENT_PATH).json(patient_body(ctx.patient(), &signed)))
    })
    .requires(ContextField::AccessToken)
    .expect(Outcome::Status(201))
    .snapshot(|ctx| ctx.patient().snapshot())
    .validate(checks::status(Outcome::Status(201)))
    .validate(checks::message(|_| {
        "Patient Details Added Successfully.".to_string()
    }))
}

fn get_patient() -> StepSpec {
    StepSpec::new("Get Patient", &format!("GET {}", PATIENT_PATH), |ctx| {
        ActionRequest::Api(authed(ctx, "GET", PATIENT_LIST_PATH))
    })
    .requires(ContextField::AccessToken)
    .expect(Outcome::Status(200))
    .validate(checks::status(Outcome::Status(200)))
    .validate(|raw, ctx| {
        let p = ctx.patient();
        let found = find_by_name(raw, &p.first_name, &p.last_name).is_some();
        Validation::from_bool(
            "Created Patient Found",
            found,
            format!("{} in patient list", p.full_name()),
        )
    })
    .extract(|raw, ctx| {
        let p = ctx.patient();
        let uuid = uuid_of(find_by_name(raw, &p.first_name, &p.last_name)).ok_or_else(|| {
            StepError::ExtractionFailed {
                field: "patientId".to_string(),
            }
        })?;
        Ok(ContextUpdate::new()
            .set(ContextField::PatientId, uuid)
            .note("patientUuid", uuid)
            .note("patientName", p.full_name()))
    })
}

fn book_appointment(tenant: String, today: NaiveDate) -> StepSpec {
    let date = next_weekday(today, AVAILABILITY_DAY);
    let (start, end) = appointment_window(date, BOOKING_HOUR_UTC, SLOT_MINUTES);
    let shown_start = start.clone();
    let accepted = Outcome::AnyStatus(vec![200, 201]);

    StepSpec::new(
        "Book Appointment",
        &format!("POST {}", APPOINTMENT_PATH),
        move |ctx| {
            ActionRequest::Api(authed(ctx, "POST", APPOINTMENT_PATH).json(merged(vec![
                json!({
                    "mode": "VIRTUAL",
                    "patientId": ctx.patient_id.clone().unwrap_or_default(),
                    "customForms": null,
                    "visit_type": "",
                    "type": "NEW",
                    "paymentType": "CASH",
                    "providerId": ctx.provider_id.clone().unwrap_or_default(),
                    "startTime": start,
                    "endTime": end,
                    "insurance_type": "",
                    "note": "",
                    "authorization": "",
                    "forms": [],
                    "chiefComplaint": "appointment test",
                }),
                json!({
                    "isRecurring": false,
                    "recurringFrequency": "daily",
                    "reminder_set": false,
                    "endType": "never",
                    "endDate": start,
                    "endAfter": 5,
                    "customFrequency": 1,
                    "customFrequencyUnit": "days",
                    "selectedWeekdays": [],
                    "reminder_before_number": 1,
                    "timezone": "EST",
                    "duration": SLOT_MINUTES,
                    "xTENANTID": tenant,
                }),
            ])))
        },
    )
    .requires(ContextField::AccessToken)
    .requires(ContextField::ProviderId)
    .requires(ContextField::PatientId)
    .expect(accepted.clone())
    .snapshot(move |ctx| {
        [
            (
                "patientId".to_string(),
                ctx.patient_id.clone().unwrap_or_default(),
            ),
            (
                "providerId".to_string(),
                ctx.provider_id.clone().unwrap_or_default(),
            ),
            ("appointmentTime".to_string(), shown_start.clone()),
            ("duration".to_string(), format!("{} minutes", SLOT_MINUTES)),
            ("mode".to_string(), "VIRTUAL".to_string()),
        ]
        .into()
    })
    .validate(checks::status(accepted))
    .validate(checks::message(|_| "Appointment booked successfully.".to_string()))
}
