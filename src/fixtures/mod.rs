//! Randomised domain fixtures for a suite run.
//!
//! Every generator takes the RNG explicitly so a run can be replayed from a
//! seed. Profiles are created once per run and never mutated afterwards.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, TimeZone, Utc, Weekday};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const FIRST_NAME_STARTS: [&str; 10] = ["Ra", "Sa", "An", "Ki", "Ni", "De", "Pr", "Vi", "Me", "Sh"];
const FIRST_NAME_ENDS: [&str; 10] = [
    "hul", "shi", "ta", "ran", "jay", "sha", "na", "ket", "deep", "a",
];
const LAST_NAME_STARTS: [&str; 10] = [
    "Sha", "Pa", "Me", "Sin", "Ver", "Red", "Gu", "Ag", "Ba", "Cho",
];
const LAST_NAME_ENDS: [&str; 10] = [
    "rma", "tel", "hta", "gh", "ma", "dy", "pta", "wal", "dra", "udh",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }

    /// Label shown in the web app's gender dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: Gender,
}

impl ProviderProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("firstName".to_string(), self.first_name.clone()),
            ("lastName".to_string(), self.last_name.clone()),
            ("email".to_string(), self.email.clone()),
            ("gender".to_string(), self.gender.to_string()),
        ])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub email: String,
    pub birth_date: NaiveDate,
}

impl PatientProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("firstName".to_string(), self.first_name.clone()),
            ("lastName".to_string(), self.last_name.clone()),
            ("gender".to_string(), self.gender.to_string()),
            ("email".to_string(), self.email.clone()),
            ("birthDate".to_string(), self.birth_date.to_string()),
        ])
    }
}

pub fn random_gender<R: Rng + ?Sized>(rng: &mut R) -> Gender {
    if rng.gen_bool(0.5) {
        Gender::Male
    } else {
        Gender::Female
    }
}

/// Eight lowercase letters plus a number below 10000, at `domain`.
pub fn random_email<R: Rng + ?Sized>(rng: &mut R, domain: &str) -> String {
    let local: String = (0..8)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect();
    format!("{}{}@{}", local, rng.gen_range(0..10000), domain)
}

fn syllable_name<R: Rng + ?Sized>(rng: &mut R, starts: &[&str], ends: &[&str]) -> String {
    let start = starts.choose(rng).copied().unwrap_or_default();
    let end = ends.choose(rng).copied().unwrap_or_default();
    format!("{start}{end}")
}

/// Provider names come from the faker; the email carries `created_at` in
/// milliseconds so repeated runs never collide on the unique-email constraint.
pub fn generate_provider<R: Rng + ?Sized>(rng: &mut R, created_at: DateTime<Utc>) -> ProviderProfile {
    let first_name: String = FirstName().fake_with_rng(rng);
    let last_name: String = LastName().fake_with_rng(rng);
    let email = format!(
        "{}.{}.{}@test.com",
        first_name.to_lowercase(),
        last_name.to_lowercase(),
        created_at.timestamp_millis()
    )
    .replace(['\'', ' '], "");

    ProviderProfile {
        first_name,
        last_name,
        email,
        gender: random_gender(rng),
    }
}

pub fn generate_patient<R: Rng + ?Sized>(rng: &mut R, email_domain: &str) -> PatientProfile {
    let first_name = syllable_name(rng, &FIRST_NAME_STARTS, &FIRST_NAME_ENDS);
    let last_name = syllable_name(rng, &LAST_NAME_STARTS, &LAST_NAME_ENDS);
    let gender = random_gender(rng);
    let email = random_email(rng, email_domain);

    let earliest = NaiveDate::from_ymd_opt(1950, 1, 1).unwrap_or_default();
    let birth_date = earliest + Duration::days(rng.gen_range(0..(55 * 365)));

    PatientProfile {
        first_name,
        last_name,
        gender,
        email,
        birth_date,
    }
}

/// First date strictly after `from` that falls on `weekday`.
pub fn next_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = from.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut delta = (target - current).rem_euclid(7);
    if delta == 0 {
        delta = 7;
    }
    from + Duration::days(delta)
}

/// RFC 3339 start/end (millisecond precision, `Z` suffix) of a booking on
/// `date` at `hour_utc`:00 lasting `minutes`.
pub fn appointment_window(date: NaiveDate, hour_utc: u32, minutes: i64) -> (String, String) {
    let naive = date
        .and_hms_opt(hour_utc.min(23), 0, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
    let start = Utc.from_utc_datetime(&naive);
    let end = start + Duration::minutes(minutes);
    (
        start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}
