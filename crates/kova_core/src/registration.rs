//! crates/kova_core/src/registration.rs
//!
//! The three-step sign-up wizard: account, profile, consent.
//!
//! The wizard owns its draft and writes it through the `DraftStore` it was mounted
//! with after every change, so a reload resumes where the user left off. The draft
//! never carries the password.

use crate::domain::{PhotoPosition, Profile, RecoveryQuestion};
use crate::ports::{DraftStore, GeocodingService, PortError};
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const TOTAL_STEPS: usize = 3;
pub const MIN_AGE: u32 = 16;
pub const MIN_PASSWORD_LEN: usize = 6;

pub const SECURITY_QUESTIONS: &[&str] = &[
    "What was the name of your first business?",
    "What city were you born in?",
    "What was the name of your first pet?",
    "What is your favorite book?",
];

pub const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

const AVATAR_PLACEHOLDER_BASE: &str = "https://ui-avatars.com/api/";

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email.trim())
}

/// Whole years between `dob` and `today`, both taken as UTC calendar dates.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    if dob > today {
        return 0;
    }
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub fn parse_date_of_birth(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

//=========================================================================================
// Draft
//=========================================================================================

/// Where the city lookup stands for the city/state pair currently on the draft.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationStatus {
    #[default]
    Unchecked,
    Verified {
        city: String,
        state: String,
    },
    NotFound,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationDraft {
    #[serde(deserialize_with = "clamped_step")]
    pub step: usize,
    // Account
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    pub security_question: String,
    pub security_answer: String,
    // Profile
    pub date_of_birth: String,
    pub city: String,
    pub state: String,
    pub location: LocationStatus,
    pub headline: String,
    pub industry: String,
    pub looking_for: String,
    pub skills: Vec<String>,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub photo_position: PhotoPosition,
    // Consent
    pub accept_terms: bool,
    pub accept_privacy: bool,
    pub confirm_age: bool,
}

impl Default for RegistrationDraft {
    fn default() -> Self {
        Self {
            step: 0,
            name: String::new(),
            email: String::new(),
            password: String::new(),
            confirm_password: String::new(),
            security_question: SECURITY_QUESTIONS[0].to_string(),
            security_answer: String::new(),
            date_of_birth: String::new(),
            city: String::new(),
            state: String::new(),
            location: LocationStatus::Unchecked,
            headline: String::new(),
            industry: String::new(),
            looking_for: String::new(),
            skills: Vec::new(),
            bio: String::new(),
            avatar_url: None,
            photo_position: PhotoPosition::default(),
            accept_terms: false,
            accept_privacy: false,
            confirm_age: false,
        }
    }
}

/// Restored step values are clamped into range instead of trusted.
fn clamped_step<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(0, TOTAL_STEPS as i64 - 1) as usize)
}

impl RegistrationDraft {
    fn location_is_verified(&self) -> bool {
        matches!(
            &self.location,
            LocationStatus::Verified { city, state } if city == self.city.trim() && state == &self.state
        )
    }
}

/// A set of field edits coming from the form. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DraftEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub security_question: Option<String>,
    pub security_answer: Option<String>,
    pub date_of_birth: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub headline: Option<String>,
    pub industry: Option<String>,
    pub looking_for: Option<String>,
    pub skills: Option<Vec<String>>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub photo_position: Option<PhotoPosition>,
    pub accept_terms: Option<bool>,
    pub accept_privacy: Option<bool>,
    pub confirm_age: Option<bool>,
}

//=========================================================================================
// Validation
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    Password,
    ConfirmPassword,
    SecurityAnswer,
    DateOfBirth,
    City,
    State,
    Location,
    Terms,
    Privacy,
    AgeConfirmation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    fn remove(&mut self, field: Field) {
        self.0.remove(&field);
    }
}

/// Synchronous checks for one step. The async location gate is separate.
pub fn validate_step(draft: &RegistrationDraft, step: usize, today: NaiveDate) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    match step {
        0 => {
            if draft.name.trim().is_empty() {
                errors.insert(Field::Name, "Name is required");
            }
            if draft.email.trim().is_empty() {
                errors.insert(Field::Email, "Email is required");
            } else if !is_valid_email(&draft.email) {
                errors.insert(Field::Email, "Enter a valid email address");
            }
            if draft.password.is_empty() {
                errors.insert(Field::Password, "Password is required");
            } else if draft.password.chars().count() < MIN_PASSWORD_LEN {
                errors.insert(
                    Field::Password,
                    format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
                );
            }
            if draft.confirm_password.is_empty() {
                errors.insert(Field::ConfirmPassword, "Please confirm your password");
            } else if draft.confirm_password != draft.password {
                errors.insert(Field::ConfirmPassword, "Passwords do not match");
            }
            if draft.security_answer.trim().is_empty() {
                errors.insert(Field::SecurityAnswer, "Security answer is required");
            }
        }
        1 => {
            match parse_date_of_birth(&draft.date_of_birth) {
                None => errors.insert(Field::DateOfBirth, "Date of birth is required"),
                Some(dob) if age_on(dob, today) < MIN_AGE => errors.insert(
                    Field::DateOfBirth,
                    format!("You must be at least {MIN_AGE} years old"),
                ),
                Some(_) => {}
            }
            if draft.city.trim().is_empty() {
                errors.insert(Field::City, "City is required");
            }
            if draft.state.is_empty() {
                errors.insert(Field::State, "Select a state");
            } else if !US_STATES.contains(&draft.state.as_str()) {
                errors.insert(Field::State, "Select a valid state");
            }
        }
        _ => {
            if !draft.accept_terms {
                errors.insert(Field::Terms, "You must accept the terms of service");
            }
            if !draft.accept_privacy {
                errors.insert(Field::Privacy, "You must accept the privacy policy");
            }
            if !draft.confirm_age {
                errors.insert(Field::AgeConfirmation, "You must confirm your age");
            }
        }
    }
    errors
}

//=========================================================================================
// Wizard
//=========================================================================================

/// Everything the auth flow needs to create the account.
#[derive(Debug, Clone)]
pub struct RegistrationSubmission {
    /// `id` is a placeholder until the identity service assigns one.
    pub profile: Profile,
    pub password: String,
    pub recovery: RecoveryQuestion,
}

#[derive(Debug, Clone)]
pub enum NextOutcome {
    Advanced(usize),
    Blocked,
    Submitted(Box<RegistrationSubmission>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    Step(usize),
    /// Back from the first step: the draft is cleared and the caller leaves the wizard.
    Exit,
}

pub struct RegistrationWizard {
    draft: RegistrationDraft,
    errors: ValidationErrors,
    store: Arc<dyn DraftStore>,
    geocoder: Arc<dyn GeocodingService>,
}

impl RegistrationWizard {
    /// Loads the persisted draft, if any.
    pub fn mount(store: Arc<dyn DraftStore>, geocoder: Arc<dyn GeocodingService>) -> Self {
        let draft = store.load().unwrap_or_default();
        Self {
            draft,
            errors: ValidationErrors::default(),
            store,
            geocoder,
        }
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn step(&self) -> usize {
        self.draft.step
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.draft) {
            warn!("Failed to persist registration draft: {}", e);
        }
    }

    /// Applies form edits and saves. Returns `true` when the state selection changed,
    /// which is the caller's cue to re-run the location check.
    pub fn apply(&mut self, edit: DraftEdit) -> bool {
        let d = &mut self.draft;
        let previous_city = d.city.clone();
        let previous_state = d.state.clone();

        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = edit.$field { d.$field = v; })*
            };
        }
        set!(
            name,
            email,
            password,
            confirm_password,
            security_question,
            security_answer,
            date_of_birth,
            city,
            state,
            headline,
            industry,
            looking_for,
            skills,
            bio,
            photo_position,
            accept_terms,
            accept_privacy,
            confirm_age
        );
        if let Some(url) = edit.avatar_url {
            d.avatar_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        if d.city != previous_city || d.state != previous_state {
            d.location = LocationStatus::Unchecked;
        }

        let state_changed = d.state != previous_state;
        self.persist();
        state_changed
    }

    /// Looks the city up. Runs on city blur and on state change.
    pub async fn verify_location(&mut self) -> bool {
        let city = self.draft.city.trim().to_string();
        let state = self.draft.state.clone();
        if city.is_empty() || state.is_empty() {
            self.draft.location = LocationStatus::Unchecked;
            return false;
        }
        if self.draft.location_is_verified() {
            return true;
        }

        let verified = match self.geocoder.verify(&city, Some(&state)).await {
            Ok(true) => {
                self.errors.remove(Field::City);
                self.errors.remove(Field::Location);
                self.draft.location = LocationStatus::Verified { city, state };
                true
            }
            Ok(false) => {
                self.errors.insert(
                    Field::City,
                    format!("We couldn't find {city} in {state}. Check the spelling."),
                );
                self.draft.location = LocationStatus::NotFound;
                false
            }
            Err(e) => {
                warn!("Location lookup failed: {}", e);
                let message = match e {
                    PortError::Network(_) => {
                        "We couldn't verify your location. Check your connection and try again."
                    }
                    _ => "Location verification is unavailable right now. Please try again.",
                };
                self.errors.insert(Field::Location, message);
                self.draft.location = LocationStatus::Failed;
                false
            }
        };
        self.persist();
        verified
    }

    pub async fn next(&mut self) -> NextOutcome {
        self.next_on(Utc::now().date_naive()).await
    }

    /// `next` with an explicit "today", for age checks.
    pub async fn next_on(&mut self, today: NaiveDate) -> NextOutcome {
        let step = self.draft.step;
        self.errors = validate_step(&self.draft, step, today);
        if !self.errors.is_empty() {
            return NextOutcome::Blocked;
        }

        if step == 1 && !self.verify_location().await {
            return NextOutcome::Blocked;
        }

        if step + 1 >= TOTAL_STEPS {
            // A resumed draft comes back without its password.
            let account = validate_step(&self.draft, 0, today);
            if !account.is_empty() {
                self.draft.step = 0;
                self.errors = account;
                self.persist();
                return NextOutcome::Blocked;
            }
            info!("Registration wizard submitted for {}", self.draft.email);
            return NextOutcome::Submitted(Box::new(self.submission()));
        }

        self.draft.step = (step + 1).min(TOTAL_STEPS - 1);
        self.errors.clear();
        self.persist();
        NextOutcome::Advanced(self.draft.step)
    }

    pub fn back(&mut self) -> BackOutcome {
        self.errors.clear();
        if self.draft.step == 0 {
            self.clear();
            return BackOutcome::Exit;
        }
        self.draft.step -= 1;
        self.persist();
        BackOutcome::Step(self.draft.step)
    }

    /// Drops the persisted draft, after a successful sign-up or when abandoning.
    pub fn clear(&mut self) {
        self.store.clear();
        self.draft = RegistrationDraft::default();
    }

    fn submission(&self) -> RegistrationSubmission {
        let d = &self.draft;
        let name = d.name.trim().to_string();
        let city = d.city.trim().to_string();
        let bio = if d.bio.trim().is_empty() {
            default_bio(&name, &city, &d.state)
        } else {
            d.bio.trim().to_string()
        };
        let avatar_url = d
            .avatar_url
            .clone()
            .unwrap_or_else(|| placeholder_avatar(&name));

        let profile = Profile {
            id: Uuid::nil(),
            name,
            email: d.email.trim().to_lowercase(),
            date_of_birth: parse_date_of_birth(&d.date_of_birth),
            city,
            state: d.state.clone(),
            bio,
            avatar_url,
            photo_position: d.photo_position,
            headline: d.headline.trim().to_string(),
            industry: d.industry.trim().to_string(),
            looking_for: d.looking_for.trim().to_string(),
            skills: d
                .skills
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            security_question: d.security_question.clone(),
            created_at: Utc::now(),
        };

        RegistrationSubmission {
            profile,
            password: d.password.clone(),
            recovery: RecoveryQuestion {
                question: d.security_question.clone(),
                answer: d.security_answer.trim().to_string(),
            },
        }
    }
}

pub fn default_bio(name: &str, city: &str, state: &str) -> String {
    let first = name.split_whitespace().next().unwrap_or(name);
    format!("Hi, I'm {first}! I'm an entrepreneur based in {city}, {state}, looking to connect with other builders.")
}

pub fn placeholder_avatar(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => encoded.push(b as char),
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{b:02X}")),
        }
    }
    format!("{AVATAR_PLACEHOLDER_BASE}?name={encoded}&background=random&size=256")
}
