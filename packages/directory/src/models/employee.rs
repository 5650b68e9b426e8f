use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use common::storage::BlobKey;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub const FIRST_NAME_MAX: usize = 50;
pub const LAST_NAME_MAX: usize = 50;
pub const EMAIL_MAX: usize = 100;
pub const POSITION_MAX: usize = 100;
pub const DEPARTMENT_MAX: usize = 50;
pub const PHONE_MAX: usize = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Randomly assigned, never reused employee identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(Uuid);

impl EmployeeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EmployeeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl fmt::Debug for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmployeeId({})", self.0)
    }
}

impl FromStr for EmployeeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What went wrong with a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    TooLong { max: usize },
    InvalidEmail,
    InvalidDate,
    Invalid,
}

/// One validation failure. Validation reports every failure, not just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: &'static str, kind: FieldErrorKind) -> Self {
        Self { field, kind }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FieldErrorKind::Required => write!(f, "{} required", self.field),
            FieldErrorKind::TooLong { max } => {
                write!(f, "{} must be at most {max} characters", self.field)
            }
            FieldErrorKind::InvalidEmail => write!(f, "{} is not a valid email address", self.field),
            FieldErrorKind::InvalidDate => {
                write!(f, "{} must be an ISO date (YYYY-MM-DD)", self.field)
            }
            FieldErrorKind::Invalid => write!(f, "{} is invalid", self.field),
        }
    }
}

impl Serialize for FieldError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Candidate employee fields exactly as a caller supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub department: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub hire_date: Option<String>,
}

/// Validated, normalised profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub department: String,
    pub phone: Option<String>,
    pub hire_date: Option<NaiveDate>,
}

impl EmployeeDraft {
    /// Check every field and return all violations found.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        required(&mut errors, "first_name", &self.first_name, FIRST_NAME_MAX);
        required(&mut errors, "last_name", &self.last_name, LAST_NAME_MAX);
        if required(&mut errors, "email", &self.email, EMAIL_MAX)
            && !is_valid_email(self.email.trim())
        {
            errors.push(FieldError::new("email", FieldErrorKind::InvalidEmail));
        }
        required(&mut errors, "position", &self.position, POSITION_MAX);
        required(&mut errors, "department", &self.department, DEPARTMENT_MAX);

        if let Some(phone) = non_blank(&self.phone)
            && phone.chars().count() > PHONE_MAX
        {
            errors.push(FieldError::new(
                "phone",
                FieldErrorKind::TooLong { max: PHONE_MAX },
            ));
        }
        if let Some(date) = non_blank(&self.hire_date)
            && NaiveDate::parse_from_str(date, DATE_FORMAT).is_err()
        {
            errors.push(FieldError::new("hire_date", FieldErrorKind::InvalidDate));
        }

        errors
    }

    /// Validate and convert into trimmed, typed profile fields.
    pub fn into_profile(self) -> Result<Profile, Vec<FieldError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let hire_date = match non_blank(&self.hire_date) {
            Some(date) => Some(
                NaiveDate::parse_from_str(date, DATE_FORMAT)
                    .map_err(|_| vec![FieldError::new("hire_date", FieldErrorKind::InvalidDate)])?,
            ),
            None => None,
        };

        Ok(Profile {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            position: self.position.trim().to_string(),
            department: self.department.trim().to_string(),
            phone: non_blank(&self.phone).map(str::to_owned),
            hire_date,
        })
    }
}

/// Push `Required`/`TooLong` as needed. Returns `true` when the value is present.
fn required(errors: &mut Vec<FieldError>, field: &'static str, value: &str, max: usize) -> bool {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, FieldErrorKind::Required));
        return false;
    }
    if value.chars().count() > max {
        errors.push(FieldError::new(field, FieldErrorKind::TooLong { max }));
    }
    true
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Structural email check: one `@`, a dot-atom local part and a dotted domain
/// of alphanumeric/hyphen labels.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    let local_ok = local
        .split('.')
        .all(|atom| {
            !atom.is_empty()
                && atom
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~-".contains(c))
        });
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    local_ok && domain_ok
}

/// Key used for case-insensitive email comparison.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The stored record could not be decoded into an [`Employee`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed employee record: {0}")]
pub struct FormatError(pub String);

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// An employee profile as persisted in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub department: String,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub hire_date: Option<NaiveDate>,
    /// Durable reference to the profile picture. Access URLs are derived on demand.
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub picture_key: Option<BlobKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// A brand-new employee with both timestamps set to `now` and no picture.
    pub fn create(employee_id: EmployeeId, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            employee_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            position: profile.position,
            department: profile.department,
            phone: profile.phone,
            hire_date: profile.hire_date,
            picture_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the profile fields and refresh `updated_at`.
    pub fn apply(&mut self, profile: Profile, now: DateTime<Utc>) {
        self.first_name = profile.first_name;
        self.last_name = profile.last_name;
        self.email = profile.email;
        self.position = profile.position;
        self.department = profile.department;
        self.phone = profile.phone;
        self.hire_date = profile.hire_date;
        self.touch(now);
    }

    /// Advance `updated_at`; it always moves forward and never precedes `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.updated_at + Duration::microseconds(1);
        self.updated_at = now.max(floor).max(self.created_at);
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Flatten into the document stored by the record store.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("employee_id".into(), self.employee_id.to_string().into());
        record.insert("first_name".into(), self.first_name.clone().into());
        record.insert("last_name".into(), self.last_name.clone().into());
        record.insert("email".into(), self.email.clone().into());
        record.insert("position".into(), self.position.clone().into());
        record.insert("department".into(), self.department.clone().into());
        if let Some(phone) = &self.phone {
            record.insert("phone".into(), phone.clone().into());
        }
        if let Some(date) = self.hire_date {
            record.insert("hire_date".into(), date.format(DATE_FORMAT).to_string().into());
        }
        if let Some(key) = &self.picture_key {
            record.insert("picture_key".into(), key.to_string().into());
        }
        record.insert("created_at".into(), timestamp(self.created_at).into());
        record.insert("updated_at".into(), timestamp(self.updated_at).into());
        record
    }

    /// Decode a stored document. Missing or malformed fields are a [`FormatError`].
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, FormatError> {
        let employee: Self = serde_json::from_value(Value::Object(record.clone()))?;
        if employee.updated_at < employee.created_at {
            return Err(FormatError(format!(
                "updated_at precedes created_at for {}",
                employee.employee_id
            )));
        }
        Ok(employee)
    }
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Older documents store absent optional fields as empty strings.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
