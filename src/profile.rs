//! # Company Profile Module
//!
//! The structured document the summarizer is asked to produce, and the
//! validator that turns raw model output into it.
//!
//! A `CompanyProfile` only exists once `validate` has accepted the text:
//! the required fields (`title`, `summary`, `company_name` and every
//! employee's `name`) are present, non-null, strings and not blank, and
//! every optional field has the expected type. Nothing is repaired except
//! a single Markdown code fence wrapped around the whole document.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

/// Fields that must hold a non-blank string
pub const REQUIRED_FIELDS: [&str; 3] = ["title", "summary", "company_name"];

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*```[A-Za-z]*\s*(.*?)\s*```\s*\z").expect("code fence regex")
});

static PROFILE_SCHEMA: LazyLock<String> = LazyLock::new(|| {
    serde_json::to_string_pretty(&schemars::schema_for!(CompanyProfile)).unwrap_or_default()
});

/// A person named on the website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Employee {
    /// REQUIRED: The name of the person.
    pub name: String,

    /// The title of the person.
    #[serde(default)]
    pub title: Option<String>,

    /// The position of the person.
    #[serde(default)]
    pub position: Option<String>,

    /// The location of the person.
    #[serde(default)]
    pub location: Option<String>,
}

/// Structured summary of a company website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CompanyProfile {
    /// REQUIRED: The title of the website to summarize.
    pub title: String,

    /// REQUIRED: The summary of the website's content.
    pub summary: String,

    /// REQUIRED: The name of the company.
    pub company_name: String,

    /// The industry that this company is in.
    #[serde(default)]
    pub industry: Option<String>,

    /// Any employees identified in the website.
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "Vec<Employee>")]
    pub employees: Vec<Employee>,

    /// The value proposition of the company.
    #[serde(default)]
    pub value_proposition: Option<String>,

    /// Competing firms to the company.
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "Vec<String>")]
    pub competition: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why model output was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedOutputError {
    /// The output does not parse as JSON
    #[error("Output is not valid JSON: {0}")]
    NotJson(String),

    /// The output parses but is not a JSON object
    #[error("Output is not a JSON object")]
    NotAnObject,

    /// A required field is absent or null
    #[error("Required field '{0}' is missing")]
    MissingField(&'static str),

    /// A required field is an empty or whitespace-only string
    #[error("Required field '{0}' is empty")]
    EmptyField(&'static str),

    /// A field holds a value of the wrong type
    #[error("Field '{field}' must be {expected}")]
    InvalidField {
        /// Path of the offending field
        field: String,
        /// Expected JSON type
        expected: &'static str,
    },

    /// An employee entry has no usable name
    #[error("Employee {index} has no name")]
    MissingEmployeeName {
        /// Position in the employees list
        index: usize,
    },
}

/// JSON schema of `CompanyProfile`, pretty printed
pub fn profile_schema() -> &'static str {
    &PROFILE_SCHEMA
}

/// Remove a single code fence wrapped around the whole text
pub fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE_RE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Parse raw model output into a `CompanyProfile`
///
/// # Arguments
///
/// * `raw` - The text returned by the final summarization pass
///
/// # Returns
///
/// The profile, or the first violation found
#[instrument(skip(raw), fields(len = raw.len()))]
pub fn validate(raw: &str) -> Result<CompanyProfile, MalformedOutputError> {
    let json = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(json).map_err(|e| MalformedOutputError::NotJson(e.to_string()))?;
    let object = value.as_object().ok_or(MalformedOutputError::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        required_string(object, field)?;
    }
    optional_string(object, "industry", "industry")?;
    optional_string(object, "value_proposition", "value_proposition")?;
    check_employees(object)?;
    check_competition(object)?;

    let profile: CompanyProfile = serde_json::from_value(value).map_err(|e| {
        MalformedOutputError::InvalidField {
            field: e.to_string(),
            expected: "a valid profile",
        }
    })?;
    debug!(
        company = %profile.company_name,
        employees = profile.employees.len(),
        "Validated profile"
    );
    Ok(profile)
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<(), MalformedOutputError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(MalformedOutputError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(MalformedOutputError::EmptyField(field)),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(MalformedOutputError::InvalidField {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

fn optional_string(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<(), MalformedOutputError> {
    match object.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(MalformedOutputError::InvalidField {
            field: path.to_string(),
            expected: "a string or null",
        }),
    }
}

fn check_employees(object: &Map<String, Value>) -> Result<(), MalformedOutputError> {
    let employees = match object.get("employees") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Array(employees)) => employees,
        Some(_) => {
            return Err(MalformedOutputError::InvalidField {
                field: "employees".to_string(),
                expected: "an array",
            });
        }
    };

    for (index, employee) in employees.iter().enumerate() {
        let employee = employee
            .as_object()
            .ok_or_else(|| MalformedOutputError::InvalidField {
                field: format!("employees[{}]", index),
                expected: "an object",
            })?;
        match employee.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => {}
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(MalformedOutputError::MissingEmployeeName { index });
            }
            Some(_) => {
                return Err(MalformedOutputError::InvalidField {
                    field: format!("employees[{}].name", index),
                    expected: "a string",
                });
            }
        }
        for key in ["title", "position", "location"] {
            optional_string(employee, key, &format!("employees[{}].{}", index, key))?;
        }
    }
    Ok(())
}

fn check_competition(object: &Map<String, Value>) -> Result<(), MalformedOutputError> {
    match object.get("competition") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(entries)) => {
            match entries.iter().position(|entry| !entry.is_string()) {
                Some(index) => Err(MalformedOutputError::InvalidField {
                    field: format!("competition[{}]", index),
                    expected: "a string",
                }),
                None => Ok(()),
            }
        }
        Some(_) => Err(MalformedOutputError::InvalidField {
            field: "competition".to_string(),
            expected: "an array of strings",
        }),
    }
}
