//! Access key request validation
//!
//! Request bodies arrive as loose JSON so that a wrong type on one field is
//! reported next to the others instead of failing deserialization outright.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::entity::{AccessKeyFilter, AccessKeyPatch, NewAccessKey};

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All field errors found in one request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Raw list query; every value is still a string at this point
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAccessKeysQuery {
    pub disabled: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

/// Validated status change command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub key: String,
    pub disabled: bool,
}

/// Validate a create request: `userId`, `rateLimit` and `disabled` are
/// required, `expiresAt` is optional
pub fn validate_create_request(body: &Value) -> Result<NewAccessKey, ValidationErrors> {
    let mut errors = Vec::new();
    let Some(fields) = as_object(body, &mut errors) else {
        return Err(ValidationErrors(errors));
    };

    let user_id = required_string(fields, "userId", &mut errors);
    let rate_limit = required_rate_limit(fields, &mut errors);
    let disabled = required_bool(fields, "disabled", &mut errors);
    let expires_at = optional_date(fields, "expiresAt", &mut errors);

    match (user_id, rate_limit, disabled, expires_at) {
        (Some(user_id), Some(rate_limit), Some(disabled), Some(expires_at)) if errors.is_empty() => {
            let mut command = NewAccessKey::new(user_id, rate_limit).with_disabled(disabled);
            command.expires_at = expires_at;
            Ok(command)
        }
        _ => Err(ValidationErrors(errors)),
    }
}

/// Validate an update request: same fields as create minus `userId`
///
/// An omitted `expiresAt` leaves the expiry untouched; an explicit `null`
/// clears it.
pub fn validate_update_request(body: &Value) -> Result<AccessKeyPatch, ValidationErrors> {
    let mut errors = Vec::new();
    let Some(fields) = as_object(body, &mut errors) else {
        return Err(ValidationErrors(errors));
    };

    let rate_limit = required_rate_limit(fields, &mut errors);
    let disabled = required_bool(fields, "disabled", &mut errors);
    let expires_at = if fields.contains_key("expiresAt") {
        optional_date(fields, "expiresAt", &mut errors).map(Some)
    } else {
        Some(None)
    };

    match (rate_limit, disabled, expires_at) {
        (Some(rate_limit), Some(disabled), Some(expires_at)) if errors.is_empty() => {
            Ok(AccessKeyPatch {
                rate_limit: Some(rate_limit),
                expires_at,
                disabled: Some(disabled),
            })
        }
        _ => Err(ValidationErrors(errors)),
    }
}

/// Validate a `{ key, disabled }` status change payload
pub fn validate_status_change(body: &Value) -> Result<StatusChange, ValidationErrors> {
    let mut errors = Vec::new();
    let Some(fields) = as_object(body, &mut errors) else {
        return Err(ValidationErrors(errors));
    };

    let key = required_string(fields, "key", &mut errors);
    let disabled = required_bool(fields, "disabled", &mut errors);

    match (key, disabled) {
        (Some(key), Some(disabled)) => Ok(StatusChange { key, disabled }),
        _ => Err(ValidationErrors(errors)),
    }
}

/// Validate list filters and pagination
pub fn validate_list_query(query: &ListAccessKeysQuery) -> Result<AccessKeyFilter, ValidationErrors> {
    let mut errors = Vec::new();
    let mut filter = AccessKeyFilter::new();

    if let Some(ref disabled) = query.disabled {
        match disabled.as_str() {
            "true" => filter.disabled = Some(true),
            "false" => filter.disabled = Some(false),
            _ => errors.push(FieldError::new("disabled", "must be \"true\" or \"false\"")),
        }
    }

    if let Some(ref user_id) = query.user_id {
        if user_id.trim().is_empty() {
            errors.push(FieldError::new("userId", "must not be empty"));
        } else {
            filter.user_id = Some(user_id.clone());
        }
    }

    if let Some(ref limit) = query.limit {
        match limit.parse::<usize>() {
            Ok(limit) if limit >= 1 => filter.limit = Some(limit),
            _ => errors.push(FieldError::new("limit", "must be an integer not less than 1")),
        }
    }

    if let Some(ref skip) = query.skip {
        match skip.parse::<usize>() {
            Ok(skip) => filter.skip = Some(skip),
            Err(_) => errors.push(FieldError::new("skip", "must be an integer not less than 0")),
        }
    }

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(ValidationErrors(errors))
    }
}

fn as_object<'a>(body: &'a Value, errors: &mut Vec<FieldError>) -> Option<&'a Map<String, Value>> {
    match body.as_object() {
        Some(fields) => Some(fields),
        None => {
            errors.push(FieldError::new("body", "must be a JSON object"));
            None
        }
    }
}

fn required_string(
    fields: &Map<String, Value>,
    name: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match fields.get(name) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(name, "is required"));
            None
        }
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            errors.push(FieldError::new(name, "must not be empty"));
            None
        }
        Some(_) => {
            errors.push(FieldError::new(name, "must be a string"));
            None
        }
    }
}

fn required_bool(
    fields: &Map<String, Value>,
    name: &str,
    errors: &mut Vec<FieldError>,
) -> Option<bool> {
    match fields.get(name) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(name, "is required"));
            None
        }
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            errors.push(FieldError::new(name, "must be a boolean"));
            None
        }
    }
}

fn required_rate_limit(fields: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<u32> {
    match fields.get("rateLimit") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("rateLimit", "is required"));
            None
        }
        Some(Value::Number(n)) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(limit) => Some(limit),
            None => {
                errors.push(FieldError::new(
                    "rateLimit",
                    "must be an integer not less than 0",
                ));
                None
            }
        },
        Some(_) => {
            errors.push(FieldError::new("rateLimit", "must be an integer"));
            None
        }
    }
}

/// `Some(None)` for absent/null, `Some(Some(_))` for a valid date, `None` on error
fn optional_date(
    fields: &Map<String, Value>,
    name: &str,
    errors: &mut Vec<FieldError>,
) -> Option<Option<DateTime<Utc>>> {
    match fields.get(name) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(date) => Some(Some(date.with_timezone(&Utc))),
            Err(_) => {
                errors.push(FieldError::new(name, "must be an RFC 3339 date"));
                None
            }
        },
        Some(Value::Number(n)) => match n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
            Some(date) => Some(Some(date)),
            None => {
                errors.push(FieldError::new(name, "must be a valid timestamp"));
                None
            }
        },
        Some(_) => {
            errors.push(FieldError::new(name, "must be a date"));
            None
        }
    }
}
