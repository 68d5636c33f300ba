//! Query Parameter Validator
//!
//! Field checks are aggregated so every malformed field is reported at once.
//! The `endAt >= startAt` rule only runs when both bounds parsed.

use chrono::{DateTime, Utc};
use pulse_core::WebsiteId;
use serde::Deserialize;
use std::borrow::Cow;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::types::{EventDataFilter, EventValueQuery, TimeRange};

pub const WEBSITE_ID: &str = "websiteId";
pub const START_AT: &str = "startAt";
pub const END_AT: &str = "endAt";

/// Raw query string, before any checks
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesQueryParams {
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub event_name: Option<String>,
    pub property_name: Option<String>,
}

fn violation(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn parse_website_id(raw: &str) -> Result<WebsiteId, ValidationError> {
    // Only the canonical hyphenated form is accepted
    if raw.len() != 36 {
        return Err(violation("uuid", "websiteId must be a valid UUID"));
    }
    Uuid::parse_str(raw)
        .map(WebsiteId)
        .map_err(|_| violation("uuid", "websiteId must be a valid UUID"))
}

fn parse_epoch_millis(field: &'static str, raw: Option<&str>) -> Result<(i64, DateTime<Utc>), ValidationError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| violation("required", format!("{} is required", field)))?;

    let millis = parse_integer(raw)
        .ok_or_else(|| violation("integer", format!("{} must be an integer", field)))?;

    let instant = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        let mut error = violation("range", format!("{} is outside the supported time range", field));
        error.add_param(Cow::Borrowed("value"), &millis);
        error
    })?;

    Ok((millis, instant))
}

/// Any numeric literal with no fractional part, so `1000`, `1000.0` and `1e3` agree
fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let n: f64 = raw.parse().ok()?;
    (n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64).then_some(n as i64)
}

fn optional_filter(raw: &Option<String>) -> Option<String> {
    raw.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Validate a values request into a typed query.
pub fn validate_values_request(
    website_id: &str,
    params: &ValuesQueryParams,
) -> Result<EventValueQuery, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let website_id = parse_website_id(website_id)
        .map_err(|e| errors.add(WEBSITE_ID, e))
        .ok();
    let start = parse_epoch_millis(START_AT, params.start_at.as_deref())
        .map_err(|e| errors.add(START_AT, e))
        .ok();
    let end = parse_epoch_millis(END_AT, params.end_at.as_deref())
        .map_err(|e| errors.add(END_AT, e))
        .ok();

    let range = match (start, end) {
        (Some((start_ms, start_at)), Some((end_ms, end_at))) => {
            let range = TimeRange::new(start_at, end_at);
            if range.is_none() {
                for field in [START_AT, END_AT] {
                    let mut error = violation("range_order", "endAt must be greater than or equal to startAt");
                    error.add_param(Cow::Borrowed("startAt"), &start_ms);
                    error.add_param(Cow::Borrowed("endAt"), &end_ms);
                    errors.add(field, error);
                }
            }
            range
        }
        _ => None,
    };

    match (website_id, range) {
        (Some(website_id), Some(range)) if errors.is_empty() => Ok(EventValueQuery {
            website_id,
            range,
            filter: EventDataFilter {
                event_name: optional_filter(&params.event_name),
                property_name: optional_filter(&params.property_name),
            },
        }),
        _ => Err(errors),
    }
}

/// Error bag for a query string that could not be decoded at all
pub fn malformed_query(detail: impl Into<Cow<'static, str>>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add("query", violation("malformed", detail));
    errors
}
