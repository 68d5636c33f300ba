//! Event Data Types

use chrono::{DateTime, SecondsFormat, Utc};
use pulse_core::WebsiteId;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Storage type tag of an event property value.
///
/// Discriminants are the codes persisted in `event_data.data_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String = 1,
    Number = 2,
    Boolean = 3,
    Date = 4,
}

impl DataType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::String),
            2 => Some(Self::Number),
            3 => Some(Self::Boolean),
            4 => Some(Self::Date),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }
}

/// A recorded property value together with the type it was stored as.
///
/// Equality and ordering compare the type first, so `5` and `"5"` never collapse.
/// Sorting a list of values therefore groups it by type and orders each group by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventDataValue {
    String(String),
    Number(Decimal),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl EventDataValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Numbers are normalised so `5.0000` and `5` are one value.
    pub fn number(value: Decimal) -> Self {
        Self::Number(value.normalize())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Number(_) => DataType::Number,
            Self::Boolean(_) => DataType::Boolean,
            Self::Date(_) => DataType::Date,
        }
    }
}

impl From<i64> for EventDataValue {
    fn from(value: i64) -> Self {
        Self::number(Decimal::from(value))
    }
}

impl From<i32> for EventDataValue {
    fn from(value: i32) -> Self {
        Self::number(Decimal::from(value))
    }
}

impl From<bool> for EventDataValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for EventDataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for EventDataValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl Serialize for EventDataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EventDataValue", 2)?;
        match self {
            Self::String(v) => state.serialize_field("value", v)?,
            Self::Number(d) => match d.fract().is_zero().then(|| d.to_i64()).flatten() {
                Some(i) => state.serialize_field("value", &i)?,
                None => state.serialize_field("value", &d.to_f64().unwrap_or_default())?,
            },
            Self::Boolean(b) => state.serialize_field("value", b)?,
            Self::Date(dt) => {
                state.serialize_field("value", &dt.to_rfc3339_opts(SecondsFormat::Millis, true))?
            }
        }
        state.serialize_field("type", &self.data_type())?;
        state.end()
    }
}

/// Distinct value plus the number of matching records that carried it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDataValueCount {
    #[serde(flatten)]
    pub value: EventDataValue,
    pub total: u64,
}

/// One stored property value, as the ingestion path wrote it
#[derive(Debug, Clone)]
pub struct EventDataRecord {
    pub website_id: WebsiteId,
    pub event_name: String,
    pub property_name: String,
    pub value: EventDataValue,
    pub created_at: DateTime<Utc>,
}

/// Closed time window; both bounds are inclusive and `start_at <= end_at` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Option<Self> {
        (start_at <= end_at).then_some(Self { start_at, end_at })
    }

    pub fn from_millis(start_ms: i64, end_ms: i64) -> Option<Self> {
        Self::new(
            DateTime::from_timestamp_millis(start_ms)?,
            DateTime::from_timestamp_millis(end_ms)?,
        )
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn end_at(&self) -> DateTime<Utc> {
        self.end_at
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_at <= instant && instant <= self.end_at
    }
}

/// Optional exact-match restrictions; `None` leaves the dimension open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDataFilter {
    pub event_name: Option<String>,
    pub property_name: Option<String>,
}

impl EventDataFilter {
    pub fn matches(&self, event_name: &str, property_name: &str) -> bool {
        self.event_name.as_deref().map_or(true, |e| e == event_name)
            && self.property_name.as_deref().map_or(true, |p| p == property_name)
    }
}

/// Validated distinct-values query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventValueQuery {
    pub website_id: WebsiteId,
    pub range: TimeRange,
    pub filter: EventDataFilter,
}

impl EventValueQuery {
    /// Whether a stored record falls inside this query's scope
    pub fn matches(&self, record: &EventDataRecord) -> bool {
        record.website_id == self.website_id
            && self.range.contains(record.created_at)
            && self.filter.matches(&record.event_name, &record.property_name)
    }
}
