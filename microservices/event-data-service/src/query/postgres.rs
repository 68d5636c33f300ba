//! PostgreSQL-backed event-data store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_db::{DbPool, FromSql, Row};
use rust_decimal::Decimal;
use tracing::{instrument, warn};

use super::store::{EventDataStore, StoreError};
use crate::types::{DataType, EventDataValue, EventDataValueCount, EventValueQuery};

/// Grouped by the typed projection of each row, so a number row that also carries a
/// `string_value` rendering is still grouped with other numbers only.
const DISTINCT_VALUES_SQL: &str = r#"
    SELECT ed.data_type,
           CASE WHEN ed.data_type IN (1, 3) THEN ed.string_value END AS string_value,
           CASE WHEN ed.data_type = 2 THEN ed.number_value END AS number_value,
           CASE WHEN ed.data_type = 4 THEN ed.date_value END AS date_value,
           COUNT(*) AS total
    FROM event_data ed
    JOIN website_event we ON we.event_id = ed.website_event_id
    WHERE ed.website_id = $1
      AND ed.created_at BETWEEN $2 AND $3
      AND ($4::text IS NULL OR we.event_name = $4)
      AND ($5::text IS NULL OR ed.data_key = $5)
    GROUP BY 1, 2, 3, 4
    ORDER BY 1, 2, 3, 4
"#;

pub struct PgEventDataStore {
    db: DbPool,
}

impl PgEventDataStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    fn row_to_value(row: &Row) -> Option<EventDataValueCount> {
        let code: i32 = Self::column(row, "data_type")?;
        let total: i64 = Self::column(row, "total")?;

        decode_row(
            code,
            Self::column(row, "string_value"),
            Self::column(row, "number_value"),
            Self::column(row, "date_value"),
            total,
        )
    }

    /// Reads a nullable column; a type mismatch is logged and read as NULL
    fn column<T>(row: &Row, name: &str) -> Option<T>
    where
        T: for<'a> FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(name)
            .map_err(|e| warn!(column = name, error = %e, "Unreadable event data column"))
            .ok()
            .flatten()
    }
}

/// Builds a typed value from the projection of one grouped row.
///
/// Returns `None`, with a warning, for unknown type codes and for rows whose
/// payload column for their type is NULL or unparsable.
fn decode_row(
    code: i32,
    string_value: Option<String>,
    number_value: Option<Decimal>,
    date_value: Option<DateTime<Utc>>,
    total: i64,
) -> Option<EventDataValueCount> {
    let Some(data_type) = DataType::from_code(code) else {
        warn!(data_type = code, "Skipping event data with unknown data type");
        return None;
    };

    let value = match data_type {
        DataType::String => string_value.map(EventDataValue::String),
        DataType::Number => number_value.map(EventDataValue::number),
        DataType::Boolean => match string_value.as_deref().map(str::parse::<bool>) {
            Some(Ok(b)) => Some(EventDataValue::Boolean(b)),
            Some(Err(_)) => {
                warn!(value = string_value.as_deref(), "Skipping boolean event data that is not true/false");
                return None;
            }
            None => None,
        },
        DataType::Date => date_value.map(EventDataValue::Date),
    };

    let Some(value) = value else {
        warn!(data_type = data_type.as_str(), "Skipping event data row with empty value column");
        return None;
    };

    Some(EventDataValueCount {
        value,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

#[async_trait]
impl EventDataStore for PgEventDataStore {
    #[instrument(skip(self), fields(website_id = %query.website_id))]
    async fn fetch_values(&self, query: &EventValueQuery) -> Result<Vec<EventDataValueCount>, StoreError> {
        let start_at = query.range.start_at();
        let end_at = query.range.end_at();

        let rows = self
            .db
            .query(
                DISTINCT_VALUES_SQL,
                &[
                    &query.website_id.0,
                    &start_at,
                    &end_at,
                    &query.filter.event_name,
                    &query.filter.property_name,
                ],
            )
            .await?;

        Ok(rows.iter().filter_map(Self::row_to_value).collect())
    }

    async fn is_healthy(&self) -> bool {
        self.db.is_healthy().await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
