//! Legacy forum database reached over the PostgreSQL protocol
//!
//! Each stage is read with the `fetch` query configured for it. The query is
//! bound with the last processed key (`-1` before the first page) and the
//! page size, and must order its rows by the key in its first column. A
//! column named `id` becomes the legacy id; otherwise the key is used. A
//! JSON object column named `row` is flattened into the row fields.

use super::client::PgClient;
use crate::adapters::source::{SourceAdapter, SourceResult};
use crate::config::StageQuery;
use crate::domain::errors::SourceError;
use crate::domain::ids::LegacyId;
use crate::domain::row::SourceRow;
use crate::domain::stage::Stage;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_postgres::types::Type;
use tokio_postgres::Row;

/// Column promoted to the legacy id
const LEGACY_ID_COLUMN: &str = "id";

/// JSON object column whose entries are flattened into the row fields
const ROW_COLUMN: &str = "row";

pub struct PostgresSource {
    client: Arc<PgClient>,
    queries: BTreeMap<Stage, StageQuery>,
}

impl PostgresSource {
    pub fn new(client: Arc<PgClient>, queries: BTreeMap<Stage, StageQuery>) -> Self {
        Self { client, queries }
    }

    async fn connection(&self) -> SourceResult<deadpool_postgres::Object> {
        self.client
            .get()
            .await
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl SourceAdapter for PostgresSource {
    fn name(&self) -> &str {
        "postgresql"
    }

    async fn count(&self, stage: Stage) -> SourceResult<u64> {
        let Some(sql) = self.queries.get(&stage).and_then(|q| q.count.as_deref()) else {
            return Ok(0);
        };
        let conn = self.connection().await?;
        let row = conn
            .query_one(sql, &[])
            .await
            .map_err(|e| SourceError::QueryFailed(format!("{stage} count: {e}")))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| SourceError::InvalidRow(format!("{stage} count: {e}")))?;
        Ok(count.max(0) as u64)
    }

    async fn fetch(
        &self,
        stage: Stage,
        after: Option<i64>,
        limit: usize,
    ) -> SourceResult<Vec<SourceRow>> {
        let Some(query) = self.queries.get(&stage) else {
            tracing::debug!(stage = %stage, "No query configured, stage has no rows");
            return Ok(Vec::new());
        };
        let conn = self.connection().await?;
        let after = after.unwrap_or(-1);
        let limit = limit as i64;
        let rows = conn
            .query(query.fetch.as_str(), &[&after, &limit])
            .await
            .map_err(|e| SourceError::QueryFailed(format!("{stage} fetch: {e}")))?;

        rows.iter().map(source_row).collect()
    }
}

fn source_row(row: &Row) -> SourceResult<SourceRow> {
    let key = match row.columns().first().map(|c| c.type_().clone()) {
        Some(Type::INT8) => row.try_get::<_, i64>(0),
        Some(Type::INT4) => row.try_get::<_, i32>(0).map(i64::from),
        Some(Type::INT2) => row.try_get::<_, i16>(0).map(i64::from),
        other => {
            return Err(SourceError::InvalidRow(format!(
                "first column must be an integer key, got {other:?}"
            )))
        }
    }
    .map_err(|e| SourceError::InvalidRow(format!("key column: {e}")))?;

    let mut fields = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        match (column.name(), column_value(row, idx, column.type_())?) {
            (ROW_COLUMN, Value::Object(nested)) => {
                for (name, value) in nested {
                    fields.entry(name).or_insert(value);
                }
            }
            (name, value) => {
                fields.insert(name.to_string(), value);
            }
        }
    }

    let legacy_id = match fields.get(LEGACY_ID_COLUMN) {
        Some(Value::Number(n)) => LegacyId::new(n.to_string()).ok(),
        Some(Value::String(s)) => LegacyId::new(s.as_str()).ok(),
        _ => None,
    }
    .unwrap_or_else(|| LegacyId::from(key));

    SourceRow::with_legacy_id(key, legacy_id, Value::Object(fields))
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> SourceResult<Value> {
    let invalid = |e: tokio_postgres::Error| SourceError::InvalidRow(format!("column {idx}: {e}"));

    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(invalid)?.map(Value::from),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map_err(invalid)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map_err(invalid)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(invalid)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).map_err(invalid)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map_err(invalid)?.map(Value::from),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(idx).map_err(invalid)?.map(Value::from)
        }
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx).map_err(invalid)?,
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(invalid)?
            .map(|ts| Value::from(ts.to_rfc3339())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(invalid)?
            .map(|ts| Value::from(ts.and_utc().to_rfc3339())),
        Type::INT4_ARRAY => row
            .try_get::<_, Option<Vec<i32>>>(idx)
            .map_err(invalid)?
            .map(Value::from),
        Type::INT8_ARRAY => row
            .try_get::<_, Option<Vec<i64>>>(idx)
            .map_err(invalid)?
            .map(Value::from),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => row
            .try_get::<_, Option<Vec<String>>>(idx)
            .map_err(invalid)?
            .map(Value::from),
        _ => {
            tracing::debug!(column = idx, pg_type = %ty, "Unsupported column type read as null");
            None
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
