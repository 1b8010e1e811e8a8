use async_trait::async_trait;
use sqlx::{Postgres, Row, postgres::PgArguments, query::Query};

use crate::{
    adapters::persistence::{PostgresPersistence, parse_status},
    app_error::AppResult,
    application::use_cases::payment::{TransactionProfile, TransactionRecord, TransactionRepo},
};

const SELECT_COLS: &str = r#"
    id, order_id, provider, provider_txn_id, method,
    amount::BIGINT AS amount_vnd, status, message, raw_payload
"#;

fn row_to_profile(row: sqlx::postgres::PgRow) -> AppResult<TransactionProfile> {
    let status: String = row.get("status");
    let raw_payload: Option<serde_json::Value> = row.get("raw_payload");
    Ok(TransactionProfile {
        id: row.get("id"),
        order_id: row.get("order_id"),
        provider: row.get("provider"),
        provider_txn_id: row.get("provider_txn_id"),
        method: row.get("method"),
        amount_vnd: row.get("amount_vnd"),
        status: parse_status(&status, "transactions.status")?,
        message: row.get("message"),
        raw_payload: raw_payload.unwrap_or(serde_json::Value::Null),
    })
}

#[async_trait]
impl TransactionRepo for PostgresPersistence {
    async fn find_by_order(&self, order_id: i64) -> AppResult<Option<TransactionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM transactions WHERE order_id = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(row_to_profile).transpose()
    }

    async fn upsert(&self, record: TransactionRecord) -> AppResult<TransactionProfile> {
        let sql = upsert_sql();
        let row = bind_record(sqlx::query(&sql), &record)
            .fetch_one(self.pool())
            .await?;
        row_to_profile(row)
    }
}

/// One row per order; requires a unique index on transactions(order_id).
pub(super) fn upsert_sql() -> String {
    format!(
        r#"
        INSERT INTO transactions (
            order_id, provider, provider_txn_id, method, amount, status,
            message, raw_payload, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5::NUMERIC, $6, $7, $8, NOW(), NOW())
        ON CONFLICT (order_id) DO UPDATE SET
            provider = EXCLUDED.provider,
            provider_txn_id = EXCLUDED.provider_txn_id,
            method = EXCLUDED.method,
            amount = EXCLUDED.amount,
            status = EXCLUDED.status,
            message = EXCLUDED.message,
            raw_payload = EXCLUDED.raw_payload,
            updated_at = NOW()
        RETURNING {SELECT_COLS}
        "#
    )
}

pub(super) fn bind_record<'q>(
    query: Query<'q, Postgres, PgArguments>,
    record: &'q TransactionRecord,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(record.order_id)
        .bind(&record.provider)
        .bind(&record.provider_txn_id)
        .bind(&record.method)
        .bind(record.amount_vnd)
        .bind(record.status.as_ref())
        .bind(&record.message)
        .bind(&record.raw_payload)
}
