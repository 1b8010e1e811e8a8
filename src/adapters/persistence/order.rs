use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_status},
    app_error::{AppError, AppResult},
    application::use_cases::payment::{OrderProfile, OrderRepo, StudyPackProfile},
    domain::entities::order_status::OrderStatus,
};

// Prices are numeric(12,2) in whole VND; the fractional part is always zero.
const SELECT_COLS: &str = r#"
    o.id, o.user_id, o.pack_id, sp.name AS pack_name,
    o.price_at_purchase::BIGINT AS price_vnd, o.status,
    o.started_at, o.expires_at, o.created_at
"#;

fn row_to_profile(row: sqlx::postgres::PgRow) -> AppResult<OrderProfile> {
    let status: String = row.get("status");
    Ok(OrderProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        pack_id: row.get("pack_id"),
        pack_name: row.get("pack_name"),
        price_vnd: row.get("price_vnd"),
        status: parse_status(&status, "orders.status")?,
        started_at: row.get("started_at"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl OrderRepo for PostgresPersistence {
    async fn create(&self, user_id: i64, pack: &StudyPackProfile) -> AppResult<OrderProfile> {
        let id: i64 = sqlx::query(
            r#"
            INSERT INTO orders (user_id, pack_id, price_at_purchase, status, started_at, created_at, updated_at)
            VALUES ($1, $2, $3::NUMERIC, $4, NOW(), NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(pack.id)
        .bind(pack.price_vnd)
        .bind(OrderStatus::Pending.as_ref())
        .fetch_one(self.pool())
        .await?
        .get("id");

        self.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    async fn get_by_id(&self, order_id: i64) -> AppResult<Option<OrderProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM orders o LEFT JOIN study_packs sp ON sp.id = o.pack_id WHERE o.id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(row_to_profile).transpose()
    }

    async fn list_by_user(&self, user_id: i64) -> AppResult<Vec<OrderProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM orders o
            LEFT JOIN study_packs sp ON sp.id = o.pack_id
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(row_to_profile).collect()
    }
}
