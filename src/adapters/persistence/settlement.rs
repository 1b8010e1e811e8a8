use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::{
        PostgresPersistence, parse_status,
        transaction::{bind_record, upsert_sql},
    },
    app_error::{AppError, AppResult},
    application::use_cases::payment::{SettleOutcome, Settlement, SettlementRepo},
    domain::entities::transaction_status::TransactionStatus,
};

#[async_trait]
impl SettlementRepo for PostgresPersistence {
    async fn settle(&self, settlement: Settlement) -> AppResult<SettleOutcome> {
        let order_id = settlement.order_id;
        let mut tx = self.pool().begin().await?;

        // Concurrent deliveries for the same order queue up here.
        sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?;

        let current = sqlx::query("SELECT status FROM transactions WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = current {
            let status: String = row.get("status");
            let status: TransactionStatus = parse_status(&status, "transactions.status")?;
            if status.is_confirmed() {
                tx.rollback().await?;
                return Ok(SettleOutcome::AlreadyConfirmed);
            }
        }

        if settlement.grant_premium {
            let result = sqlx::query("UPDATE users SET is_premium = TRUE WHERE id = $1")
                .bind(settlement.user_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                tracing::warn!(user_id = settlement.user_id, "Premium upgrade for unknown user");
                return Err(AppError::NotFound);
            }
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, expires_at = COALESCE($3, expires_at), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(settlement.order_status.as_ref())
        .bind(settlement.expires_at)
        .execute(&mut *tx)
        .await?;

        let sql = upsert_sql();
        bind_record(sqlx::query(&sql), &settlement.transaction)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SettleOutcome::Applied)
    }
}
