use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppResult,
    application::use_cases::payment::{StudyPackProfile, StudyPackRepo},
};

#[async_trait]
impl StudyPackRepo for PostgresPersistence {
    async fn get_active(&self, pack_id: i64) -> AppResult<Option<StudyPackProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price::BIGINT AS price_vnd, duration_days
            FROM study_packs
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(pack_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| StudyPackProfile {
            id: row.get("id"),
            name: row.get("name"),
            price_vnd: row.get("price_vnd"),
            duration_days: row.get("duration_days"),
        }))
    }
}
