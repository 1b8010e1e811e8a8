use sqlx::PgPool;

use crate::app_error::AppError;

pub mod order;
pub mod settlement;
pub mod study_pack;
pub mod transaction;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Parse a status column stored as text, reporting corrupt rows as a
/// database error.
pub(crate) fn parse_status<T>(raw: &str, column: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
{
    raw.parse::<T>().map_err(|_| {
        tracing::error!(column, value = raw, "Unknown status value in database");
        AppError::Database(format!("Unknown {column} value"))
    })
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                // PostgreSQL unique violation
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    AppError::Conflict("A record with this value already exists".into())
                }
                // PostgreSQL foreign key violation
                else if msg.contains("foreign key") {
                    AppError::InvalidInput("Referenced record not found".into())
                } else {
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
