//! # Till Repository
//!
//! Persistence of cash-register sessions.
//!
//! ## Queries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  current(station)       the station's OPEN till, if any                │
//! │  last_opened(station)   most recently opened till, any status          │
//! │  last_closed(station)   most recently closed till (cash carry-over)    │
//! │                                                                         │
//! │  insert / update        inside the caller's transaction                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The one-open-till-per-station invariant is backed by the partial unique
//! index `idx_tills_one_open`; a violating insert fails with
//! [`DbError::UniqueViolation`].

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::DbTransaction;
use caixa_core::Till;

const SELECT_TILL: &str = r#"
    SELECT
        id,
        station_id,
        status,
        opening_date,
        closing_date,
        initial_cash_cents,
        final_cash_cents,
        created_at
    FROM tills
"#;

/// Repository for till database operations.
#[derive(Debug, Clone)]
pub struct TillRepository {
    pool: SqlitePool,
}

impl TillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TillRepository { pool }
    }

    /// Gets a till by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Till>> {
        let sql = format!("{SELECT_TILL} WHERE id = ?1");
        let till = sqlx::query_as::<_, Till>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(till)
    }

    /// Returns the open till of a station.
    pub async fn current(&self, station_id: &str) -> DbResult<Option<Till>> {
        fetch_current(&self.pool, station_id).await
    }

    /// Returns the station's most recently opened till, whatever its status.
    pub async fn last_opened(&self, station_id: &str) -> DbResult<Option<Till>> {
        fetch_last_opened(&self.pool, station_id).await
    }

    /// Returns the station's most recently closed till.
    pub async fn last_closed(&self, station_id: &str) -> DbResult<Option<Till>> {
        fetch_last_closed(&self.pool, station_id).await
    }

    /// Same as [`last_opened`](Self::last_opened), inside a transaction.
    pub async fn last_opened_in(
        &self,
        tx: &mut DbTransaction,
        station_id: &str,
    ) -> DbResult<Option<Till>> {
        fetch_last_opened(&mut **tx, station_id).await
    }

    /// Same as [`last_closed`](Self::last_closed), inside a transaction.
    pub async fn last_closed_in(
        &self,
        tx: &mut DbTransaction,
        station_id: &str,
    ) -> DbResult<Option<Till>> {
        fetch_last_closed(&mut **tx, station_id).await
    }

    /// Number of tills ever created for a station.
    pub async fn count_for_station(&self, station_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tills WHERE station_id = ?1")
            .bind(station_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Inserts a till inside the caller's transaction.
    pub async fn insert(&self, tx: &mut DbTransaction, till: &Till) -> DbResult<()> {
        debug!(id = %till.id, station_id = %till.station_id, status = ?till.status, "Inserting till");

        sqlx::query(
            r#"
            INSERT INTO tills (
                id, station_id, status,
                opening_date, closing_date,
                initial_cash_cents, final_cash_cents,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&till.id)
        .bind(&till.station_id)
        .bind(till.status)
        .bind(till.opening_date)
        .bind(till.closing_date)
        .bind(till.initial_cash_cents)
        .bind(till.final_cash_cents)
        .bind(till.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Writes a till's status, dates and cash counts inside the caller's
    /// transaction.
    pub async fn update(&self, tx: &mut DbTransaction, till: &Till) -> DbResult<()> {
        debug!(id = %till.id, status = ?till.status, "Updating till");

        let result = sqlx::query(
            r#"
            UPDATE tills SET
                status = ?2,
                opening_date = ?3,
                closing_date = ?4,
                initial_cash_cents = ?5,
                final_cash_cents = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&till.id)
        .bind(till.status)
        .bind(till.opening_date)
        .bind(till.closing_date)
        .bind(till.initial_cash_cents)
        .bind(till.final_cash_cents)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Till", &till.id));
        }

        Ok(())
    }
}

async fn fetch_current<'e, E>(executor: E, station_id: &str) -> DbResult<Option<Till>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{SELECT_TILL} WHERE station_id = ?1 AND status = 'open'");
    let till = sqlx::query_as::<_, Till>(&sql)
        .bind(station_id)
        .fetch_optional(executor)
        .await?;
    Ok(till)
}

async fn fetch_last_opened<'e, E>(executor: E, station_id: &str) -> DbResult<Option<Till>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{SELECT_TILL} WHERE station_id = ?1 AND opening_date IS NOT NULL \
         ORDER BY opening_date DESC, created_at DESC LIMIT 1"
    );
    let till = sqlx::query_as::<_, Till>(&sql)
        .bind(station_id)
        .fetch_optional(executor)
        .await?;
    Ok(till)
}

async fn fetch_last_closed<'e, E>(executor: E, station_id: &str) -> DbResult<Option<Till>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{SELECT_TILL} WHERE station_id = ?1 AND status = 'closed' \
         ORDER BY closing_date DESC, created_at DESC LIMIT 1"
    );
    let till = sqlx::query_as::<_, Till>(&sql)
        .bind(station_id)
        .fetch_optional(executor)
        .await?;
    Ok(till)
}

// =============================================================================
// Unit Tests
// =============================================================================
