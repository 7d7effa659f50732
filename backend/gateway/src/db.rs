//! Database layer: migrations, donation records, notes and forms.

use std::str::FromStr;

use chrono::Utc;
use donation_flow::DonationStatus;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{GatewayError, Result};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Row shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct DonationRow {
    id: i64,
    form_id: i64,
    status: String,
    transaction_id: Option<String>,
    total: String,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Donation {
    pub id: i64,
    pub form_id: i64,
    pub status: DonationStatus,
    pub transaction_id: Option<String>,
    pub total: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<DonationRow> for Donation {
    type Error = GatewayError;

    fn try_from(row: DonationRow) -> Result<Self> {
        let status = row
            .status
            .parse::<DonationStatus>()
            .map_err(|e| GatewayError::CorruptRecord {
                id: row.id,
                reason: e.to_string(),
            })?;
        let total = Decimal::from_str(&row.total).map_err(|e| GatewayError::CorruptRecord {
            id: row.id,
            reason: format!("total {:?}: {e}", row.total),
        })?;
        Ok(Donation {
            id: row.id,
            form_id: row.form_id,
            status,
            transaction_id: row.transaction_id,
            total,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DonationNote {
    pub id: i64,
    pub donation_id: i64,
    pub note: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DonationForm {
    pub id: i64,
    pub slug: String,
    /// `None` marks a legacy form rendered without a theme.
    pub theme_id: Option<String>,
    pub updated_at: i64,
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

/// Record a freshly submitted donation in `pending` status.
pub async fn insert_donation(pool: &SqlitePool, form_id: i64, total: Decimal) -> Result<Donation> {
    let now = Utc::now().timestamp();
    let id = sqlx::query(
        r#"
        INSERT INTO donations (form_id, status, total, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        "#,
    )
    .bind(form_id)
    .bind(DonationStatus::Pending.as_str())
    .bind(total.to_string())
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_donation(pool, id)
        .await?
        .ok_or(GatewayError::DonationNotFound(id))
}

pub async fn get_donation(pool: &SqlitePool, id: i64) -> Result<Option<Donation>> {
    let row = sqlx::query_as::<_, DonationRow>(
        r#"
        SELECT id, form_id, status, transaction_id, total, created_at, updated_at
        FROM   donations
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(Donation::try_from).transpose()
}

/// Notes for a donation, oldest first.
pub async fn get_notes(pool: &SqlitePool, donation_id: i64) -> Result<Vec<DonationNote>> {
    let rows = sqlx::query_as::<_, DonationNote>(
        r#"
        SELECT id, donation_id, note, created_at
        FROM   donation_notes
        WHERE  donation_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(donation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn add_note(pool: &SqlitePool, donation_id: i64, note: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO donation_notes (donation_id, note, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(donation_id)
    .bind(note)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a partial refund's note once per `refund_key`.
///
/// Returns `false` without writing anything when the refund was already
/// recorded for this donation.
pub async fn record_partial_refund(
    pool: &SqlitePool,
    donation_id: i64,
    refund_key: &str,
    note: &str,
) -> Result<bool> {
    let now = Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO donation_refunds (donation_id, refund_key, created_at) \
         VALUES (?1, ?2, ?3)",
    )
    .bind(donation_id)
    .bind(refund_key)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("INSERT INTO donation_notes (donation_id, note, created_at) VALUES (?1, ?2, ?3)")
        .bind(donation_id)
        .bind(note)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// A status change to apply atomically with its audit notes.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange<'a> {
    /// Status the caller read; the update only lands if it is still current.
    pub expected: DonationStatus,
    pub status: DonationStatus,
    /// Replaces the stored transaction id when present.
    pub transaction_id: Option<&'a str>,
}

/// Compare-and-set a donation's status and append `notes` in one transaction.
///
/// Returns `false` without writing anything when the stored status no longer
/// matches `change.expected`.
pub async fn apply_transition(
    pool: &SqlitePool,
    donation_id: i64,
    change: StatusChange<'_>,
    notes: &[String],
) -> Result<bool> {
    let now = Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE donations
        SET    status = ?1,
               transaction_id = COALESCE(?2, transaction_id),
               updated_at = ?3
        WHERE  id = ?4 AND status = ?5
        "#,
    )
    .bind(change.status.as_str())
    .bind(change.transaction_id)
    .bind(now)
    .bind(donation_id)
    .bind(change.expected.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    for note in notes {
        sqlx::query(
            "INSERT INTO donation_notes (donation_id, note, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(donation_id)
        .bind(note)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

// ─────────────────────────────────────────────────────────
// Forms
// ─────────────────────────────────────────────────────────

pub async fn upsert_form(
    pool: &SqlitePool,
    id: i64,
    slug: &str,
    theme_id: Option<&str>,
) -> Result<DonationForm> {
    sqlx::query(
        r#"
        INSERT INTO donation_forms (id, slug, theme_id, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (id) DO UPDATE
        SET slug = excluded.slug,
            theme_id = excluded.theme_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(slug)
    .bind(theme_id)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return GatewayError::SlugTaken(slug.to_string());
            }
        }
        GatewayError::Database(e)
    })?;

    get_form(pool, id).await?.ok_or(GatewayError::FormNotFound(id))
}

pub async fn get_form(pool: &SqlitePool, id: i64) -> Result<Option<DonationForm>> {
    let form = sqlx::query_as::<_, DonationForm>(
        "SELECT id, slug, theme_id, updated_at FROM donation_forms WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(form)
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
