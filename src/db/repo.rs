use crate::model::{QueueItem, RecordKind};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let opts = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database URL {normalized}"))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    // Enable WAL and stricter durability. Enqueue must not return before
    // the write reaches disk.
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and make sure the
/// parent directory exists. In-memory URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }
    let path = rest.trim_start_matches("//");
    if path.is_empty() {
        return url.to_string();
    }

    let expanded = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    format!("sqlite://{expanded}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Append a record to the queue. Returns the client-generated id only after
/// the insert has committed; on error the record was not saved and the
/// caller must inform the user.
#[instrument(skip_all)]
pub async fn enqueue_item(
    pool: &Pool,
    kind: RecordKind,
    payload: &serde_json::Value,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO queue (id, kind, payload, created_at, attempts) VALUES (?, ?, ?, ?, 0)")
        .bind(&id)
        .bind(kind.as_str())
        .bind(payload.to_string())
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("failed to persist queued record")?;
    Ok(id)
}

/// Current queue contents in enqueue order. Read-only.
#[instrument(skip_all)]
pub async fn read_all(pool: &Pool) -> Result<Vec<QueueItem>> {
    let rows = sqlx::query(
        "SELECT id, kind, payload, created_at, attempts FROM queue ORDER BY position ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(item_from_row).collect()
}

/// Claim the whole queue for a sync pass: select everything and delete it
/// in one transaction, so no enqueue can slip between snapshot and drain.
#[instrument(skip_all)]
pub async fn take_all(pool: &Pool) -> Result<Vec<QueueItem>> {
    let mut tx = pool.begin().await?;
    let rows = sqlx::query(
        "SELECT id, kind, payload, created_at, attempts FROM queue ORDER BY position ASC",
    )
    .fetch_all(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM queue").execute(&mut *tx).await?;
    tx.commit().await?;
    rows.into_iter().map(item_from_row).collect()
}

/// Write failed items back, preserving their ids, timestamps and attempt
/// counts. They land behind anything enqueued since the pass started.
#[instrument(skip_all)]
pub async fn push_back(pool: &Pool, items: &[QueueItem]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for item in items {
        sqlx::query(
            "INSERT INTO queue (id, kind, payload, created_at, attempts) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(item.kind.as_str())
        .bind(item.payload.to_string())
        .bind(item.created_at)
        .bind(item.attempts)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn queue_depth(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn last_sync_at(pool: &Pool) -> Result<Option<DateTime<Utc>>> {
    let ts: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT last_sync_at FROM sync_meta WHERE id = 1")
            .fetch_one(pool)
            .await?;
    Ok(ts)
}

#[instrument(skip_all)]
pub async fn record_sync_completed(pool: &Pool, completed_at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE sync_meta SET last_sync_at = ? WHERE id = 1")
        .bind(completed_at)
        .execute(pool)
        .await?;
    Ok(())
}

fn item_from_row(row: SqliteRow) -> Result<QueueItem> {
    let id: String = row.get("id");
    let kind_str: String = row.get("kind");
    let kind = RecordKind::parse(&kind_str)
        .ok_or_else(|| anyhow!("queued item {} has unknown kind {}", id, kind_str))?;
    let payload_str: String = row.get("payload");
    let payload = serde_json::from_str(&payload_str)
        .with_context(|| format!("queued item {} has corrupt payload", id))?;
    Ok(QueueItem {
        id,
        kind,
        payload,
        created_at: row.get("created_at"),
        attempts: row.get("attempts"),
    })
}
