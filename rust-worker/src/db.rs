//! Database helpers: pool setup, migrations and path handling.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Connect to SQLite, creating the backing file if needed.
///
/// In-memory databases are pinned to a single connection, since every
/// SQLite memory connection is its own database.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let url = ensure_sqlite_path(database_url);
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await
}

/// Run SQLite migrations to create tables if absent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS email_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            headers_json TEXT NULL,
            send_at INTEGER NOT NULL,
            sent INTEGER NOT NULL DEFAULT 0,
            sent_at INTEGER NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_email_queue_pending
         ON email_queue (sent, send_at, id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts INTEGER NOT NULL,
            recipient TEXT NOT NULL,
            event TEXT NOT NULL,
            detail TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS campaigns (
            campaign_key TEXT PRIMARY KEY,
            queued_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Check whether the schema has been provisioned.
///
/// Ticks against an unprovisioned database no-op instead of erroring, so a
/// worker can come up before its storage has been migrated.
pub async fn is_provisioned(pool: &SqlitePool) -> bool {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'email_queue'",
    )
    .fetch_optional(pool)
    .await
    .map(|row| row.is_some())
    .unwrap_or(false)
}

/// Ensure SQLite file and parent folder exist for a given sqlx URL.
pub fn ensure_sqlite_path(db_url: &str) -> String {
    if !db_url.starts_with("sqlite:") {
        return db_url.to_string();
    }
    let path_part = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if path_part == ":memory:" || path_part.is_empty() {
        return db_url.to_string();
    }
    let (path_only, query) = match path_part.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_part, None),
    };

    let path = Path::new(path_only);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    if !path.exists() {
        let _ = std::fs::File::create(path);
    }

    match query {
        Some(q) => format!("sqlite://{}?{}", path_only, q),
        None => format!("sqlite://{}", path_only),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_sqlite_path_memory_untouched() {
        assert_eq!(ensure_sqlite_path("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn test_ensure_sqlite_path_non_sqlite_untouched() {
        assert_eq!(
            ensure_sqlite_path("postgres://localhost/db"),
            "postgres://localhost/db"
        );
    }

    #[tokio::test]
    async fn test_provisioned_after_migrations() {
        let pool = connect("sqlite::memory:").await.unwrap();
        assert!(!is_provisioned(&pool).await);
        run_migrations(&pool).await.unwrap();
        assert!(is_provisioned(&pool).await);
    }
}
