use sqlx::SqlitePool;

use crate::error::Result;

/// Create the index schema. Safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // FTS5 virtual table over every indexed page
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='docs'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE docs USING fts5(
                docset,
                version,
                symbol,
                title,
                content,
                path,
                tokenize = 'porter unicode61'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    // Installed docset metadata
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS docsets (
            id INTEGER PRIMARY KEY,
            slug TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            version TEXT NOT NULL DEFAULT '',
            display_name TEXT NOT NULL DEFAULT '',
            entry_count INTEGER NOT NULL DEFAULT 0,
            mtime INTEGER NOT NULL DEFAULT 0,
            installed_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_docsets_name ON docsets(name)")
        .execute(pool)
        .await?;

    Ok(())
}
