//! Transactional writes into the persistent index.
//!
//! [`Indexer::index_docset`] and [`Indexer::remove_docset`] each run as one
//! SQLite transaction. Readers see the index either before or after the
//! call, never a partially replaced docset.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{Error, Result};
use crate::models::{parse_slug, Docset, Entry};

#[derive(Debug, Clone)]
pub struct Indexer {
    pool: SqlitePool,
}

impl Indexer {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace every entry of `docset` and upsert its metadata row.
    ///
    /// The recorded `entry_count` is `entries.len()`, regardless of the
    /// value carried in `docset`.
    pub async fn index_docset(&self, docset: &Docset, entries: &[Entry]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Transaction)?;

        replace_entries(&mut tx, docset, entries)
            .await
            .map_err(Error::Transaction)?;
        upsert_docset(&mut tx, docset, entries.len() as i64)
            .await
            .map_err(Error::Transaction)?;

        tx.commit().await.map_err(Error::Transaction)?;
        tracing::info!(slug = %docset.slug, entries = entries.len(), "indexed docset");
        Ok(())
    }

    /// Delete a docset's entries and metadata row. Unknown slugs are a no-op.
    pub async fn remove_docset(&self, slug: &str) -> Result<()> {
        let (name, version) = parse_slug(slug);
        let mut tx = self.pool.begin().await.map_err(Error::Transaction)?;

        sqlx::query("DELETE FROM docs WHERE docset = ? AND version = ?")
            .bind(name)
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(Error::Transaction)?;

        sqlx::query("DELETE FROM docsets WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await
            .map_err(Error::Transaction)?;

        tx.commit().await.map_err(Error::Transaction)?;
        tracing::info!(slug, "removed docset from index");
        Ok(())
    }
}

async fn replace_entries(
    tx: &mut Transaction<'_, Sqlite>,
    docset: &Docset,
    entries: &[Entry],
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM docs WHERE docset = ? AND version = ?")
        .bind(&docset.name)
        .bind(&docset.version)
        .execute(&mut **tx)
        .await?;

    for entry in entries {
        sqlx::query(
            "INSERT INTO docs (docset, version, symbol, title, content, path) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.docset)
        .bind(&entry.version)
        .bind(&entry.symbol)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(&entry.path)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn upsert_docset(
    tx: &mut Transaction<'_, Sqlite>,
    docset: &Docset,
    entry_count: i64,
) -> std::result::Result<(), sqlx::Error> {
    let now = Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO docsets (slug, name, version, display_name, entry_count, mtime, installed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(slug) DO UPDATE SET
            display_name = excluded.display_name,
            entry_count = excluded.entry_count,
            mtime = excluded.mtime,
            installed_at = excluded.installed_at
        "#,
    )
    .bind(&docset.slug)
    .bind(&docset.name)
    .bind(&docset.version)
    .bind(&docset.display_name)
    .bind(entry_count)
    .bind(docset.mtime)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
