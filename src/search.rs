//! Ranked full-text queries and ordered listings over the index.
//!
//! Ranking is delegated to FTS5's `bm25()`: lower scores are better and
//! results are returned in ascending score order.

use std::cmp::Ordering;

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use crate::error::{Error, Result};
use crate::models::{Docset, Entry, SearchResult};

pub const DEFAULT_SEARCH_LIMIT: i64 = 50;
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Characters with operator meaning in FTS5 query syntax.
const FTS_SPECIAL: &[char] = &['"', '\'', '(', ')', '*', ':'];

const HIGHLIGHT_OPEN: &str = "<mark>";
const HIGHLIGHT_CLOSE: &str = "</mark>";
const SNIPPET_TOKENS: i64 = 32;

/// Which slice of the index a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Global,
    Docset(&'a str),
    DocsetVersion(&'a str, &'a str),
}

impl<'a> Scope<'a> {
    /// Empty `docset` means global; `version` only narrows a named docset.
    pub fn new(docset: &'a str, version: &'a str) -> Self {
        match (docset.is_empty(), version.is_empty()) {
            (true, _) => Scope::Global,
            (false, true) => Scope::Docset(docset),
            (false, false) => Scope::DocsetVersion(docset, version),
        }
    }

    fn predicate(&self) -> &'static str {
        match self {
            Scope::Global => "",
            Scope::Docset(_) => "AND docset = ?",
            Scope::DocsetVersion(..) => "AND docset = ? AND version = ?",
        }
    }

    fn bind<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>>
    where
        'a: 'q,
    {
        match *self {
            Scope::Global => query,
            Scope::Docset(docset) => query.bind(docset),
            Scope::DocsetVersion(docset, version) => query.bind(docset).bind(version),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Searcher {
    pool: SqlitePool,
    default_limit: i64,
    list_limit: i64,
}

impl Searcher {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_limits(pool, DEFAULT_SEARCH_LIMIT, DEFAULT_LIST_LIMIT)
    }

    pub fn with_limits(pool: SqlitePool, default_limit: i64, list_limit: i64) -> Self {
        Self {
            pool,
            default_limit,
            list_limit,
        }
    }

    /// Full-text search. An empty (or all-punctuation) query yields no results.
    pub async fn search(
        &self,
        query: &str,
        docset: &str,
        version: &str,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        let fts_query = build_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let limit = if limit <= 0 { self.default_limit } else { limit };
        let scope = Scope::new(docset, version);

        let sql = format!(
            r#"
            SELECT docset, version, symbol, title, content, path,
                   bm25(docs) AS score,
                   snippet(docs, 4, '{}', '{}', '...', {}) AS snippet
            FROM docs
            WHERE docs MATCH ?
            {}
            ORDER BY score
            LIMIT ?
            "#,
            HIGHLIGHT_OPEN,
            HIGHLIGHT_CLOSE,
            SNIPPET_TOKENS,
            scope.predicate()
        );

        let rows = scope
            .bind(sqlx::query(&sql).bind(&fts_query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| SearchResult {
                entry: entry_from_row(row),
                rank: row.get("score"),
                snippet: row.get("snippet"),
            })
            .collect())
    }

    /// Entries of one docset (optionally one version) ordered by symbol.
    ///
    /// An empty `docset` names nothing and yields no entries.
    pub async fn list_entries(&self, docset: &str, version: &str, limit: i64) -> Result<Vec<Entry>> {
        if docset.is_empty() {
            return Ok(Vec::new());
        }

        let limit = if limit <= 0 { self.list_limit } else { limit };
        let scope = Scope::new(docset, version);

        let sql = format!(
            r#"
            SELECT docset, version, symbol, title, content, path
            FROM docs
            WHERE 1 = 1
            {}
            ORDER BY symbol
            LIMIT ?
            "#,
            scope.predicate()
        );

        let rows = scope
            .bind(sqlx::query(&sql))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

    pub async fn get_entry(&self, docset: &str, version: &str, path: &str) -> Result<Entry> {
        let row = sqlx::query(
            r#"
            SELECT docset, version, symbol, title, content, path
            FROM docs
            WHERE docset = ? AND version = ? AND path = ?
            "#,
        )
        .bind(docset)
        .bind(version)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(entry_from_row)
            .ok_or_else(|| Error::not_found("entry", format!("{}:{}", docset_label(docset, version), path)))
    }

    /// Installed docsets by name, newest version first.
    ///
    /// Versions compare component-wise with numeric parts as numbers, so
    /// `3.12` sorts ahead of `3.9`.
    pub async fn list_docsets(&self) -> Result<Vec<Docset>> {
        let rows = sqlx::query(
            r#"
            SELECT id, slug, name, version, display_name, entry_count, mtime, installed_at
            FROM docsets
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut docsets: Vec<Docset> = rows
            .iter()
            .map(|row| Docset {
                id: row.get("id"),
                slug: row.get("slug"),
                name: row.get("name"),
                version: row.get("version"),
                display_name: row.get("display_name"),
                entry_count: row.get("entry_count"),
                mtime: row.get("mtime"),
                installed_at: row.get("installed_at"),
            })
            .collect();

        docsets.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| compare_versions(&b.version, &a.version))
        });
        Ok(docsets)
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    let (left, right) = (version_parts(a), version_parts(b));

    for (x, y) in left.iter().zip(right.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}

fn version_parts(version: &str) -> Vec<&str> {
    version.split(|c: char| !c.is_ascii_alphanumeric()).collect()
}

fn entry_from_row(row: &SqliteRow) -> Entry {
    Entry {
        docset: row.get("docset"),
        version: row.get("version"),
        symbol: row.get("symbol"),
        title: row.get("title"),
        content: row.get("content"),
        path: row.get("path"),
    }
}

fn docset_label(docset: &str, version: &str) -> String {
    crate::models::format_slug(docset, version)
}

/// Turn free text into an FTS5 MATCH expression.
///
/// Operator characters are stripped, other punctuation splits terms, and
/// only the final term gets a prefix wildcard so typeahead works on the
/// word being typed while earlier words must match exactly.
pub fn build_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| !FTS_SPECIAL.contains(c))
        .map(|c| if is_bareword_char(c) { c } else { ' ' })
        .collect();

    let mut terms: Vec<String> = cleaned
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();

    match terms.last_mut() {
        Some(last) => last.push('*'),
        None => return String::new(),
    }

    terms.join(" ")
}

// FTS5 barewords: ASCII alphanumerics, underscore, and any non-ASCII char
fn is_bareword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}
