//! # docshelf
//!
//! Offline documentation: download docsets from a DevDocs-style catalog,
//! normalize their pages, and keep a local SQLite FTS5 index for ranked
//! search.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   devdocs    │──▶│   install    │──▶│   indexer    │
//! │ manifest/    │   │ convert +    │   │ FTS5 + meta  │
//! │ bundle/index │   │ storage      │   └──────┬───────┘
//! └──────┬───────┘   └──────────────┘          │
//!        ▼                                     ▼
//! ┌──────────────┐                      ┌──────────────┐
//! │   manifest   │                      │    search    │
//! │  disk cache  │                      │ bm25 ranking │
//! └──────────────┘                      └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`app`] | Public operations over one data directory |
//! | [`config`] | TOML configuration and derived paths |
//! | [`models`] | Core data types and slug handling |
//! | [`error`] | Error kinds |
//! | [`devdocs`] | HTTP client for the catalog and content hosts |
//! | [`manifest`] | Time-based manifest cache with stale fallback |
//! | [`convert`] | HTML → normalized text |
//! | [`storage`] | Raw bundle files on disk |
//! | [`indexer`] | Transactional index writes |
//! | [`search`] | Ranked search and listings |
//! | [`install`] | Install/update pipeline |
//! | [`progress`] | Install progress events and sinks |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod app;
pub mod config;
pub mod convert;
pub mod db;
pub mod devdocs;
pub mod error;
pub mod indexer;
pub mod install;
pub mod manifest;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod search;
pub mod storage;

pub use app::App;
pub use error::{Error, Result};
