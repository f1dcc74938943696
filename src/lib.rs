//! # doclib
//!
//! Backend for a library of public-health documents: bulk loading into
//! SQLite, faceted search with snippet highlighting, and a CLI plus JSON
//! HTTP API over the storage-agnostic engine in `doclib-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  JSON load  │──▶│    SQLite    │──▶│ SearchService │
//! │ (ingestion) │   │ items + links│   │ (doclib-core) │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                       ┌─────────────────────┤
//!                       ▼                     ▼
//!                  ┌──────────┐         ┌──────────┐
//!                  │   CLI    │         │   HTTP   │
//!                  │ (doclib) │         │  (axum)  │
//!                  └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! doclib init                                   # create database
//! doclib load ./documents.json                  # load a collection
//! doclib search covid --filter years=2020       # filtered text search
//! doclib counts --filter types_of_record=Report # facet counts
//! doclib serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection and generation token |
//! | [`migrate`] | Schema migrations |
//! | [`load`] | Bulk document loading |
//! | [`sqlite_store`] | SQLite `DocumentStore` |
//! | [`cache`] | moka result cache |
//! | [`search`] | `search` and `counts` commands |
//! | [`get`] | `get` command |
//! | [`export`] | `export` command |
//! | [`server`] | HTTP API |

pub mod cache;
pub mod config;
pub mod db;
pub mod export;
pub mod get;
pub mod load;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
