//! # doclib core
//!
//! Storage-agnostic faceted search for a document library: data models,
//! the field registry, filtering, facet counting, ordering, snippet
//! highlighting, pagination, the store abstraction, and the
//! [`SearchService`](service::SearchService) that composes them.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP code.
//! Native backends and transports live in the `doclib` application crate.

pub mod cache;
pub mod error;
pub mod facets;
pub mod filter;
pub mod models;
pub mod ordering;
pub mod paginate;
pub mod registry;
pub mod service;
pub mod snippets;
pub mod store;
