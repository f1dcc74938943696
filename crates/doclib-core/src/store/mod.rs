//! Storage abstraction for the document library.
//!
//! The [`DocumentStore`] trait is the engine's only view of persistence:
//! a generation-stamped snapshot of the collection for filtering and
//! facet counting, plus native counting and offset/limit paging over a
//! [`DocumentQuery`] for the deferred ordering path.
//!
//! A query built from a snapshot is pinned to that snapshot's generation.
//! Stores answer it only while they are still at that generation and
//! otherwise fail with [`GenerationMismatch`], so one request never mixes
//! rows from two loads.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Corpus, Document};
use crate::ordering::{compare_documents, SortKey};

/// The store moved to a new generation while a pinned query was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("store changed during the request: expected generation {expected}, found {found}")]
pub struct GenerationMismatch {
    pub expected: u64,
    pub found: u64,
}

/// A deferred, store-orderable selection of documents.
///
/// `ids` is the filtered selection in ascending id order. When `sort` is
/// `None` the store returns documents in that order. `generation`, when
/// set, is the snapshot generation the selection was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub ids: Vec<i64>,
    pub sort: Option<SortKey>,
    pub descending: bool,
    pub generation: Option<u64>,
}

impl DocumentQuery {
    pub fn unsorted(ids: Vec<i64>) -> Self {
        Self {
            ids,
            sort: None,
            descending: false,
            generation: None,
        }
    }

    pub fn sorted(ids: Vec<i64>, key: SortKey, descending: bool) -> Self {
        Self {
            ids,
            sort: Some(key),
            descending,
            generation: None,
        }
    }

    /// Pin this query to the snapshot generation it was built from.
    pub fn at_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Fail with [`GenerationMismatch`] if the query is pinned to a
    /// generation other than `current`.
    pub fn check_generation(&self, current: u64) -> Result<()> {
        match self.generation {
            Some(expected) if expected != current => Err(GenerationMismatch {
                expected,
                found: current,
            }
            .into()),
            _ => Ok(()),
        }
    }

    /// Evaluate this query against an in-memory corpus.
    ///
    /// Ids missing from the corpus are skipped.
    pub fn evaluate<'a>(&self, corpus: &'a Corpus) -> Vec<&'a Document> {
        let wanted: HashSet<i64> = self.ids.iter().copied().collect();
        let mut docs: Vec<&Document> = corpus
            .documents
            .iter()
            .filter(|d| wanted.contains(&d.id))
            .collect();
        if let Some(key) = self.sort {
            docs.sort_by(|a, b| compare_documents(a, b, key, self.descending));
        }
        docs
    }
}

/// Abstract storage backend for the document library.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`generation`](DocumentStore::generation) | Current ingestion generation token |
/// | [`snapshot`](DocumentStore::snapshot) | Whole collection at the current generation |
/// | [`count`](DocumentStore::count) | Number of documents a query selects |
/// | [`fetch_page`](DocumentStore::fetch_page) | Ordered offset/limit window of a query |
/// | [`get_document`](DocumentStore::get_document) | One document by id |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Token that changes whenever the collection changes.
    async fn generation(&self) -> Result<u64>;

    /// Read-only snapshot of every document, in ascending id order.
    async fn snapshot(&self) -> Result<Arc<Corpus>>;

    /// Number of documents `query` selects. Pinned queries fail with
    /// [`GenerationMismatch`] once the store has moved on.
    async fn count(&self, query: &DocumentQuery) -> Result<usize>;

    /// Documents `offset..offset + limit` of `query`, in query order.
    /// Pinned queries are checked as in [`count`](DocumentStore::count).
    async fn fetch_page(
        &self,
        query: &DocumentQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Document>>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>>;
}
