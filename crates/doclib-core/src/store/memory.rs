//! In-memory [`DocumentStore`] implementation for testing and embedding.
//!
//! Holds an `Arc<Corpus>` behind `std::sync::RwLock`. Every mutation swaps
//! in a fresh corpus and bumps the generation, so snapshots already handed
//! out stay valid and unchanged.

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Corpus, Document};

use super::{DocumentQuery, DocumentStore};

/// In-memory store for tests and single-process use.
pub struct InMemoryStore {
    corpus: RwLock<Arc<Corpus>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_documents(Vec::new())
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            corpus: RwLock::new(Arc::new(Corpus::new(1, documents))),
        }
    }

    fn current(&self) -> Arc<Corpus> {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap(&self, edit: impl FnOnce(&mut Vec<Document>)) -> u64 {
        let mut guard = self.corpus.write().unwrap_or_else(PoisonError::into_inner);
        let mut documents = guard.documents.clone();
        edit(&mut documents);
        let generation = guard.generation + 1;
        *guard = Arc::new(Corpus::new(generation, documents));
        generation
    }

    /// Replace the whole collection. Returns the new generation.
    pub fn replace_documents(&self, documents: Vec<Document>) -> u64 {
        self.swap(|current| *current = documents)
    }

    /// Insert or replace one document by id. Returns the new generation.
    pub fn upsert_document(&self, doc: Document) -> u64 {
        self.swap(|current| {
            current.retain(|d| d.id != doc.id);
            current.push(doc);
        })
    }

    /// Remove one document by id. Returns the new generation.
    pub fn delete_document(&self, id: i64) -> u64 {
        self.swap(|current| current.retain(|d| d.id != id))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn generation(&self) -> Result<u64> {
        Ok(self.current().generation)
    }

    async fn snapshot(&self) -> Result<Arc<Corpus>> {
        Ok(self.current())
    }

    async fn count(&self, query: &DocumentQuery) -> Result<usize> {
        let corpus = self.current();
        query.check_generation(corpus.generation)?;
        Ok(query.evaluate(&corpus).len())
    }

    async fn fetch_page(
        &self,
        query: &DocumentQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let corpus = self.current();
        query.check_generation(corpus.generation)?;
        Ok(query
            .evaluate(&corpus)
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let corpus = self.current();
        Ok(corpus
            .documents
            .binary_search_by_key(&id, |d| d.id)
            .ok()
            .map(|idx| corpus.documents[idx].clone()))
    }
}
