//! Pagination over both [`OrderedResult`] shapes.
//!
//! A materialized list is sliced directly; a deferred query is counted and
//! paged by the store. Both branches produce the same [`Page`] for the same
//! selection and ordering.

use crate::error::{SearchError, SearchResult};
use crate::models::Document;
use crate::ordering::OrderedResult;
use crate::store::DocumentStore;

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> SearchResult<Self> {
        if page < 1 {
            return Err(SearchError::InvalidPagination(format!(
                "page must be at least 1, got {page}"
            )));
        }
        if page_size < 1 {
            return Err(SearchError::InvalidPagination(format!(
                "page size must be at least 1, got {page_size}"
            )));
        }
        let page = usize::try_from(page)
            .map_err(|_| SearchError::InvalidPagination(format!("page out of range: {page}")))?;
        let page_size = usize::try_from(page_size).map_err(|_| {
            SearchError::InvalidPagination(format!("page size out of range: {page_size}"))
        })?;
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Index of the first item on this page.
    pub fn offset(&self) -> usize {
        self.page_size.saturating_mul(self.page - 1)
    }
}

/// One page of an ordered selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub total: usize,
    pub num_pages: usize,
    pub page: usize,
    pub page_size: usize,
    pub items: Vec<Document>,
}

fn num_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size)
}

/// Cut one page out of `ordered`.
pub async fn paginate<S>(store: &S, ordered: OrderedResult, request: PageRequest) -> SearchResult<Page>
where
    S: DocumentStore + ?Sized,
{
    let offset = request.offset();
    let (total, items) = match ordered {
        OrderedResult::Materialized(docs) => {
            let total = docs.len();
            let items = docs.into_iter().skip(offset).take(request.page_size).collect();
            (total, items)
        }
        OrderedResult::Deferred(query) => {
            let total = store.count(&query).await?;
            let items = if offset >= total {
                Vec::new()
            } else {
                store.fetch_page(&query, offset, request.page_size).await?
            };
            (total, items)
        }
    };

    Ok(Page {
        total,
        num_pages: num_pages(total, request.page_size),
        page: request.page,
        page_size: request.page_size,
        items,
    })
}
