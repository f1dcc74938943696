//! Search orchestration.
//!
//! [`SearchService`] composes filtering, facet counting, ordering,
//! pagination, and snippet highlighting into the public operations:
//!
//! | Operation | Purpose |
//! |-----------|---------|
//! | [`search`](SearchService::search) | Full or preview search, cached per generation |
//! | [`preview_counts`](SearchService::preview_counts) | Facet counts with caller-chosen exclusions |
//! | [`list_items`](SearchService::list_items) | Ordered, paginated listing by id |
//! | [`get_item`](SearchService::get_item) | One document |
//! | [`export_selection`](SearchService::export_selection) | Whole filtered, ordered selection |

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{CacheKey, NoCache, ResultCache};
use crate::error::{SearchError, SearchResult};
use crate::facets::{compute_facet_counts, FacetCounts, NULL_TOKEN};
use crate::filter::{apply, CompiledFilter, FilterSpec};
use crate::models::{Document, TagCategory};
use crate::ordering::{order, OrderBy, OrderedResult};
use crate::paginate::{paginate, Page, PageRequest};
use crate::snippets::{explain, Highlighter, SnippetMap};
use crate::store::DocumentStore;

/// Page size used when a request does not name one: effectively "all".
pub const DEFAULT_PAGE_SIZE: i64 = 10_000_000;

/// Times a request is run before a store that keeps changing under it
/// is reported as an error.
pub const SNAPSHOT_ATTEMPTS: usize = 3;

/// Arguments of [`SearchService::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub filters: FilterSpec,
    pub search_text: Option<String>,
    pub order_by: Option<OrderBy>,
    pub is_desc: bool,
    pub page: i64,
    #[serde(rename = "pagesize")]
    pub page_size: i64,
    pub preview: bool,
    pub explain_results: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            filters: FilterSpec::new(),
            search_text: None,
            order_by: None,
            is_desc: false,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            preview: false,
            explain_results: false,
        }
    }
}

impl SearchRequest {
    /// Search text with blank input treated as absent.
    pub fn text(&self) -> Option<&str> {
        normalize_text(self.search_text.as_deref())
    }
}

fn normalize_text(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// Arguments of [`SearchService::list_items`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemsRequest {
    /// Restrict to these ids; `None` lists everything.
    pub ids: Option<Vec<i64>>,
    pub order_by: Option<OrderBy>,
    pub is_desc: bool,
    pub page: i64,
    #[serde(rename = "pagesize")]
    pub page_size: i64,
}

impl Default for ItemsRequest {
    fn default() -> Self {
        Self {
            ids: None,
            order_by: None,
            is_desc: false,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// An entity whose name matched the search text, for suggestion UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub id: i64,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Option<String>>,
    /// Filtered documents linked to this entity.
    pub n_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippets: Option<BTreeMap<String, Vec<String>>>,
}

/// Entity class → matching instances.
pub type OtherInstances = BTreeMap<String, Vec<MatchRecord>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResponse {
    pub n_items: usize,
    pub other_instances: OtherInstances,
    pub search_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsResponse {
    pub page: usize,
    pub num_pages: usize,
    pub pagesize: usize,
    pub total: usize,
    /// Documents on this page.
    pub num: usize,
    pub data: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_snippets: Option<Vec<SnippetMap>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_counts: Option<FacetCounts>,
}

impl ResultsResponse {
    fn from_page(page: Page) -> Self {
        Self {
            page: page.page,
            num_pages: page.num_pages,
            pagesize: page.page_size,
            total: page.total,
            num: page.items.len(),
            data: page.items,
            data_snippets: None,
            filter_counts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Preview(PreviewResponse),
    Results(ResultsResponse),
}

/// Entity classes reported in preview `other_instances`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceKind {
    Author,
    Funder,
    Event,
    KeyTopic,
}

type InstanceFields<'a> = Vec<(&'static str, Option<&'a str>)>;

impl InstanceKind {
    const ALL: [InstanceKind; 4] = [
        InstanceKind::Author,
        InstanceKind::Funder,
        InstanceKind::Event,
        InstanceKind::KeyTopic,
    ];

    fn class_name(&self) -> &'static str {
        match self {
            InstanceKind::Author => "Author",
            InstanceKind::Funder => "Funder",
            InstanceKind::Event => "Event",
            InstanceKind::KeyTopic => "Key_Topic",
        }
    }

    /// Field records are sorted by.
    fn primary_field(&self) -> &'static str {
        match self {
            InstanceKind::Author => "authoring_organization",
            _ => "name",
        }
    }

    fn instances<'a>(&self, doc: &'a Document) -> Vec<(i64, InstanceFields<'a>)> {
        match self {
            InstanceKind::Author => doc
                .authors
                .iter()
                .map(|a| {
                    (
                        a.id,
                        vec![
                            ("authoring_organization", Some(a.authoring_organization.as_str())),
                            ("acronym", a.acronym.as_deref()),
                        ],
                    )
                })
                .collect(),
            InstanceKind::Funder => doc
                .funders
                .iter()
                .map(|f| (f.id, vec![("name", Some(f.name.as_str()))]))
                .collect(),
            InstanceKind::Event => doc
                .events
                .iter()
                .map(|e| (e.id, vec![("name", Some(e.name.as_str()))]))
                .collect(),
            InstanceKind::KeyTopic => doc
                .tags_in(TagCategory::KeyTopics)
                .map(|t| (t.id, vec![("name", Some(t.name.as_str()))]))
                .collect(),
        }
    }
}

/// Linked entities and key topics of `filtered` whose names match.
pub fn other_instances(
    filtered: &[&Document],
    highlighter: &Highlighter,
    explain_results: bool,
) -> OtherInstances {
    let mut out = OtherInstances::new();
    for kind in InstanceKind::ALL {
        let mut seen: BTreeMap<i64, (InstanceFields<'_>, usize)> = BTreeMap::new();
        for doc in filtered {
            let mut in_doc = HashSet::new();
            for (id, fields) in kind.instances(doc) {
                if in_doc.insert(id) {
                    seen.entry(id).or_insert_with(|| (fields, 0)).1 += 1;
                }
            }
        }

        let mut records: Vec<MatchRecord> = seen
            .into_iter()
            .filter(|(_, (fields, _))| {
                fields
                    .iter()
                    .any(|(_, v)| v.is_some_and(|v| highlighter.is_match(v)))
            })
            .map(|(id, (fields, n_items))| {
                let snippets = explain_results.then(|| {
                    fields
                        .iter()
                        .map(|(name, v)| {
                            let hits: Vec<String> =
                                v.and_then(|v| highlighter.highlight(v)).into_iter().collect();
                            (name.to_string(), hits)
                        })
                        .collect()
                });
                MatchRecord {
                    id,
                    fields: fields
                        .into_iter()
                        .map(|(name, v)| (name.to_string(), v.map(str::to_string)))
                        .collect(),
                    n_items,
                    snippets,
                }
            })
            .collect();
        let primary = kind.primary_field();
        records.sort_by(|a, b| {
            a.fields
                .get(primary)
                .cmp(&b.fields.get(primary))
                .then_with(|| a.id.cmp(&b.id))
        });
        out.insert(kind.class_name().to_string(), records);
    }
    out
}

/// The search engine over one store, with an injected result cache.
pub struct SearchService<S: ?Sized> {
    store: Arc<S>,
    cache: Arc<dyn ResultCache>,
}

impl<S> SearchService<S>
where
    S: DocumentStore + ?Sized,
{
    /// Service without result caching.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_cache(store, Arc::new(NoCache))
    }

    pub fn with_cache(store: Arc<S>, cache: Arc<dyn ResultCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    /// Run `op` until it completes against a single store generation.
    async fn on_one_snapshot<T, F, Fut>(&self, mut op: F) -> SearchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SearchResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_store_changed() && attempt < SNAPSHOT_ATTEMPTS => {
                    debug!(attempt, error = %e, "store changed mid-request, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Run a search.
    ///
    /// Identical requests against the same store generation are served
    /// from the cache. Failed requests are never cached. Filtering, facet
    /// counts, and the returned page all come from one snapshot.
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<Arc<SearchResponse>> {
        self.on_one_snapshot(move || self.search_once(request)).await
    }

    async fn search_once(&self, request: &SearchRequest) -> SearchResult<Arc<SearchResponse>> {
        let started = Instant::now();
        let page_request = PageRequest::new(request.page, request.page_size)?;
        let filter = CompiledFilter::compile(&request.filters)?;
        let text = request.text();

        let mut normalized = request.clone();
        normalized.search_text = text.map(str::to_string);
        let generation = self.store.generation().await?;
        let key = CacheKey {
            generation,
            request: serde_json::to_string(&normalized).map_err(anyhow::Error::from)?,
        };
        if let Some(hit) = self.cache.get(&key).await {
            debug!(generation, "search cache hit");
            return Ok(hit);
        }

        let corpus = self.store.snapshot().await?;
        let filtered = apply(&corpus.documents, &filter, text);
        let highlighter = text.and_then(Highlighter::new);

        let response = if request.preview {
            let other = highlighter
                .as_ref()
                .map(|h| other_instances(&filtered, h, request.explain_results))
                .unwrap_or_default();
            SearchResponse::Preview(PreviewResponse {
                n_items: filtered.len(),
                other_instances: other,
                search_text: text.map(str::to_string),
            })
        } else {
            let exclude = HashSet::from([NULL_TOKEN.to_string()]);
            let counts = compute_facet_counts(&filtered, &corpus.documents, &filter, text, &exclude);
            let ordered = order(&filtered, request.order_by, request.is_desc, text)
                .at_generation(corpus.generation);
            let page = paginate(self.store.as_ref(), ordered, page_request).await?;

            let mut results = ResultsResponse::from_page(page);
            if request.explain_results {
                if let Some(h) = &highlighter {
                    results.data_snippets = Some(results.data.iter().map(|d| explain(d, h)).collect());
                }
            }
            results.filter_counts = Some(counts);
            SearchResponse::Results(results)
        };

        let response = Arc::new(response);
        if corpus.generation == generation {
            self.cache.put(key, response.clone()).await;
        }
        info!(
            matched = filtered.len(),
            preview = request.preview,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(response)
    }

    /// Facet counts for `filters`, dropping values listed in `exclude`
    /// (`"null"` drops unspecified values).
    pub async fn preview_counts(
        &self,
        filters: &FilterSpec,
        search_text: Option<&str>,
        exclude: &[String],
    ) -> SearchResult<FacetCounts> {
        let filter = CompiledFilter::compile(filters)?;
        let text = normalize_text(search_text);
        let corpus = self.store.snapshot().await?;
        let filtered = apply(&corpus.documents, &filter, text);
        let exclude: HashSet<String> = exclude.iter().cloned().collect();
        Ok(compute_facet_counts(&filtered, &corpus.documents, &filter, text, &exclude))
    }

    /// List documents, optionally restricted to `ids`, ordered and paged.
    pub async fn list_items(&self, request: &ItemsRequest) -> SearchResult<ResultsResponse> {
        self.on_one_snapshot(move || self.list_items_once(request)).await
    }

    async fn list_items_once(&self, request: &ItemsRequest) -> SearchResult<ResultsResponse> {
        let page_request = PageRequest::new(request.page, request.page_size)?;
        let corpus = self.store.snapshot().await?;
        let wanted: Option<HashSet<i64>> = request.ids.as_ref().map(|ids| ids.iter().copied().collect());
        let selection: Vec<&Document> = corpus
            .documents
            .iter()
            .filter(|d| wanted.as_ref().map_or(true, |w| w.contains(&d.id)))
            .collect();
        let ordered = order(&selection, request.order_by, request.is_desc, None)
            .at_generation(corpus.generation);
        let page = paginate(self.store.as_ref(), ordered, page_request).await?;
        Ok(ResultsResponse::from_page(page))
    }

    pub async fn get_item(&self, id: i64) -> SearchResult<Document> {
        self.store
            .get_document(id)
            .await?
            .ok_or(SearchError::DocumentNotFound(id))
    }

    /// Every document matching `filters` and `search_text`, in order.
    pub async fn export_selection(
        &self,
        filters: &FilterSpec,
        search_text: Option<&str>,
        order_by: Option<OrderBy>,
        is_desc: bool,
    ) -> SearchResult<Vec<Document>> {
        let filter = CompiledFilter::compile(filters)?;
        let text = normalize_text(search_text);
        self.on_one_snapshot(|| self.export_once(&filter, text, order_by, is_desc)).await
    }

    async fn export_once(
        &self,
        filter: &CompiledFilter,
        text: Option<&str>,
        order_by: Option<OrderBy>,
        is_desc: bool,
    ) -> SearchResult<Vec<Document>> {
        let corpus = self.store.snapshot().await?;
        let filtered = apply(&corpus.documents, filter, text);
        match order(&filtered, order_by, is_desc, text).at_generation(corpus.generation) {
            OrderedResult::Materialized(docs) => Ok(docs),
            OrderedResult::Deferred(query) => {
                let total = self.store.count(&query).await?;
                Ok(self.store.fetch_page(&query, 0, total).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{Author, Corpus, Funder};
    use crate::store::memory::InMemoryStore;
    use crate::store::DocumentQuery;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that commits a load each time a deferred query is counted,
    /// for the first `loads` counts: document 2 is removed and document 1
    /// is retitled.
    struct LoadsDuringCount {
        inner: InMemoryStore,
        loads: AtomicUsize,
    }

    impl LoadsDuringCount {
        fn new(loads: usize) -> Self {
            Self {
                inner: InMemoryStore::with_documents(fixture()),
                loads: AtomicUsize::new(loads),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for LoadsDuringCount {
        async fn generation(&self) -> anyhow::Result<u64> {
            self.inner.generation().await
        }

        async fn snapshot(&self) -> anyhow::Result<Arc<Corpus>> {
            self.inner.snapshot().await
        }

        async fn count(&self, query: &DocumentQuery) -> anyhow::Result<usize> {
            let pending = self.loads.load(Ordering::SeqCst);
            if pending > 0 {
                self.loads.store(pending - 1, Ordering::SeqCst);
                self.inner.delete_document(2);
                let mut retitled = self.inner.get_document(1).await?.unwrap();
                retitled.title = Some("Renamed".into());
                self.inner.upsert_document(retitled);
            }
            self.inner.count(query).await
        }

        async fn fetch_page(
            &self,
            query: &DocumentQuery,
            offset: usize,
            limit: usize,
        ) -> anyhow::Result<Vec<Document>> {
            self.inner.fetch_page(query, offset, limit).await
        }

        async fn get_document(&self, id: i64) -> anyhow::Result<Option<Document>> {
            self.inner.get_document(id).await
        }
    }

    fn fixture() -> Vec<Document> {
        let mut a = Document::new(1);
        a.title = Some("Pandemic plan".into());
        a.date = NaiveDate::from_ymd_opt(2020, 3, 1);
        a.search_text = "pandemic plan".into();
        a.authors.push(Author {
            id: 10,
            authoring_organization: "World Health Organization".into(),
            acronym: Some("WHO".into()),
            type_of_authoring_organization: Some("Intergovernmental organization".into()),
            international_national: None,
            country: None,
            iso2: None,
        });
        let mut b = Document::new(2);
        b.title = Some("Outbreak report".into());
        b.description = Some("A pandemic retrospective".into());
        b.date = NaiveDate::from_ymd_opt(2019, 5, 1);
        b.search_text = "outbreak report a pandemic retrospective".into();
        b.funders.push(Funder {
            id: 3,
            name: "Pandemic Fund".into(),
        });
        let mut c = Document::new(3);
        c.title = Some("Draft".into());
        c.search_text = "draft".into();
        vec![a, b, c]
    }

    fn service() -> SearchService<InMemoryStore> {
        SearchService::with_cache(
            Arc::new(InMemoryStore::with_documents(fixture())),
            Arc::new(MemoryCache::new()),
        )
    }

    fn results(response: &SearchResponse) -> &ResultsResponse {
        match response {
            SearchResponse::Results(r) => r,
            other => panic!("expected results, got {other:?}"),
        }
    }

    fn ids(r: &ResultsResponse) -> Vec<i64> {
        r.data.iter().map(|d| d.id).collect()
    }

    #[tokio::test]
    async fn test_search_date_desc_nulls_last() {
        let svc = service();
        let request = SearchRequest {
            order_by: Some(OrderBy::Date),
            is_desc: true,
            ..Default::default()
        };
        let response = svc.search(&request).await.unwrap();
        let r = results(&response);
        assert_eq!(ids(r), vec![1, 2, 3]);
        assert_eq!(r.total, 3);
        assert_eq!(r.num_pages, 1);
        assert!(r.filter_counts.is_some());
        assert!(r.data_snippets.is_none());
    }

    #[tokio::test]
    async fn test_search_relevance_with_snippets() {
        let svc = service();
        let request = SearchRequest {
            search_text: Some("Pandemic".into()),
            order_by: Some(OrderBy::Relevance),
            explain_results: true,
            ..Default::default()
        };
        let response = svc.search(&request).await.unwrap();
        let r = results(&response);
        assert_eq!(ids(r), vec![1, 2]);
        let snippets = r.data_snippets.as_ref().unwrap();
        assert_eq!(snippets.len(), 2);
        assert!(snippets[0].contains_key("title"));
        assert!(snippets[1].contains_key("description"));
        assert!(snippets[1].contains_key("funder.name"));
    }

    #[tokio::test]
    async fn test_explain_without_text_omits_snippets() {
        let svc = service();
        let request = SearchRequest {
            explain_results: true,
            search_text: Some(String::new()),
            ..Default::default()
        };
        let response = svc.search(&request).await.unwrap();
        assert!(results(&response).data_snippets.is_none());
    }

    #[tokio::test]
    async fn test_preview_reports_other_instances() {
        let svc = service();
        let request = SearchRequest {
            search_text: Some("pandemic".into()),
            preview: true,
            explain_results: true,
            ..Default::default()
        };
        let response = svc.search(&request).await.unwrap();
        let SearchResponse::Preview(p) = response.as_ref() else {
            panic!("expected preview");
        };
        assert_eq!(p.n_items, 2);
        assert_eq!(p.search_text.as_deref(), Some("pandemic"));
        let funders = &p.other_instances["Funder"];
        assert_eq!(funders.len(), 1);
        assert_eq!(funders[0].id, 3);
        assert_eq!(funders[0].n_items, 1);
        let snippets = funders[0].snippets.as_ref().unwrap();
        assert_eq!(snippets["name"], vec!["<highlight>Pandemic</highlight> Fund".to_string()]);
        assert!(p.other_instances["Author"].is_empty());
    }

    #[tokio::test]
    async fn test_preview_without_text_skips_instances() {
        let svc = service();
        let request = SearchRequest {
            preview: true,
            ..Default::default()
        };
        let response = svc.search(&request).await.unwrap();
        let SearchResponse::Preview(p) = response.as_ref() else {
            panic!("expected preview");
        };
        assert_eq!(p.n_items, 3);
        assert!(p.other_instances.is_empty());
    }

    #[tokio::test]
    async fn test_cache_scoped_by_generation() {
        let store = Arc::new(InMemoryStore::with_documents(fixture()));
        let svc = SearchService::with_cache(store.clone(), Arc::new(MemoryCache::new()));
        let request = SearchRequest::default();

        let first = svc.search(&request).await.unwrap();
        let second = svc.search(&request).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        store.upsert_document(Document::new(4));
        let third = svc.search(&request).await.unwrap();
        assert_eq!(results(&third).total, 4);
    }

    #[tokio::test]
    async fn test_validation_errors_surface() {
        let svc = service();
        let bad_page = SearchRequest {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            svc.search(&bad_page).await,
            Err(SearchError::InvalidPagination(_))
        ));

        let mut filters = FilterSpec::new();
        filters.insert("years".into(), vec!["range_2021_2019".into()]);
        let bad_range = SearchRequest {
            filters,
            ..Default::default()
        };
        let err = svc.search(&bad_range).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_list_and_get_items() {
        let svc = service();
        let listed = svc
            .list_items(&ItemsRequest {
                ids: Some(vec![3, 1]),
                order_by: Some(OrderBy::Title),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&listed), vec![3, 1]);
        assert!(listed.filter_counts.is_none());

        assert_eq!(svc.get_item(2).await.unwrap().id, 2);
        assert!(matches!(
            svc.get_item(99).await,
            Err(SearchError::DocumentNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_export_selection_matches_search_order() {
        let svc = service();
        let exported = svc
            .export_selection(&FilterSpec::new(), None, Some(OrderBy::Date), false)
            .await
            .unwrap();
        assert_eq!(exported.iter().map(|d| d.id).collect::<Vec<_>>(), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_preview_counts_honours_exclude() {
        let svc = service();
        let with_null = svc.preview_counts(&FilterSpec::new(), None, &[]).await.unwrap();
        assert_eq!(with_null["years"].count_of(None), 1);
        let without = svc
            .preview_counts(&FilterSpec::new(), None, &["null".to_string()])
            .await
            .unwrap();
        assert_eq!(without["years"].count_of(None), 0);
    }

    #[tokio::test]
    async fn test_search_reads_one_generation_when_load_commits_mid_request() {
        let store = Arc::new(LoadsDuringCount::new(1));
        let svc = SearchService::new(store.clone());
        let request = SearchRequest {
            order_by: Some(OrderBy::Title),
            ..Default::default()
        };
        let response = svc.search(&request).await.unwrap();
        let r = results(&response);

        // page, total, and facets all describe the post-load collection
        let titles: Vec<_> = r.data.iter().map(|d| d.title.as_deref()).collect();
        assert_eq!(titles, vec![Some("Draft"), Some("Renamed")]);
        assert_eq!(r.total, 2);
        let counts = r.filter_counts.as_ref().unwrap();
        assert_eq!(counts["years"].count_of(Some("2019")), 0);
        assert_eq!(counts["years"].count_of(Some("2020")), 1);
        assert_eq!(counts["years"].unique, 1);
    }

    #[tokio::test]
    async fn test_list_and_export_read_one_generation() {
        let svc = SearchService::new(Arc::new(LoadsDuringCount::new(1)));
        let listed = svc
            .list_items(&ItemsRequest {
                order_by: Some(OrderBy::Date),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&listed), vec![1, 3]);
        assert_eq!(listed.total, 2);

        let svc = SearchService::new(Arc::new(LoadsDuringCount::new(1)));
        let exported = svc
            .export_selection(&FilterSpec::new(), None, Some(OrderBy::Title), false)
            .await
            .unwrap();
        assert_eq!(exported.iter().map(|d| d.id).collect::<Vec<_>>(), vec![3, 1]);
    }

    #[tokio::test]
    async fn test_store_that_never_settles_is_an_error() {
        let store = Arc::new(LoadsDuringCount::new(SNAPSHOT_ATTEMPTS));
        let svc = SearchService::with_cache(store.clone(), Arc::new(MemoryCache::new()));
        let request = SearchRequest {
            order_by: Some(OrderBy::Date),
            ..Default::default()
        };
        let err = svc.search(&request).await.unwrap_err();
        assert!(err.is_store_changed());
        assert!(!err.is_validation());
        assert_eq!(store.loads.load(Ordering::SeqCst), 0);

        // once loads stop, the same request succeeds
        let response = svc.search(&request).await.unwrap();
        assert_eq!(results(&response).total, 2);
    }
}
