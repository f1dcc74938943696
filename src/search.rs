//! CLI search and facet-count commands.
//!
//! Both commands run against the same [`SearchService`] the HTTP server
//! uses. `--json` prints the wire response; the default output is a
//! compact human listing.

use std::sync::Arc;

use anyhow::Result;

use doclib_core::facets::FacetCounts;
use doclib_core::filter::FilterSpec;
use doclib_core::models::Document;
use doclib_core::ordering::OrderBy;
use doclib_core::service::{PreviewResponse, ResultsResponse, SearchRequest, SearchResponse, SearchService};

use crate::cache::MokaCache;
use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Connect to the configured database and build a cached search service.
pub async fn open_service(config: &Config) -> Result<SearchService<SqliteStore>> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let cache = Arc::new(MokaCache::from_config(&config.search));
    Ok(SearchService::with_cache(store, cache))
}

/// Group repeated `KEY=VALUE` pairs into a filter spec.
pub fn parse_filters(pairs: &[(String, String)]) -> FilterSpec {
    let mut spec = FilterSpec::new();
    for (key, value) in pairs {
        spec.entry(key.clone()).or_default().push(value.clone());
    }
    spec
}

/// Options of `doclib search`.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub text: Option<String>,
    pub filters: Vec<(String, String)>,
    pub order_by: Option<String>,
    pub desc: bool,
    pub page: i64,
    pub page_size: Option<i64>,
    pub preview: bool,
    pub explain: bool,
    pub json: bool,
}

pub async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let order_by = args
        .order_by
        .as_deref()
        .map(str::parse::<OrderBy>)
        .transpose()?;
    let request = SearchRequest {
        filters: parse_filters(&args.filters),
        search_text: args.text,
        order_by,
        is_desc: args.desc,
        page: args.page,
        page_size: args.page_size.unwrap_or(config.search.default_page_size),
        preview: args.preview,
        explain_results: args.explain,
    };

    let service = open_service(config).await?;
    let result = service.search(&request).await;
    service.store().pool().close().await;
    let response = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(response.as_ref())?);
        return Ok(());
    }
    match response.as_ref() {
        SearchResponse::Preview(preview) => print_preview(preview),
        SearchResponse::Results(results) => print_results(results),
    }
    Ok(())
}

fn print_preview(preview: &PreviewResponse) {
    println!("matches: {}", preview.n_items);
    for (class, records) in &preview.other_instances {
        if records.is_empty() {
            continue;
        }
        println!();
        println!("{} ({})", class, records.len());
        for record in records {
            let label = record
                .fields
                .values()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" / ");
            println!("  - {} [{} items] (id {})", label, record.n_items, record.id);
        }
    }
}

fn document_line(doc: &Document) -> String {
    let date = doc
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    let title = doc.title.as_deref().unwrap_or("(untitled)");
    format!("[{}] {}", date, title)
}

/// 1-based position in the whole result list of item `index` on `page`.
fn rank(page: usize, pagesize: usize, index: usize) -> usize {
    pagesize
        .saturating_mul(page.saturating_sub(1))
        .saturating_add(index)
        .saturating_add(1)
}

fn print_results(results: &ResultsResponse) {
    if results.data.is_empty() {
        println!("No results.");
        return;
    }
    println!(
        "page {}/{} ({} of {} documents)",
        results.page, results.num_pages, results.num, results.total
    );
    println!();
    for (i, doc) in results.data.iter().enumerate() {
        println!("{}. {}", rank(results.page, results.pagesize, i), document_line(doc));
        if let Some(kind) = &doc.type_of_record {
            println!("    type: {}", kind);
        }
        if !doc.authors.is_empty() {
            let names: Vec<&str> = doc
                .authors
                .iter()
                .map(|a| a.authoring_organization.as_str())
                .collect();
            println!("    authors: {}", names.join("; "));
        }
        if let Some(snippets) = results.data_snippets.as_ref().and_then(|s| s.get(i)) {
            if !snippets.is_empty() {
                let fields: Vec<&str> = snippets.keys().map(String::as_str).collect();
                println!("    matched: {}", fields.join(", "));
            }
        }
        println!("    id: {}", doc.id);
        println!();
    }
}

pub async fn run_counts(
    config: &Config,
    filters: &[(String, String)],
    text: Option<&str>,
    exclude: &[String],
    json: bool,
) -> Result<()> {
    let service = open_service(config).await?;
    let result = service
        .preview_counts(&parse_filters(filters), text, exclude)
        .await;
    service.store().pool().close().await;
    let counts = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        print_counts(&counts);
    }
    Ok(())
}

fn print_counts(counts: &FacetCounts) {
    for (category, result) in counts {
        println!("{} (unique {})", category, result.unique);
        for bucket in &result.by_value {
            println!("  {}: {}", bucket.value().unwrap_or("unspecified"), bucket.count());
        }
    }
}
