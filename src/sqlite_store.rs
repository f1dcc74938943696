//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Snapshots are hydrated from the item and link tables and memoized per
//! ingestion generation. The deferred ordering path (`count` and
//! `fetch_page`) runs natively in SQL so paging never materializes the
//! whole selection.
//!
//! Every read runs inside one transaction, so a hydration or a page never
//! straddles a load, and pinned queries see the generation they check.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use doclib_core::models::{Author, Corpus, DateType, Document, Event, Funder, Tag, TagCategory};
use doclib_core::ordering::SortKey;
use doclib_core::store::{DocumentQuery, DocumentStore};

use crate::db;

/// Which items a hydration pass loads.
enum Scope {
    All,
    /// JSON array of item ids, expanded with `json_each`.
    Ids(String),
}

impl Scope {
    fn ids(ids: &[i64]) -> Result<Self> {
        Ok(Scope::Ids(serde_json::to_string(ids)?))
    }

    fn clause(&self, column: &str) -> String {
        match self {
            Scope::All => String::new(),
            Scope::Ids(_) => format!("WHERE {column} IN (SELECT value FROM json_each(?))"),
        }
    }

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            Scope::All => query,
            Scope::Ids(json) => query.bind(json.as_str()),
        }
    }
}

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    snapshot: Mutex<Option<Arc<Corpus>>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            snapshot: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Load documents in `scope` with their tags and linked entities.
async fn hydrate(conn: &mut SqliteConnection, scope: &Scope) -> Result<Vec<Document>> {
    let sql = format!(
        "SELECT id, title, description, type_of_record, date, date_type, link, \
         sub_organizations, search_text, file_search_text FROM items {} ORDER BY id",
        scope.clause("id")
    );
    let rows = scope.bind(sqlx::query(&sql)).fetch_all(&mut *conn).await?;
    let mut documents = rows
        .iter()
        .map(document_from_row)
        .collect::<Result<Vec<_>>>()?;

    let mut tags = load_tags(conn, scope).await?;
    let mut authors = load_authors(conn, scope).await?;
    let mut funders = load_funders(conn, scope).await?;
    let mut events = load_events(conn, scope).await?;
    for doc in &mut documents {
        doc.tags = tags.remove(&doc.id).unwrap_or_default();
        doc.authors = authors.remove(&doc.id).unwrap_or_default();
        doc.funders = funders.remove(&doc.id).unwrap_or_default();
        doc.events = events.remove(&doc.id).unwrap_or_default();
    }
    Ok(documents)
}

async fn load_tags(
    conn: &mut SqliteConnection,
    scope: &Scope,
) -> Result<HashMap<i64, Vec<Tag>>> {
    let sql = format!(
        "SELECT it.item_id, t.id, t.name, t.category FROM items_to_tags it \
         JOIN tags t ON t.id = it.tag_id {} ORDER BY it.item_id, it.position",
        scope.clause("it.item_id")
    );
    let rows = scope.bind(sqlx::query(&sql)).fetch_all(&mut *conn).await?;
    let mut out: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in &rows {
        let category: String = row.get("category");
        let category = TagCategory::parse(&category)
            .with_context(|| format!("unknown tag category in store: {category}"))?;
        out.entry(row.get("item_id")).or_default().push(Tag {
            id: row.get("id"),
            name: row.get("name"),
            category,
        });
    }
    Ok(out)
}

async fn load_authors(
    conn: &mut SqliteConnection,
    scope: &Scope,
) -> Result<HashMap<i64, Vec<Author>>> {
    let sql = format!(
        "SELECT ai.item_id, a.id, a.authoring_organization, a.acronym, \
         a.type_of_authoring_organization, a.international_national, a.country, a.iso2 \
         FROM authors_to_items ai JOIN authors a ON a.id = ai.author_id {} \
         ORDER BY ai.item_id, ai.position",
        scope.clause("ai.item_id")
    );
    let rows = scope.bind(sqlx::query(&sql)).fetch_all(&mut *conn).await?;
    let mut out: HashMap<i64, Vec<Author>> = HashMap::new();
    for row in &rows {
        out.entry(row.get("item_id")).or_default().push(Author {
            id: row.get("id"),
            authoring_organization: row.get("authoring_organization"),
            acronym: row.get("acronym"),
            type_of_authoring_organization: row.get("type_of_authoring_organization"),
            international_national: row.get("international_national"),
            country: row.get("country"),
            iso2: row.get("iso2"),
        });
    }
    Ok(out)
}

async fn load_funders(
    conn: &mut SqliteConnection,
    scope: &Scope,
) -> Result<HashMap<i64, Vec<Funder>>> {
    let sql = format!(
        "SELECT fi.item_id, f.id, f.name FROM funders_to_items fi \
         JOIN funders f ON f.id = fi.funder_id {} ORDER BY fi.item_id, fi.position",
        scope.clause("fi.item_id")
    );
    let rows = scope.bind(sqlx::query(&sql)).fetch_all(&mut *conn).await?;
    let mut out: HashMap<i64, Vec<Funder>> = HashMap::new();
    for row in &rows {
        out.entry(row.get("item_id")).or_default().push(Funder {
            id: row.get("id"),
            name: row.get("name"),
        });
    }
    Ok(out)
}

async fn load_events(
    conn: &mut SqliteConnection,
    scope: &Scope,
) -> Result<HashMap<i64, Vec<Event>>> {
    let sql = format!(
        "SELECT ei.item_id, e.id, e.master_id, e.name FROM events_to_items ei \
         JOIN events e ON e.id = ei.event_id {} ORDER BY ei.item_id, ei.position",
        scope.clause("ei.item_id")
    );
    let rows = scope.bind(sqlx::query(&sql)).fetch_all(&mut *conn).await?;
    let mut out: HashMap<i64, Vec<Event>> = HashMap::new();
    for row in &rows {
        out.entry(row.get("item_id")).or_default().push(Event {
            id: row.get("id"),
            master_id: row.get("master_id"),
            name: row.get("name"),
        });
    }
    Ok(out)
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let id: i64 = row.get("id");
    let date: Option<String> = row.get("date");
    let date = date
        .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
        .transpose()
        .with_context(|| format!("invalid date stored for item {id}"))?;
    let date_type: String = row.get("date_type");
    let date_type = DateType::parse(&date_type)
        .with_context(|| format!("invalid date_type stored for item {id}: {date_type}"))?;

    let mut doc = Document::new(id);
    doc.title = row.get("title");
    doc.description = row.get("description");
    doc.type_of_record = row.get("type_of_record");
    doc.date = date;
    doc.date_type = date_type;
    doc.link = row.get("link");
    doc.sub_organizations = row.get("sub_organizations");
    doc.search_text = row.get("search_text");
    doc.file_search_text = row.get("file_search_text");
    Ok(doc)
}

/// `ORDER BY` clause for a deferred query. Nulls sort last either way.
fn order_clause(query: &DocumentQuery) -> String {
    let direction = if query.descending { "DESC" } else { "ASC" };
    match query.sort {
        None => "id".to_string(),
        Some(SortKey::Date) => format!("(date IS NULL), date {direction}, id"),
        Some(SortKey::Title) => format!("(title IS NULL), title {direction}, id"),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn generation(&self) -> Result<u64> {
        db::current_generation(&self.pool).await
    }

    async fn snapshot(&self) -> Result<Arc<Corpus>> {
        let generation = self.generation().await?;
        let mut cached = self.snapshot.lock().await;
        if let Some(corpus) = cached.as_ref().filter(|c| c.generation == generation) {
            return Ok(corpus.clone());
        }

        let mut tx = self.pool.begin().await?;
        let generation = db::current_generation(&mut *tx).await?;
        let documents = hydrate(&mut *tx, &Scope::All).await?;
        tx.commit().await?;

        let corpus = Arc::new(Corpus::new(generation, documents));
        debug!(generation, documents = corpus.len(), "loaded corpus snapshot");
        *cached = Some(corpus.clone());
        Ok(corpus)
    }

    async fn count(&self, query: &DocumentQuery) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        query.check_generation(db::current_generation(&mut *tx).await?)?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE id IN (SELECT value FROM json_each(?))",
        )
        .bind(serde_json::to_string(&query.ids)?)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(count as usize)
    }

    async fn fetch_page(
        &self,
        query: &DocumentQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT id FROM items WHERE id IN (SELECT value FROM json_each(?)) \
             ORDER BY {} LIMIT ? OFFSET ?",
            order_clause(query)
        );
        let mut tx = self.pool.begin().await?;
        query.check_generation(db::current_generation(&mut *tx).await?)?;
        let page_ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(serde_json::to_string(&query.ids)?)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&mut *tx)
            .await?;
        if page_ids.is_empty() {
            return Ok(Vec::new());
        }

        let documents = hydrate(&mut *tx, &Scope::ids(&page_ids)?).await?;
        tx.commit().await?;
        let mut by_id: HashMap<i64, Document> = documents.into_iter().map(|d| (d.id, d)).collect();
        Ok(page_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let mut tx = self.pool.begin().await?;
        let documents = hydrate(&mut *tx, &Scope::ids(&[id])?).await?;
        tx.commit().await?;
        Ok(documents.into_iter().next())
    }
}
