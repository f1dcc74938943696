//! Bulk loading of documents into the SQLite store.
//!
//! The loader takes the ingestion hand-off format, a JSON array of
//! [`Document`]s with their linked tags, authors, funders, and events,
//! and writes it in a single transaction. Every successful load advances
//! the generation token so cached snapshots and search results are
//! retired.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use doclib_core::models::Document;

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Delete every stored item not present in the input.
    pub replace: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub documents: usize,
    pub removed_items: u64,
    pub removed_tags: u64,
    pub generation: u64,
}

/// Lower-cased blob of every searchable attribute, used when the input
/// carries no precomputed `search_text`.
pub fn derive_search_text(doc: &Document) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.extend(doc.title.as_deref());
    parts.extend(doc.description.as_deref());
    parts.extend(doc.type_of_record.as_deref());
    parts.extend(doc.link.as_deref());
    parts.extend(doc.sub_organizations.as_deref());
    parts.extend(doc.tags.iter().map(|t| t.name.as_str()));
    for author in &doc.authors {
        parts.push(&author.authoring_organization);
        parts.extend(author.acronym.as_deref());
    }
    parts.extend(doc.funders.iter().map(|f| f.name.as_str()));
    parts.extend(doc.events.iter().map(|e| e.name.as_str()));
    parts.join(" ").to_lowercase()
}

/// Write `docs` into the store in one transaction.
pub async fn load_documents(
    pool: &SqlitePool,
    docs: &[Document],
    options: LoadOptions,
) -> Result<LoadStats> {
    let mut seen = HashSet::new();
    for doc in docs {
        if !seen.insert(doc.id) {
            bail!("duplicate document id in input: {}", doc.id);
        }
    }

    let mut tx = pool.begin().await?;
    let mut stats = LoadStats {
        documents: docs.len(),
        ..Default::default()
    };

    if options.replace {
        let ids: Vec<i64> = docs.iter().map(|d| d.id).collect();
        stats.removed_items =
            sqlx::query("DELETE FROM items WHERE id NOT IN (SELECT value FROM json_each(?))")
                .bind(serde_json::to_string(&ids)?)
                .execute(&mut *tx)
                .await?
                .rows_affected();
    }

    for doc in docs {
        write_document(&mut tx, doc)
            .await
            .with_context(|| format!("Failed to load document {}", doc.id))?;
    }

    stats.removed_tags =
        sqlx::query("DELETE FROM tags WHERE id NOT IN (SELECT tag_id FROM items_to_tags)")
            .execute(&mut *tx)
            .await?
            .rows_affected();
    stats.generation = db::bump_generation(&mut tx).await?;
    tx.commit().await?;

    info!(
        documents = stats.documents,
        removed_items = stats.removed_items,
        removed_tags = stats.removed_tags,
        generation = stats.generation,
        "load committed"
    );
    Ok(stats)
}

async fn write_document(tx: &mut Transaction<'_, Sqlite>, doc: &Document) -> Result<()> {
    let search_text = if doc.search_text.is_empty() {
        derive_search_text(doc)
    } else {
        doc.search_text.clone()
    };

    sqlx::query(
        r#"
        INSERT INTO items (id, title, description, type_of_record, date, date_type,
                           link, sub_organizations, search_text, file_search_text)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            type_of_record = excluded.type_of_record,
            date = excluded.date,
            date_type = excluded.date_type,
            link = excluded.link,
            sub_organizations = excluded.sub_organizations,
            search_text = excluded.search_text,
            file_search_text = excluded.file_search_text
        "#,
    )
    .bind(doc.id)
    .bind(&doc.title)
    .bind(&doc.description)
    .bind(&doc.type_of_record)
    .bind(doc.date.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(doc.date_type.as_str())
    .bind(&doc.link)
    .bind(&doc.sub_organizations)
    .bind(search_text)
    .bind(&doc.file_search_text)
    .execute(&mut **tx)
    .await?;

    for table in [
        "items_to_tags",
        "authors_to_items",
        "funders_to_items",
        "events_to_items",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE item_id = ?"))
            .bind(doc.id)
            .execute(&mut **tx)
            .await?;
    }

    for (position, tag) in doc.tags.iter().enumerate() {
        sqlx::query(
            "INSERT INTO tags (id, name, category) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, category = excluded.category",
        )
        .bind(tag.id)
        .bind(&tag.name)
        .bind(tag.category.as_str())
        .execute(&mut **tx)
        .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO items_to_tags (item_id, tag_id, position) VALUES (?, ?, ?)",
        )
        .bind(doc.id)
        .bind(tag.id)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }

    for (position, author) in doc.authors.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO authors (id, authoring_organization, acronym,
                                 type_of_authoring_organization, international_national,
                                 country, iso2)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                authoring_organization = excluded.authoring_organization,
                acronym = excluded.acronym,
                type_of_authoring_organization = excluded.type_of_authoring_organization,
                international_national = excluded.international_national,
                country = excluded.country,
                iso2 = excluded.iso2
            "#,
        )
        .bind(author.id)
        .bind(&author.authoring_organization)
        .bind(&author.acronym)
        .bind(&author.type_of_authoring_organization)
        .bind(&author.international_national)
        .bind(&author.country)
        .bind(&author.iso2)
        .execute(&mut **tx)
        .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO authors_to_items (author_id, item_id, position) VALUES (?, ?, ?)",
        )
        .bind(author.id)
        .bind(doc.id)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }

    for (position, funder) in doc.funders.iter().enumerate() {
        sqlx::query(
            "INSERT INTO funders (id, name) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(funder.id)
        .bind(&funder.name)
        .execute(&mut **tx)
        .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO funders_to_items (funder_id, item_id, position) VALUES (?, ?, ?)",
        )
        .bind(funder.id)
        .bind(doc.id)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }

    for (position, event) in doc.events.iter().enumerate() {
        sqlx::query(
            "INSERT INTO events (id, master_id, name) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET master_id = excluded.master_id, name = excluded.name",
        )
        .bind(event.id)
        .bind(&event.master_id)
        .bind(&event.name)
        .execute(&mut **tx)
        .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO events_to_items (event_id, item_id, position) VALUES (?, ?, ?)",
        )
        .bind(event.id)
        .bind(doc.id)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Read a JSON array of documents from `input` and load it.
pub async fn run_load(config: &Config, input: &Path, replace: bool) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    let docs: Vec<Document> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse documents from {}", input.display()))?;

    let pool = db::connect(config).await?;
    let result = load_documents(&pool, &docs, LoadOptions { replace }).await;
    pool.close().await;
    let stats = result?;

    println!("load {}", input.display());
    println!("  documents: {}", stats.documents);
    if replace {
        println!("  removed items: {}", stats.removed_items);
    }
    println!("  removed tags: {}", stats.removed_tags);
    println!("  generation: {}", stats.generation);
    println!("ok");
    Ok(())
}
