use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Tables created by [`run_migrations`], in dependency order.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY,
        title TEXT,
        description TEXT,
        type_of_record TEXT,
        date TEXT,
        date_type TEXT NOT NULL DEFAULT 'unspecified',
        link TEXT,
        sub_organizations TEXT,
        search_text TEXT NOT NULL DEFAULT '',
        file_search_text TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        UNIQUE(name, category)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items_to_tags (
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (item_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY,
        authoring_organization TEXT NOT NULL,
        acronym TEXT,
        type_of_authoring_organization TEXT,
        international_national TEXT,
        country TEXT,
        iso2 TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS authors_to_items (
        author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (author_id, item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS funders (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS funders_to_items (
        funder_id INTEGER NOT NULL REFERENCES funders(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (funder_id, item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY,
        master_id TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events_to_items (
        event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (event_id, item_id)
    )
    "#,
    // Single-row ingestion generation token
    r#"
    CREATE TABLE IF NOT EXISTS generation (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        value INTEGER NOT NULL
    )
    "#,
    "INSERT OR IGNORE INTO generation (id, value) VALUES (1, 1)",
    "CREATE INDEX IF NOT EXISTS idx_items_date ON items(date)",
    "CREATE INDEX IF NOT EXISTS idx_items_title ON items(title)",
    "CREATE INDEX IF NOT EXISTS idx_items_to_tags_tag ON items_to_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_authors_to_items_item ON authors_to_items(item_id)",
    "CREATE INDEX IF NOT EXISTS idx_funders_to_items_item ON funders_to_items(item_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_to_items_item ON events_to_items(item_id)",
];

/// Create every table and index. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}
