//! Document retrieval by id for `doclib get`.

use anyhow::Result;

use doclib_core::models::{Document, TagCategory};

use crate::config::Config;
use crate::search::open_service;

pub async fn get_document(config: &Config, id: i64) -> Result<Document> {
    let service = open_service(config).await?;
    let result = service.get_item(id).await;
    service.store().pool().close().await;
    Ok(result?)
}

/// CLI entry point: print one document, as JSON or as labeled fields.
pub async fn run_get(config: &Config, id: i64, json: bool) -> Result<()> {
    let doc = get_document(config, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("--- Document ---");
    println!("id:                {}", doc.id);
    println!(
        "title:             {}",
        doc.title.as_deref().unwrap_or("(untitled)")
    );
    if let Some(ref kind) = doc.type_of_record {
        println!("type_of_record:    {}", kind);
    }
    match doc.date {
        Some(date) => println!("date:              {} ({})", date, doc.date_type.as_str()),
        None => println!("date:              (unspecified)"),
    }
    if let Some(ref link) = doc.link {
        println!("link:              {}", link);
    }
    if let Some(ref orgs) = doc.sub_organizations {
        println!("sub_organizations: {}", orgs);
    }
    println!();

    if let Some(ref description) = doc.description {
        println!("--- Description ---");
        println!("{}", description);
        println!();
    }

    println!("--- Authors ({}) ---", doc.authors.len());
    for author in &doc.authors {
        match author.acronym {
            Some(ref acronym) => println!("{} ({})", author.authoring_organization, acronym),
            None => println!("{}", author.authoring_organization),
        }
    }
    println!();

    for category in TagCategory::ALL {
        let names: Vec<&str> = doc.tags_in(category).map(|t| t.name.as_str()).collect();
        if !names.is_empty() {
            println!("{}: {}", category.as_str(), names.join(", "));
        }
    }
    if !doc.funders.is_empty() {
        let names: Vec<&str> = doc.funders.iter().map(|f| f.name.as_str()).collect();
        println!("funders: {}", names.join(", "));
    }
    if !doc.events.is_empty() {
        let names: Vec<&str> = doc.events.iter().map(|e| e.name.as_str()).collect();
        println!("events: {}", names.join(", "));
    }

    Ok(())
}
