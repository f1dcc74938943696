//! Export a filtered, ordered selection of documents as JSON.
//!
//! Accepts the same filters and search text as `doclib search` but
//! writes every matching document, unpaged, with its linked entities.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use doclib_core::models::Document;
use doclib_core::ordering::OrderBy;
use doclib_core::store::DocumentStore;

use crate::config::Config;
use crate::search::{open_service, parse_filters};

#[derive(Serialize)]
struct ExportData<'a> {
    generation: u64,
    total: usize,
    documents: &'a [Document],
}

/// Options of `doclib export`.
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    pub text: Option<String>,
    pub filters: Vec<(String, String)>,
    pub order_by: Option<String>,
    pub desc: bool,
}

/// Export the selection as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, args: ExportArgs, output: Option<&Path>) -> Result<()> {
    let order_by = args
        .order_by
        .as_deref()
        .map(str::parse::<OrderBy>)
        .transpose()?;

    let service = open_service(config).await?;
    let generation = service.store().generation().await;
    let result = service
        .export_selection(&parse_filters(&args.filters), args.text.as_deref(), order_by, args.desc)
        .await;
    service.store().pool().close().await;
    let documents = result?;

    let data = ExportData {
        generation: generation?,
        total: documents.len(),
        documents: &documents,
    };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} documents to {}", data.total, path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
