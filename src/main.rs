//! # doclib CLI
//!
//! ## Usage
//!
//! ```bash
//! doclib --config ./config/doclib.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `doclib init` | Create the SQLite database and run schema migrations |
//! | `doclib load <file>` | Load a JSON array of documents |
//! | `doclib search [text]` | Faceted search over the collection |
//! | `doclib counts` | Facet counts for a filter selection |
//! | `doclib get <id>` | Show one document |
//! | `doclib export` | Write a filtered selection as JSON |
//! | `doclib serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use doclib::{config, export, get, load, migrate, search, server};

/// doclib: faceted search over a document library.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/doclib.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "doclib",
    about = "doclib: faceted search and filtering for a document library",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/doclib.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables. Safe to run
    /// more than once.
    Init,

    /// Load documents from a JSON array file.
    ///
    /// Documents are upserted by id in a single transaction and the
    /// store generation is advanced.
    Load {
        /// Path to the JSON file.
        input: PathBuf,

        /// Remove stored documents that are not in the input.
        #[arg(long)]
        replace: bool,
    },

    /// Search documents.
    Search {
        /// Free-text query, matched case-insensitively as a substring.
        text: Option<String>,

        /// Filter as KEY=VALUE (repeatable), e.g. `years=2020` or
        /// `years=range_2019_null`.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Ordering: `date`, `title`, or `relevance`.
        #[arg(long)]
        order_by: Option<String>,

        /// Descending order for `date` and `title`.
        #[arg(long)]
        desc: bool,

        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Defaults to `[search].default_page_size`.
        #[arg(long)]
        page_size: Option<i64>,

        /// Report match count and matching entities only.
        #[arg(long)]
        preview: bool,

        /// Include highlighted snippets for each match.
        #[arg(long)]
        explain: bool,

        /// Print the raw JSON response.
        #[arg(long)]
        json: bool,
    },

    /// Show facet counts for a selection.
    Counts {
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        #[arg(long)]
        text: Option<String>,

        /// Value to leave out of the counts (repeatable); `null` drops
        /// unspecified values.
        #[arg(long)]
        exclude: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show one document by id.
    Get {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Export every matching document as JSON.
    Export {
        #[arg(long)]
        text: Option<String>,

        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        #[arg(long)]
        order_by: Option<String>,

        #[arg(long)]
        desc: bool,

        /// Output file; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "doclib=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { input, replace } => {
            load::run_load(&cfg, &input, replace).await?;
        }
        Commands::Search {
            text,
            filters,
            order_by,
            desc,
            page,
            page_size,
            preview,
            explain,
            json,
        } => {
            let args = search::SearchArgs {
                text,
                filters,
                order_by,
                desc,
                page,
                page_size,
                preview,
                explain,
                json,
            };
            search::run_search(&cfg, args).await?;
        }
        Commands::Counts {
            filters,
            text,
            exclude,
            json,
        } => {
            search::run_counts(&cfg, &filters, text.as_deref(), &exclude, json).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, id, json).await?;
        }
        Commands::Export {
            text,
            filters,
            order_by,
            desc,
            output,
        } => {
            let args = export::ExportArgs {
                text,
                filters,
                order_by,
                desc,
            };
            export::run_export(&cfg, args, output.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
