//! # RestPose CLI (`rp`)
//!
//! Inspect a RestPose server from the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rp status` | Print the server status |
//! | `rp collections` | List collection names |
//! | `rp search <coll>` | Run a search and print one window of results |
//! | `rp get <coll> <type> <id>` | Print a stored document |
//! | `rp checkpoint <coll>` | Create a checkpoint, optionally waiting for it |
//!
//! ## Examples
//!
//! ```bash
//! rp --uri http://127.0.0.1:7777 status
//! rp search my_coll --type blurb --field tag --is "A tag"
//! rp search my_coll --text text --query "hello world" --from 10 --size 5 --exact
//! rp checkpoint my_coll --wait
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use restpose::checkpoint::WaitPolicy;
use restpose::config::{load_config, ClientConfig};
use restpose::{Query, QueryTarget, Server, EXACT_COUNT};

/// RestPose command-line client.
#[derive(Parser)]
#[command(name = "rp", about = "Command-line client for a RestPose search server", version)]
struct Cli {
    /// Path to a configuration file (TOML). Built-in defaults apply when
    /// omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server URI, overriding the configuration file.
    #[arg(long, global = true)]
    uri: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the server status.
    Status,

    /// List the collections on the server.
    Collections,

    /// Search a collection.
    ///
    /// Exactly one of `--all`, `--field`/`--is` or `--text`/`--query`
    /// selects the query.
    Search {
        /// Collection to search.
        collection: String,

        /// Restrict the search to one document type.
        #[arg(long = "type")]
        doc_type: Option<String>,

        /// Match every document.
        #[arg(long)]
        all: bool,

        /// Field for an exact-value query (with `--is`).
        #[arg(long, requires = "is")]
        field: Option<String>,

        /// Value for an exact-value query.
        #[arg(long, requires = "field")]
        is: Option<String>,

        /// Field for a text query (with `--query`).
        #[arg(long, requires = "query")]
        text: Option<String>,

        /// Text to search for.
        #[arg(long, requires = "text")]
        query: Option<String>,

        /// Rank of the first result to show.
        #[arg(long, default_value_t = 0)]
        from: u64,

        /// Number of results to show (defaults to the configured page size).
        #[arg(long)]
        size: Option<u64>,

        /// Ask the server for an exact match count.
        #[arg(long)]
        exact: bool,
    },

    /// Print a stored document.
    Get {
        collection: String,
        doc_type: String,
        id: String,
    },

    /// Create a checkpoint in a collection.
    Checkpoint {
        collection: String,

        /// Block until the checkpoint is reached.
        #[arg(long)]
        wait: bool,

        /// Do not commit pending changes when the checkpoint is reached.
        #[arg(long)]
        no_commit: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "restpose=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_query<T: QueryTarget>(
    target: &T,
    all: bool,
    field: Option<(String, String)>,
    text: Option<(String, String)>,
) -> anyhow::Result<Query> {
    match (all, field, text) {
        (true, None, None) => Ok(target.query_all()),
        (false, Some((field, value)), None) => Ok(target.field_is(&field, json!(value))),
        (false, None, Some((field, text))) => Ok(target.field_text(&field, &text, None, None)),
        _ => bail!("specify exactly one of --all, --field/--is or --text/--query"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(uri) = cli.uri {
        cfg.server.uri = uri;
    }
    let server = Server::from_config(&cfg)?;

    match cli.command {
        Commands::Status => print_json(&server.status()?)?,
        Commands::Collections => {
            for name in server.collections()? {
                println!("{}", name);
            }
        }
        Commands::Search {
            collection,
            doc_type,
            all,
            field,
            is,
            text,
            query,
            from,
            size,
            exact,
        } => {
            let coll = server.collection(&collection)?;
            let field = field.zip(is);
            let text = text.zip(query);
            let query = match doc_type {
                Some(name) => build_query(&coll.doc_type(&name)?, all, field, text)?,
                None => build_query(&coll, all, field, text)?,
            };

            let size = size.unwrap_or(cfg.search.page_size);
            let to = i64::try_from(from.saturating_add(size)).context("--from/--size too large")?;
            let from = i64::try_from(from).context("--from too large")?;
            let mut view = query
                .search()
                .with_page_size(cfg.search.page_size)
                .slice(from..to)?;
            if exact {
                view = view.check_at_least(EXACT_COUNT);
            }
            println!("{}", view.results()?);
        }
        Commands::Get {
            collection,
            doc_type,
            id,
        } => {
            let doc = server.collection(&collection)?.get_doc(&doc_type, &id)?;
            print_json(doc.raw())?;
        }
        Commands::Checkpoint {
            collection,
            wait,
            no_commit,
        } => {
            let mut checkpoint = server.collection(&collection)?.checkpoint(!no_commit)?;
            println!("{}", checkpoint.checkid());
            if wait {
                let policy = WaitPolicy::from_config(&cfg.checkpoint);
                let waited = checkpoint.wait(&policy)?;
                let errors = checkpoint.total_errors()?;
                println!("reached after {:?} ({} errors)", waited, errors);
                for error in checkpoint.errors()? {
                    print_json(&error)?;
                }
            }
        }
    }

    Ok(())
}
