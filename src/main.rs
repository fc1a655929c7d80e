use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use aifbin_recall::{cli, config, server, tools};

#[derive(Parser)]
#[command(name = "aifbin-recall", version, about = "Local-first retrieval over .aif-bin memory files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the tool-protocol server (stdio transport)
    Serve,
    /// Start the HTTP/JSON server
    Http,
    /// Index a directory of .aif-bin files into a collection
    Index {
        path: PathBuf,
        #[arg(short, long)]
        collection: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Search indexed chunks
    Search {
        query: String,
        #[arg(short, long)]
        collection: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List collections
    Collections {
        /// Delete the named collection instead of listing
        #[arg(long)]
        delete: Option<String>,
    },
    /// List indexed source files
    Files {
        #[arg(short, long)]
        collection: Option<String>,
    },
    /// Parse a .aif-bin file and report its contents without indexing
    Inspect { file: PathBuf },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the configured embedding model to the cache directory
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::RecallConfig::load()?;

    // Initialize tracing with the configured log level.
    // Log to stderr so stdout stays clean for the framed tool protocol.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            tools::serve_stdio(config).await?;
        }
        Command::Http => {
            server::serve(config).await?;
        }
        Command::Index {
            path,
            collection,
            recursive,
        } => {
            cli::index::index(&config, &path, &collection, recursive)?;
        }
        Command::Search {
            query,
            collection,
            limit,
        } => {
            cli::search::search(&config, &query, collection.as_deref(), limit)?;
        }
        Command::Collections { delete } => match delete {
            Some(name) => cli::collections::delete(&config, &name)?,
            None => cli::collections::list(&config)?,
        },
        Command::Files { collection } => {
            cli::files::list(&config, collection.as_deref())?;
        }
        Command::Inspect { file } => {
            cli::inspect::inspect(&file)?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}
