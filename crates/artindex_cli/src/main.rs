//! artindex CLI
//!
//! Command-line tools for repository indexes and artifact metadata.
//!
//! # Commands
//!
//! - `rebuild` - Reindex a storage, repository or path and regenerate metadata
//! - `rebuild-metadata` - Regenerate metadata without touching the index
//! - `search` - Query a repository index
//! - `metadata` - Print the metadata document of one artifact

mod commands;

use artindex_core::{ManagerConfig, RepositoryIndexManager, StaticConfiguration};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// artindex repository index tools.
#[derive(Parser)]
#[command(name = "artindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding one subdirectory per storage
    #[arg(global = true, short, long)]
    base: Option<PathBuf>,

    /// JSON file with per-repository settings
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Selects what a rebuild covers.
#[derive(Args)]
struct Scope {
    /// Storage identifier
    #[arg(short, long)]
    storage: String,

    /// Repository identifier; every repository of the storage if omitted
    #[arg(short, long)]
    repository: Option<String>,

    /// Path inside the repository; the whole repository if omitted
    #[arg(short, long, requires = "repository")]
    path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reindex artifact files and regenerate metadata
    Rebuild(Scope),

    /// Regenerate metadata only
    RebuildMetadata(Scope),

    /// Query a repository index
    Search {
        /// Storage identifier
        #[arg(short, long)]
        storage: String,

        /// Repository identifier
        #[arg(short, long)]
        repository: String,

        /// Query, e.g. "+g:org.example +a:lib c:sources"
        query: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the metadata document of one artifact
    Metadata {
        /// Storage identifier
        #[arg(short, long)]
        storage: String,

        /// Repository identifier
        #[arg(short, long)]
        repository: String,

        /// Group identifier
        #[arg(short, long)]
        group: String,

        /// Artifact identifier
        #[arg(short, long)]
        artifact: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("artindex CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("artindex core v{}", artindex_core::VERSION);
        return Ok(());
    }

    let base = cli.base.ok_or("storage base directory required (--base)")?;
    let configuration = match &cli.config {
        Some(path) => StaticConfiguration::from_json(&fs::read_to_string(path)?)?,
        None => StaticConfiguration::new(),
    };
    let manager = Arc::new(RepositoryIndexManager::for_directory(
        base,
        ManagerConfig::default().create_if_missing(false),
        Arc::new(configuration),
    ));

    match cli.command {
        Commands::Rebuild(scope) => commands::rebuild::run(
            &manager,
            &scope.storage,
            scope.repository.as_deref(),
            scope.path.as_deref(),
            commands::rebuild::Mode::Full,
        )?,
        Commands::RebuildMetadata(scope) => commands::rebuild::run(
            &manager,
            &scope.storage,
            scope.repository.as_deref(),
            scope.path.as_deref(),
            commands::rebuild::Mode::MetadataOnly,
        )?,
        Commands::Search {
            storage,
            repository,
            query,
            format,
        } => commands::search::run(&manager, &storage, &repository, &query, &format)?,
        Commands::Metadata {
            storage,
            repository,
            group,
            artifact,
        } => commands::metadata::run(&manager, &storage, &repository, &group, &artifact)?,
        Commands::Version => {}
    }

    manager.close_all()?;
    Ok(())
}
