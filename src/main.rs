use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use symindex::config::IndexConfig;
use symindex::index::{ContainerMatch, ExternalFilter, FileFilter, ProjectIndex, SymbolQuery};
use symindex::logging::{LogConfig, init_logging};
use symindex::provider::{ProviderError, SymbolProvider};
use symindex::symbol::{KindSet, SymbolEntry};

/// Inspect the persistent symbol index of a project
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project root directory (defaults to current directory)
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log file path (overrides SYMINDEX_LOG_FILE env var)
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show statistics of the cached index
    Stats,

    /// Query cached symbols
    Query {
        /// Case-insensitive substring of the symbol name
        #[arg(long)]
        name: Option<String>,

        /// Comma separated kinds, by name or LSP code (e.g. "class,12")
        #[arg(long, value_name = "KINDS")]
        kind: Option<String>,

        /// File path or glob, relative to the root
        #[arg(long, value_name = "PATH")]
        file: Option<String>,

        /// Substring of the enclosing symbol name
        #[arg(long)]
        container: Option<String>,

        /// Only consider top-level symbols
        #[arg(long)]
        top_level: bool,

        /// Include symbols of indexed dependencies
        #[arg(long)]
        include_external: bool,

        /// Only symbols of indexed dependencies
        #[arg(long)]
        only_external: bool,

        /// Restrict to one dependency
        #[arg(long, value_name = "NAME")]
        library: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// List the imports of a file
    Imports { file: PathBuf },

    /// Resolve a name imported by a file
    Resolve {
        name: String,

        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// List dependencies declared by the project's manifests
    Deps,

    /// Delete the persistent cache
    Clear,
}

/// Provider used when no language server is attached
///
/// Every request fails, so only cached symbols are ever visible.
struct OfflineProvider;

#[async_trait]
impl SymbolProvider for OfflineProvider {
    async fn document_symbols(&self, uri: &str) -> Result<Vec<SymbolEntry>, ProviderError> {
        Err(ProviderError::Unavailable(format!(
            "no language server attached to fetch {}",
            uri
        )))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_config = LogConfig::from_env().with_overrides(args.log_level, args.log_file);
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let config = IndexConfig::from_env(root)?;
    let index = ProjectIndex::open(config, Arc::new(OfflineProvider)).await?;
    info!("Opened index at {}", index.root().display());

    match args.command {
        Command::Stats => print_json(&index.get_stats().await)?,
        Command::Query {
            name,
            kind,
            file,
            container,
            top_level,
            include_external,
            only_external,
            library,
            limit,
        } => {
            let mut query = SymbolQuery::new()
                .include_children(!top_level)
                .external(ExternalFilter::from_flags(
                    include_external,
                    only_external || library.is_some(),
                ));
            if let Some(name) = name {
                query = query.name(name);
            }
            if let Some(kind) = kind {
                query = query.kinds(KindSet::parse_list(&kind)?);
            }
            if let Some(file) = file {
                query = query.file(FileFilter::parse(&file, index.root()));
            }
            if let Some(container) = container {
                query = query.container(ContainerMatch::Contains(container));
            }
            if let Some(library) = library {
                query = query.source_library(library);
            }

            let mut symbols = index.query_symbols(&query).await;
            if let Some(limit) = limit {
                symbols.truncate(limit);
            }
            print_json(&symbols)?;
        }
        Command::Imports { file } => print_json(&index.imports_of(&file).await?)?,
        Command::Resolve { name, file } => {
            print_json(&index.resolve_symbol_from_imports(&name, &file).await?)?
        }
        Command::Deps => print_json(&index.dependencies().await?)?,
        Command::Clear => {
            index.force_clear().await?;
            println!("Deleted index cache under {}", index.root().display());
        }
    }

    Ok(())
}
