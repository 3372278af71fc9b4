//! KPC - Symbol resolution for KPC assembly
//!
//! This is the main CLI entry point for KPC. Lines and columns are 0-based,
//! matching the language server.

use clap::{Args, Parser, Subcommand};
use kpc::config::KpcConfig;
use kpc::error::{KpcError, Result};
use kpc::lsp::{format_text, FormattingOptions, HoverProvider};
use kpc::resolve::corpus::{path_to_uri, uri_to_path};
use kpc::resolve::{
    definition_symbols, document_highlights, find_references, resolve_definition, CancellationToken,
    Corpus, Document, FsCorpus, Location, Position,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// KPC - symbol resolution for KPC assembly
#[derive(Parser)]
#[command(name = "kpc")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Symbol resolution and formatting for KPC assembly", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file to use instead of the workspace's
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the definition of the identifier at a position
    Definition(Cursor),

    /// Find every reference to the definition of the identifier at a position
    References(Cursor),

    /// Find occurrences of the identifier at a position within its region
    Highlight(Cursor),

    /// Show hover text for a position
    Hover(Cursor),

    /// List the symbols a file defines
    Symbols {
        /// Source file
        file: PathBuf,
    },

    /// Re-indent a file
    Format {
        /// Source file
        file: PathBuf,
        /// Only report whether the file is formatted
        #[arg(long)]
        check: bool,
    },
}

/// A file position
#[derive(Args)]
struct Cursor {
    /// Source file
    file: PathBuf,
    /// 0-based line
    line: usize,
    /// 0-based column
    column: usize,
}

impl Cursor {
    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let root = root.canonicalize().unwrap_or(root);
    let config = KpcConfig::load(cli.config.as_deref(), &root)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(&config.log_level)
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!("Workspace root: {}", root.display());
    let corpus = FsCorpus::with_config(&root, &config);
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Definition(cursor) => {
            let document = open(&corpus, &cursor.file)?;
            let location = resolve_definition(&corpus, &document, cursor.position(), &cancel)
                .map(|definition| definition.location);
            if cli.json {
                print_json(&location)?;
            } else if let Some(location) = location {
                println!("{}", display_location(&location));
            } else {
                println!("No definition found");
            }
        }

        Commands::References(cursor) => {
            let document = open(&corpus, &cursor.file)?;
            let locations: Vec<Location> = find_references(&corpus, &document, cursor.position(), &cancel)
                .into_iter()
                .map(|reference| reference.location)
                .collect();
            if cli.json {
                print_json(&locations)?;
            } else {
                for location in &locations {
                    println!("{}", display_location(location));
                }
            }
        }

        Commands::Highlight(cursor) => {
            let document = open(&corpus, &cursor.file)?;
            let ranges = document_highlights(&document, cursor.position());
            if cli.json {
                print_json(&ranges)?;
            } else {
                for range in &ranges {
                    println!(
                        "{}:{}-{}  {}",
                        range.start.line,
                        range.start.character,
                        range.end.character,
                        document.line_at(range.start.line as usize).trim()
                    );
                }
            }
        }

        Commands::Hover(cursor) => {
            let document = open(&corpus, &cursor.file)?;
            let hover = HoverProvider::new().get_hover(&corpus, &document, cursor.position(), &cancel);
            if cli.json {
                print_json(&hover)?;
            } else if let Some(hover) = hover {
                println!("{}", hover.contents.value.trim());
            }
        }

        Commands::Symbols { file } => {
            let document = open(&corpus, &file)?;
            let symbols = definition_symbols(&document);
            if cli.json {
                print_json(&symbols)?;
            } else {
                println!("{:<8} {:<10} {:<16} {:<16} IDENTIFIER", "LINE", "KIND", "MODULE", "REGION");
                for symbol in &symbols {
                    println!(
                        "{:<8} {:<10} {:<16} {:<16} {}",
                        symbol.range.start.line,
                        symbol.kind,
                        symbol.context.module.as_deref().unwrap_or("-"),
                        symbol.context.region.as_deref().unwrap_or("-"),
                        symbol.identifier
                    );
                }
            }
        }

        Commands::Format { file, check } => {
            let document = open(&corpus, &file)?;
            let options = FormattingOptions {
                tab_size: config.format.tab_size,
                insert_spaces: config.format.insert_spaces,
            };
            let formatted = format_text(&document, &options);
            let changed = formatted != document.text();

            if check {
                if changed {
                    println!("{} is not formatted", file.display());
                    std::process::exit(1);
                }
            } else if changed {
                std::fs::write(&file, format!("{}\n", formatted))?;
                println!("Formatted {}", file.display());
            }
        }
    }

    Ok(())
}

/// Open `file` through the corpus so URIs match workspace enumeration
fn open(corpus: &FsCorpus, file: &Path) -> Result<Document> {
    let path = file
        .canonicalize()
        .map_err(|_| KpcError::DocumentNotFound(file.display().to_string()))?;
    corpus.open(&path_to_uri(&path))
}

fn display_location(location: &Location) -> String {
    let path = uri_to_path(&location.uri)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| location.uri.clone());
    format!(
        "{}:{}:{}",
        path, location.range.start.line, location.range.start.character
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
