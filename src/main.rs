//! CLI entry point for the vector store.
//!
//! Thin operator surface over [`FilesystemVectorStore`]: create collections,
//! switch index types, bulk-load JSON-lines files inside an indexing bracket,
//! and run searches.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use rayon::prelude::*;

use codevec::display::{collection_table, create_progress_bar, search_results_table};
use codevec::{FilesystemVectorStore, IndexType, Point, PointId, Settings, StoreError};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Filesystem-backed vector store
#[derive(Parser)]
#[command(
    name = "codevec",
    version = env!("CARGO_PKG_VERSION"),
    about = "Filesystem-backed vector store for semantic code search",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (overrides store.base_path)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .codevec/settings.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Create an empty collection
    Create {
        name: String,

        /// Embedding dimensionality
        #[arg(short, long)]
        size: usize,

        /// Initial index type (binary or hnsw)
        #[arg(long, default_value = "binary")]
        index_type: String,
    },

    /// Switch a collection between the binary and HNSW index
    #[command(name = "index-type")]
    IndexType {
        name: String,

        /// binary or hnsw
        index_type: String,
    },

    /// Bulk-load points from a JSON-lines file
    #[command(
        after_help = "Each line is {\"id\": \"...\", \"vector\": [...], \"payload\": {...}}.\n\nExamples:\n  codevec upsert chunks points.jsonl --progress\n  codevec upsert chunks changed.jsonl --skip-hnsw-rebuild"
    )]
    Upsert {
        name: String,

        file: PathBuf,

        /// Number of threads to use (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Mark an HNSW graph stale instead of rebuilding it
        #[arg(long)]
        skip_hnsw_rebuild: bool,

        /// Rebuild after every batch instead of once at the end
        #[arg(long)]
        no_bracket: bool,

        /// Show progress during loading
        #[arg(short, long)]
        progress: bool,
    },

    /// Bring the active index up to date (or mark HNSW stale)
    #[command(name = "end-indexing")]
    EndIndexing {
        name: String,

        #[arg(long)]
        skip_hnsw_rebuild: bool,
    },

    /// Rebuild the active index from every stored vector
    Rebuild { name: String },

    /// Nearest neighbours of a vector or of a stored point
    Search {
        name: String,

        /// Query vector as a JSON array
        #[arg(long, conflicts_with = "like")]
        vector: Option<String>,

        /// Use the stored vector of this point id as the query
        #[arg(long)]
        like: Option<String>,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Include the per-stage timing map
        #[arg(long)]
        timing: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete points by id
    Delete {
        name: String,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Remove every point, keeping the collection
    Clear { name: String },

    /// Delete a collection and its directory
    Drop { name: String },

    /// Show collection details
    Info {
        name: String,

        #[arg(long)]
        json: bool,
    },

    /// List collections
    List,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        if let Some(store_error) = e.downcast_ref::<StoreError>() {
            for suggestion in store_error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        }),
    };
    if let Some(store) = &cli.store {
        settings.store.base_path = store.clone();
    }
    Ok(settings)
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    codevec::logging::init(&settings.logging);

    match cli.command {
        Commands::Init { force } => {
            let path = PathBuf::from(".codevec/settings.toml");
            if path.exists() && !force {
                bail!(
                    "Configuration file already exists at: {}\nUse --force to overwrite",
                    path.display()
                );
            }
            Settings::default()
                .save(&path)
                .map_err(|e| anyhow::anyhow!("writing {}: {e}", path.display()))?;
            println!("Created configuration file at: {}", path.display());
            Ok(())
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
        command => {
            let store = FilesystemVectorStore::with_settings(settings)?;
            run_store_command(&store, command)
        }
    }
}

fn run_store_command(store: &FilesystemVectorStore, command: Commands) -> Result<()> {
    let threads = store.settings().indexing.parallel_threads;
    let batch_size = store.settings().indexing.batch_size.max(1);

    match command {
        Commands::Init { .. } | Commands::Config => {}

        Commands::Create {
            name,
            size,
            index_type,
        } => {
            let index_type: IndexType = index_type.parse()?;
            store.create_collection(&name, size)?;
            if index_type != IndexType::Binary {
                store.set_index_type(&name, index_type)?;
            }
            println!("Created collection '{name}' ({size} dimensions, {index_type} index)");
        }

        Commands::IndexType { name, index_type } => {
            let index_type: IndexType = index_type.parse()?;
            store.set_index_type(&name, index_type)?;
            println!("Collection '{name}' now uses the {index_type} index");
        }

        Commands::Upsert {
            name,
            file,
            threads: thread_override,
            skip_hnsw_rebuild,
            no_bracket,
            progress,
        } => {
            let points = read_points(&file)?;
            let total = points.len();
            let batches: Vec<Vec<Point>> =
                points.chunks(batch_size).map(|chunk| chunk.to_vec()).collect();

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(thread_override.unwrap_or(threads).max(1))
                .build()
                .context("building thread pool")?;
            let bar = progress.then(|| create_progress_bar(total as u64, "points"));

            if !no_bracket {
                store.begin_indexing(&name)?;
            }
            let loaded = pool.install(|| {
                batches.into_par_iter().try_for_each(|batch| {
                    let written = store.upsert_points(&name, batch)?;
                    if let Some(bar) = &bar {
                        bar.inc(written as u64);
                    }
                    Ok::<_, StoreError>(())
                })
            });
            if let Some(bar) = &bar {
                bar.finish_and_clear();
            }
            if let Err(e) = loaded {
                // Still close the bracket so what was written gets indexed
                if !no_bracket {
                    let _ = store.end_indexing(&name, skip_hnsw_rebuild);
                }
                return Err(e.into());
            }

            if no_bracket {
                println!("Upserted {total} points into '{name}'");
            } else {
                let report = store.end_indexing(&name, skip_hnsw_rebuild)?;
                println!(
                    "Upserted {total} points into '{name}' ({} indexed{})",
                    report.vectors_indexed,
                    if report.hnsw_skipped {
                        ", HNSW marked stale"
                    } else {
                        ""
                    }
                );
            }
        }

        Commands::EndIndexing {
            name,
            skip_hnsw_rebuild,
        } => {
            let report = store.end_indexing(&name, skip_hnsw_rebuild)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Rebuild { name } => {
            let count = store.rebuild_index(&name)?;
            println!("Rebuilt index for '{name}' from {count} vectors");
        }

        Commands::Search {
            name,
            vector,
            like,
            limit,
            timing,
            json,
        } => {
            let query = match (vector, like) {
                (Some(raw), _) => serde_json::from_str::<Vec<f32>>(&raw)
                    .context("--vector must be a JSON array of numbers")?,
                (None, Some(id)) => {
                    let id = PointId::new(id)?;
                    match store.get_point(&name, &id)? {
                        Some(point) => point.vector,
                        None => bail!("Point '{id}' not found in '{name}'"),
                    }
                }
                (None, None) => bail!("Provide --vector or --like"),
            };

            let response = store.search(&query, &name, limit, timing)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", search_results_table(&response));
                println!("search_path: {}", response.search_path);
                if let Some(reason) = response.fallback_reason {
                    println!("Results may be incomplete until the index is rebuilt ({reason:?})");
                }
                if let Some(timing) = &response.timing {
                    for (stage, ms) in timing.stages() {
                        println!("  {stage}: {ms:.3}");
                    }
                }
            }
        }

        Commands::Delete { name, ids } => {
            let ids = ids
                .into_iter()
                .map(PointId::new)
                .collect::<Result<Vec<_>, _>>()?;
            let removed = store.delete_points(&name, &ids)?;
            println!("Deleted {removed} of {} points from '{name}'", ids.len());
        }

        Commands::Clear { name } => {
            let removed = store.clear_collection(&name)?;
            println!("Cleared {removed} points from '{name}'");
        }

        Commands::Drop { name } => {
            store.delete_collection(&name)?;
            println!("Deleted collection '{name}'");
        }

        Commands::Info { name, json } => {
            let info = store.collection_info(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}", collection_table(&info));
            }
        }

        Commands::List => {
            let names = store.list_collections()?;
            if names.is_empty() {
                println!("No collections in {}", store.base_path().display());
            }
            for name in names {
                println!("{name}");
            }
        }
    }

    Ok(())
}

/// Reads one point per non-empty line.
fn read_points(path: &Path) -> Result<Vec<Point>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut points = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let point: Point = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid point", path.display(), number + 1))?;
        points.push(point);
    }
    Ok(points)
}
