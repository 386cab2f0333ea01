//! Wildcard Hub command line
//!
//! Opens the file-backed store in the data directory, runs one command and
//! prints the result.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wildcard_hub_core::{
    bootstrap::EmptyBootstrap, storage::FileBackend, StoreConfig, WildcardStore,
};

#[derive(Parser)]
#[command(name = "wildcard-hub")]
#[command(about = "Edit hierarchical wildcard word lists")]
struct Cli {
    /// Directory holding the persisted document and history
    #[arg(long, env = "WILDCARD_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// JSON store configuration; `WILDCARD_*` variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the whole tree, or the node at PATH
    Show { path: Option<String> },

    /// List categories that carry entries
    Paths {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Create a category and any missing parents
    Create { path: String },

    Delete { path: String },

    Rename { path: String, name: String },

    /// Move a category under PARENT (empty for top level)
    Move { path: String, parent: String },

    /// Add words to a category
    Add {
        path: String,
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Remove words from a category
    Remove {
        path: String,
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Set a category's instruction
    Instruct { path: String, text: String },

    Pin { path: String },

    Unpin { path: String },

    Undo,

    Redo,

    /// List checkpoints, marking the current one
    History,

    /// Replace the document with a JSON file
    Import { file: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(cli)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<StoreConfig> {
    match path {
        Some(path) => StoreConfig::from_json_file(path),
        None => Ok(StoreConfig::from_env()),
    }
}

fn open_store(cli: &Cli) -> Result<WildcardStore> {
    let config = load_config(cli.config.as_ref())?;
    tracing::debug!(data_dir = %cli.data_dir.display(), ?config, "opening store");
    let mut backend = FileBackend::new(&cli.data_dir)?;
    if let Some(quota) = config.quota_bytes {
        backend = backend.with_quota(quota);
    }
    Ok(WildcardStore::open(config, backend, &EmptyBootstrap))
}

fn ensure(done: bool, what: impl FnOnce() -> String) -> Result<String> {
    if !done {
        bail!("{}", what());
    }
    Ok(String::new())
}

fn run(cli: Cli) -> Result<String> {
    let mut store = open_store(&cli)?;
    match cli.command {
        Commands::Show { path } => {
            let node = match path.as_deref() {
                Some(path) => store
                    .get_by_path(path)
                    .with_context(|| format!("no node at `{}`", path))?,
                None => store.tree(),
            };
            Ok(serde_json::to_string_pretty(node)?)
        }
        Commands::Paths { search } => {
            let paths = match search {
                Some(term) => store.search_paths(&term),
                None => store.entry_paths(),
            };
            Ok(paths.join("\n"))
        }
        Commands::Create { path } => ensure(store.create_category(&path), || {
            format!("cannot create `{}`: it exists or is not a valid path", path)
        }),
        Commands::Delete { path } => ensure(store.delete_category(&path), || {
            format!("no category at `{}`", path)
        }),
        Commands::Rename { path, name } => ensure(store.rename_category(&path, &name), || {
            format!("cannot rename `{}` to `{}`", path, name)
        }),
        Commands::Move { path, parent } => ensure(store.move_category(&path, &parent), || {
            format!("cannot move `{}` under `{}`", path, parent)
        }),
        Commands::Add { path, words } => {
            let added = store.batch(|store| {
                words
                    .iter()
                    .filter(|word| store.add_wildcard(&path, word))
                    .count()
            });
            Ok(format!("added {}", added))
        }
        Commands::Remove { path, words } => {
            let words: Vec<&str> = words.iter().map(String::as_str).collect();
            let removed = store.remove_wildcards(&path, &words);
            Ok(format!("removed {}", removed))
        }
        Commands::Instruct { path, text } => ensure(store.set_instruction(&path, &text), || {
            format!("no category at `{}`", path)
        }),
        Commands::Pin { path } => ensure(store.pin(&path), || {
            format!("cannot pin `{}`", path)
        }),
        Commands::Unpin { path } => ensure(store.unpin(&path), || {
            format!("`{}` is not pinned", path)
        }),
        Commands::Undo => ensure(store.undo(), || "nothing to undo".to_string()),
        Commands::Redo => ensure(store.redo(), || "nothing to redo".to_string()),
        Commands::History => {
            let cursor = store.history_cursor();
            let lines: Vec<String> = store
                .history()
                .checkpoints()
                .iter()
                .enumerate()
                .map(|(i, checkpoint)| {
                    let marker = if i == cursor { "*" } else { " " };
                    format!("{} {:>3} {}", marker, i, checkpoint.taken_at.to_rfc3339())
                })
                .collect();
            Ok(lines.join("\n"))
        }
        Commands::Import { file } => {
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let raw = serde_json::from_str(&data)
                .with_context(|| format!("parsing {}", file.display()))?;
            store.import_tree(raw);
            Ok(format!("imported {} lists", store.entry_paths().len()))
        }
    }
}
