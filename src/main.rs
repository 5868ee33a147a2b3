//! NonDB CLI - inspect and maintain a filesystem-native document store

mod commands;

use clap::{Parser, Subcommand};
use commands::Session;
use nondb::config::default_config_path;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "nondb")]
#[command(version)]
#[command(about = "Filesystem-native JSON document store")]
#[command(long_about = r#"
NonDB stores one JSON document per file and keeps secondary indices as
directories of symbolic links:

  <root>/<Table>/<key>.json
  <root>/<Table>/_index@<expr>/<value>/<key>.json -> ../../<key>.json

Example usage:
  nondb init --root ./data
  nondb put Person '{"id": 1, "name": "Alice", "category": "admin"}'
  nondb index rebuild Person category
  nondb find Person category admin
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database root directory (overrides the config file)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a nondb.toml config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Save one record (or a JSON array of records), from the argument or stdin
    Put {
        table: String,
        record: Option<String>,
    },

    /// Print the record stored under a primary key
    Get { table: String, key: String },

    /// Delete the record stored under a primary key
    Delete { table: String, key: String },

    /// List primary keys
    Keys { table: String },

    /// Print every record
    List { table: String },

    /// Exact-match lookup through an index
    Find {
        table: String,
        /// Index key-expression, e.g. `category` or `address.city`
        index: String,
        value: String,
    },

    /// Index maintenance
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Show a summary of a table
    Stat { table: String },

    /// Delete a table with all of its records and indices
    Drop {
        table: String,
        /// Fail if the table does not exist
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Regenerate an index from every record
    Rebuild { table: String, expr: String },
    /// Remove dangling links and empty directories
    Vacuum { table: String, expr: String },
    /// Delete an index tree
    Remove { table: String, expr: String },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run(cli) {
        nondb::ui::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        config,
        root,
        json,
        command,
        ..
    } = cli;
    let config_path = config.clone().unwrap_or_else(default_config_path);
    let session = || Session::load(&config_path, config.is_some(), root.clone(), json);

    match command {
        Commands::Init { force } => commands::run_init(&config_path, root.clone(), force),
        Commands::Put { table, record } => commands::run_put(&session()?, &table, record),
        Commands::Get { table, key } => commands::run_get(&session()?, &table, &key),
        Commands::Delete { table, key } => commands::run_delete(&session()?, &table, &key),
        Commands::Keys { table } => commands::run_keys(&session()?, &table),
        Commands::List { table } => commands::run_list(&session()?, &table),
        Commands::Find { table, index, value } => {
            commands::run_find(&session()?, &table, &index, &value)
        }
        Commands::Index { action } => match action {
            IndexAction::Rebuild { table, expr } => {
                commands::run_index_rebuild(&session()?, &table, &expr)
            }
            IndexAction::Vacuum { table, expr } => {
                commands::run_index_vacuum(&session()?, &table, &expr)
            }
            IndexAction::Remove { table, expr } => {
                commands::run_index_remove(&session()?, &table, &expr)
            }
        },
        Commands::Stat { table } => commands::run_stat(&session()?, &table),
        Commands::Drop { table, strict } => commands::run_drop(&session()?, &table, strict),
    }
}
