use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use autotable_core::{Context, InsertStatement, QueryStatement};
use autotable_sqlite::{SqliteStore, StoreConfig, open_store};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "autotable")]
#[command(about = "Insert JSON rows into SQLite tables that grow to fit them")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Path to a YAML store configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file; overrides `engine.path` from the configuration.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Deadline for each store operation, in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Insert one JSON object, or a file of newline-delimited objects.
    Insert(InsertArgs),
    /// Run a read query and print the rows as a JSON array.
    Query(QueryArgs),
    /// Write a configuration file with every default filled in.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct InsertArgs {
    /// Target table; created on first insert.
    #[arg(long)]
    table: String,
    /// A single JSON object.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    json: Option<String>,
    /// File with one JSON object per line.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Number of parallel insert jobs for --file (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// SQL to run verbatim.
    sql: String,
    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Output YAML path.
    path: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Insert(args) => run_insert(&cli.store, args),
        Command::Query(args) => run_query(&cli.store, args),
        Command::InitConfig(args) => run_init_config(&cli.store, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("autotable=debug,autotable_core=debug,autotable_sqlite=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &StoreArgs) -> Result<StoreConfig, String> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(db) = &args.db {
        config.engine.path = Some(db.clone());
    }
    if config.engine.path.is_none() {
        warn!("no database path configured; rows go to an in-memory database and are discarded on exit");
    }
    Ok(config)
}

fn open(args: &StoreArgs) -> Result<SqliteStore, String> {
    let config = load_config(args)?;
    open_store(&config).map_err(|e| format!("Failed to open store: {e}"))
}

fn context(args: &StoreArgs) -> Context {
    match args.timeout_ms {
        Some(ms) => Context::with_timeout(Duration::from_millis(ms)),
        None => Context::background(),
    }
}

fn run_insert(store_args: &StoreArgs, args: InsertArgs) -> Result<(), String> {
    let statements = match (&args.json, &args.file) {
        (Some(raw), _) => vec![(1, parse_row(&args.table, raw)?)],
        (None, Some(path)) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
            parse_rows(&args.table, &raw)?
        }
        (None, None) => return Err("Specify --json or --file".to_string()),
    };

    let store = open(store_args)?;
    let result = insert_all(&store, store_args, &statements, args.jobs);
    store.close().map_err(|e| e.to_string())?;
    let inserted = result?;

    println!("Inserted {inserted} row(s) into '{}'.", args.table);
    Ok(())
}

fn insert_all(
    store: &SqliteStore,
    store_args: &StoreArgs,
    statements: &[(usize, InsertStatement)],
    jobs: Option<usize>,
) -> Result<usize, String> {
    use rayon::prelude::*;

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = jobs {
        builder = builder.num_threads(jobs);
    }
    let pool = builder
        .build()
        .map_err(|e| format!("Failed to create thread pool: {e}"))?;

    let failures: Vec<(usize, String)> = pool.install(|| {
        statements
            .par_iter()
            .filter_map(|(line, stmt)| {
                store
                    .insert(stmt, &context(store_args))
                    .err()
                    .map(|err| (*line, err.to_string()))
            })
            .collect()
    });

    if failures.is_empty() {
        debug!(rows = statements.len(), "all rows inserted");
        return Ok(statements.len());
    }

    let mut failures = failures;
    failures.sort_by_key(|(line, _)| *line);
    for (line, err) in &failures {
        eprintln!("  line {line}: {err}");
    }
    Err(format!(
        "{} of {} row(s) failed to insert",
        failures.len(),
        statements.len()
    ))
}

fn parse_row(table: &str, raw: &str) -> Result<InsertStatement, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("Invalid JSON: {e}"))?;
    InsertStatement::from_json(table, &value).map_err(|e| e.to_string())
}

/// Parses newline-delimited JSON, keeping 1-based line numbers. Blank lines
/// are skipped.
fn parse_rows(table: &str, raw: &str) -> Result<Vec<(usize, InsertStatement)>, String> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse_row(table, line)
                .map(|stmt| (idx + 1, stmt))
                .map_err(|e| format!("line {}: {e}", idx + 1))
        })
        .collect()
}

fn run_query(store_args: &StoreArgs, args: QueryArgs) -> Result<(), String> {
    let store = open(store_args)?;
    let result = store.query(&QueryStatement::new(args.sql), &context(store_args));
    store.close().map_err(|e| e.to_string())?;
    let rows = result.map_err(|e| e.to_string())?;

    let raw = if args.pretty {
        serde_json::to_string_pretty(&rows)
    } else {
        serde_json::to_string(&rows)
    }
    .map_err(|e| format!("Failed to serialize rows: {e}"))?;
    println!("{raw}");
    Ok(())
}

fn run_init_config(store_args: &StoreArgs, args: InitConfigArgs) -> Result<(), String> {
    if args.path.exists() && !args.force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            args.path.display()
        ));
    }

    let mut config = StoreConfig::default();
    config.engine.path = store_args.db.clone();

    if let Some(parent) = args.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    config
        .save(&args.path)
        .map_err(|e| format!("Failed to write '{}': {e}", args.path.display()))?;

    println!("Wrote configuration to '{}'.", args.path.display());
    Ok(())
}
