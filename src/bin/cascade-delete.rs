use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use cascade_delete::{
    CascadeConfig, CascadeDeleter, CascadeStore, CascadeSummary, DeleteResult, DependencyNode,
    EntityId, dry_run::DryRunStore, sqlite::SqliteStore,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;

const EXIT_FAILURES: i32 = 1;
const EXIT_FATAL: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "cascade-delete",
    version,
    about = "Delete records from a SQLite database after clearing restrict-delete dependents"
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cascade-delete records of an entity.
    Delete(DeleteArgs),
    /// Print the restrict-dependency tree of an entity.
    Deps(DepsArgs),
}

#[derive(Args, Debug)]
struct DeleteArgs {
    #[arg(long)]
    db: PathBuf,

    #[arg(long)]
    entity: String,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    page_size: Option<usize>,

    /// Resolve and look up dependents without deleting anything.
    #[arg(long)]
    dry_run: bool,

    /// File with one id per line; blank lines and `#` comments are skipped.
    #[arg(long)]
    ids_file: Option<PathBuf>,

    ids: Vec<String>,
}

#[derive(Args, Debug)]
struct DepsArgs {
    #[arg(long)]
    db: PathBuf,

    #[arg(long)]
    entity: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => match CascadeConfig::load(path) {
            Ok(config) => config,
            Err(err) => fatal(err),
        },
        None => CascadeConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    let code = match &cli.command {
        Command::Delete(args) => {
            apply_overrides(&mut config, args);
            if let Err(err) = config.validate() {
                fatal(err);
            }
            config.logging.init();
            run_delete(&config, args, cli.format)
        }
        Command::Deps(args) => {
            config.logging.init();
            run_deps(&config, args, cli.format)
        }
    };
    process::exit(code);
}

fn apply_overrides(config: &mut CascadeConfig, args: &DeleteArgs) {
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if args.dry_run {
        config.dry_run = true;
    }
}

fn run_delete(config: &CascadeConfig, args: &DeleteArgs, format: OutputFormat) -> i32 {
    let ids = match collect_ids(args) {
        Ok(ids) => ids,
        Err(err) => fatal(err),
    };
    let store = match open_store(&args.db, config) {
        Ok(store) => store,
        Err(err) => fatal(err),
    };
    let deleter = match CascadeDeleter::from_config(store, config) {
        Ok(deleter) => deleter,
        Err(err) => fatal(err),
    };
    let results = match deleter.cascade_delete(&args.entity, &ids) {
        Ok(results) => results,
        Err(err) => fatal(format!("cascade failed: {err}")),
    };
    let summary = CascadeSummary::from_results(&results);
    print_results(&results, &summary, config.dry_run, format);
    if summary.has_failures() {
        EXIT_FAILURES
    } else {
        0
    }
}

fn run_deps(config: &CascadeConfig, args: &DepsArgs, format: OutputFormat) -> i32 {
    let store = match open_store(&args.db, config) {
        Ok(store) => store,
        Err(err) => fatal(err),
    };
    let plan = match CascadeDeleter::new(store).resolve_plan(&args.entity) {
        Ok(plan) => plan,
        Err(err) => fatal(err),
    };
    match format {
        OutputFormat::Json => println!("{}", json!(plan)),
        OutputFormat::Text => print_plan(&plan, 0),
    }
    0
}

fn open_store(path: &Path, config: &CascadeConfig) -> Result<Box<dyn CascadeStore>, String> {
    if !path.exists() {
        return Err(format!("database {} does not exist", path.display()));
    }
    let store = SqliteStore::open(path)
        .map_err(|e| e.to_string())?
        .with_page_size(config.page_size);
    if config.dry_run {
        Ok(Box::new(DryRunStore::new(store)))
    } else {
        Ok(Box::new(store))
    }
}

fn collect_ids(args: &DeleteArgs) -> Result<Vec<EntityId>, String> {
    let mut raw: Vec<String> = args.ids.clone();
    if let Some(path) = &args.ids_file {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        raw.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }
    raw.iter()
        .map(|value| {
            value
                .parse::<EntityId>()
                .map_err(|e| format!("invalid id {value}: {e}"))
        })
        .collect()
}

fn print_results(
    results: &[DeleteResult],
    summary: &CascadeSummary,
    dry_run: bool,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let document = json!({
                "dry_run": dry_run,
                "results": results,
                "summary": summary,
            });
            println!("{document}");
        }
        OutputFormat::Text => {
            for result in results {
                println!("{result}");
            }
            eprintln!("{summary}");
        }
    }
}

fn print_plan(node: &DependencyNode, indent: usize) {
    let pad = "  ".repeat(indent);
    match &node.lookup_field {
        None => println!("{pad}{}", node.entity),
        Some(field) if node.cycle => println!("{pad}{}.{field} (cycle)", node.entity),
        Some(field) => println!("{pad}{}.{field}", node.entity),
    }
    for child in &node.dependents {
        print_plan(child, indent + 1);
    }
}

fn fatal(err: impl std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    process::exit(EXIT_FATAL);
}
