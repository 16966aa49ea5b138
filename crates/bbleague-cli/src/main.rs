// League command-line entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, stdout carries the JSON output)
// 2. Load config
// 3. Open database
// 4. Import the CSV data when the database is empty
// 5. Run the requested command and print its result as JSON

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bbleague_core::model::{EntityKind, SeasonId};
use bbleague_core::scoring::ScoringRule;
use bbleague_core::service::LeagueService;
use bbleague_store::bootstrap;
use bbleague_store::config;
use bbleague_store::db::Database;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "bbleague")]
#[command(about = "Blood Bowl league standings and result submission", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// List seasons
    Seasons,

    /// Make a season the selected one
    Select {
        season_id: SeasonId,
    },

    /// Print a standings table
    Standings {
        /// Season id (defaults to the selected season)
        #[arg(long)]
        season: Option<SeasonId>,

        /// Table grouping
        #[arg(long, value_enum, default_value_t = Grouping::Team)]
        by: Grouping,
    },

    /// Print a casualty table
    Casualties {
        /// Season id (defaults to the selected season)
        #[arg(long)]
        season: Option<SeasonId>,

        /// Table grouping
        #[arg(long, value_enum, default_value_t = Grouping::Team)]
        by: Grouping,
    },

    /// Submit result lines, one per line; `-` reads stdin
    Submit {
        /// Season id (defaults to the selected season)
        #[arg(long)]
        season: Option<SeasonId>,

        /// File with one result per line, or `-`
        source: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Grouping {
    Team,
    Coach,
    Race,
}

impl From<Grouping> for EntityKind {
    fn from(grouping: Grouping) -> Self {
        match grouping {
            Grouping::Team => EntityKind::Team,
            Grouping::Coach => EntityKind::Coach,
            Grouping::Race => EntityKind::Race,
        }
    }
}

/// Result lines from `text`; blank lines and `#` comments are dropped.
fn result_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Initialize tracing
    init_tracing()?;
    info!("bbleague starting: {:?}", cli.command);

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    let default_rule = ScoringRule::parse(&config.scoring.default_rule)
        .context("invalid scoring.default_rule")?;

    // 3. Open database
    let db = Database::open(&config.database.path).context("failed to open database")?;
    info!("Database opened at {}", config.database.path);

    // 4. CSV bootstrap
    if config.bootstrap.enabled {
        let data_dir = Path::new(&config.bootstrap.data_dir);
        match bootstrap::bootstrap_if_empty(&db, data_dir, &default_rule)
            .context("CSV bootstrap failed")?
        {
            Some(summary) => info!("Bootstrapped database from {}: {:?}", data_dir.display(), summary),
            None => info!("No bootstrap needed"),
        }
    }

    // 5. Run the command
    run(cli.command, &db)
}

fn run(command: Command, db: &Database) -> anyhow::Result<()> {
    let service = LeagueService::new(db);
    match command {
        Command::Seasons => print_json(&db.list_seasons(None)?),
        Command::Select { season_id } => {
            db.select_season(season_id)?;
            print_json(&db.season(season_id)?)
        }
        Command::Standings { season, by } => {
            let season_id = resolve_season(db, season)?;
            let kind = EntityKind::from(by);
            let table = service
                .standings(kind, season_id)
                .with_context(|| format!("failed to build {kind} standings for season {season_id}"))?;
            print_json(&table)
        }
        Command::Casualties { season, by } => {
            let season_id = resolve_season(db, season)?;
            let kind = EntityKind::from(by);
            let table = service
                .casualties(kind, season_id)
                .with_context(|| format!("failed to build {kind} casualties for season {season_id}"))?;
            print_json(&table)
        }
        Command::Submit { season, source } => {
            let season_id = resolve_season(db, season)?;
            let text = read_source(&source)?;
            let lines = result_lines(&text);
            let writer = db.batch_writer();
            let statuses = service
                .submit_with(season_id, lines.as_slice(), &writer)
                .with_context(|| format!("failed to submit results for season {season_id}"))?;
            let failed = statuses.iter().filter(|s| !s.outcome.is_success()).count();
            if failed > 0 {
                warn!(
                    "batch {}: {} of {} submitted lines were rejected",
                    writer.batch_id(),
                    failed,
                    statuses.len()
                );
            }
            print_json(&statuses)
        }
    }
}

fn resolve_season(db: &Database, season: Option<SeasonId>) -> anyhow::Result<SeasonId> {
    if let Some(id) = season {
        return Ok(id);
    }
    match db.selected_season()? {
        Some(season) => Ok(season.id),
        None => bail!("no season selected; pass --season ID"),
    }
}

fn read_source(source: &Path) -> anyhow::Result<String> {
    if source == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read results from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("failed to read {}", source.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}

/// Initialize tracing to log to a file, keeping stdout for command output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("bbleague.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bbleague=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
