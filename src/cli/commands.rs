use super::render;
use crate::analytics::{NormalsEngine, TwinsMatcher};
use crate::config::Settings;
use crate::db::{Database, InMemoryStore, NormalsStore, ObservationRepository, WeatherStore};
use crate::error::{AppError, Result};
use crate::models::{BatchReport, RunStatus, Scope, SnapshotDate, TwinOptions, TwinsReport};
use crate::seed::{seed_store, MockObservationProvider, SeedSummary, DEFAULT_SEED};
use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Location used by `demo` when none is given (New York).
pub const DEMO_REFERENCE_LOCATION: i64 = 1;

/// CLI tool for climate normals and weather twin analysis
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Runs the interactive menu when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Initialize the database schema
    InitDb,

    /// Write synthetic daily observations for the mock locations
    Seed(SeedArgs),

    /// Compute the monthly climate normals of one location
    Normals(NormalsArgs),

    /// Compute climate normals for every location with enough observations
    NormalsAll(WindowArgs),

    /// Show the stored climate normals of one location
    ShowNormals {
        /// Location id
        #[arg(short, long)]
        location: i64,
    },

    /// Find locations whose current weather is most similar to a reference location
    Twins(TwinsArgs),

    /// Seed, compute normals and search twins against an in-memory store
    Demo(DemoArgs),

    /// List locations with observations in the default normals window
    Locations,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SeedArgs {
    /// Number of full calendar years to generate (default: 3)
    #[arg(short, long, default_value = "3")]
    pub years: u32,

    /// Last year to generate (default: last complete year)
    #[arg(short, long)]
    pub end_year: Option<i32>,

    /// Random seed for the generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

/// Source year window shared by the normals commands.
#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct WindowArgs {
    /// First source year (default: NORMALS_YEAR_START)
    #[arg(short, long)]
    pub start: Option<i32>,

    /// Last source year (default: NORMALS_YEAR_END)
    #[arg(short, long)]
    pub end: Option<i32>,

    /// Recompute even when all twelve months are already stored
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct NormalsArgs {
    /// Location id
    #[arg(short, long)]
    pub location: i64,

    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TwinsArgs {
    /// Reference location id
    #[arg(short, long)]
    pub location: i64,

    /// Geographic scope of the search
    #[arg(short, long, value_enum, default_value_t = Scope::Global)]
    pub scope: Scope,

    /// Maximum number of twins to return (default: 5)
    #[arg(short = 'n', long, default_value = "5")]
    pub limit: usize,

    /// Minimum overall similarity, 0 to 100 (default: 80)
    #[arg(short, long, default_value = "80", value_parser = clap::value_parser!(u32).range(0..=100))]
    pub min_similarity: u32,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

impl TwinsArgs {
    pub fn options(&self) -> TwinOptions {
        TwinOptions {
            scope: self.scope,
            limit: self.limit,
            min_similarity: self.min_similarity,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DemoArgs {
    /// Reference location for the twin search
    #[arg(short, long, default_value_t = DEMO_REFERENCE_LOCATION)]
    pub location: i64,

    /// Years of synthetic history to generate (default: 3)
    #[arg(short, long, default_value = "3")]
    pub years: u32,

    /// Minimum overall similarity for the twin search (default: 70)
    #[arg(short, long, default_value = "70", value_parser = clap::value_parser!(u32).range(0..=100))]
    pub min_similarity: u32,
}

/// CLI application
pub struct App {
    store: Arc<dyn WeatherStore>,
    engine: NormalsEngine,
    matcher: TwinsMatcher,
    settings: Settings,
}

impl App {
    /// Builds the engines on top of `store` with the limits from `settings`.
    pub fn with_store<S>(store: Arc<S>, settings: Settings) -> Self
    where
        S: WeatherStore + 'static,
    {
        let observations: Arc<dyn ObservationRepository> = store.clone();
        let normals: Arc<dyn NormalsStore> = store.clone();

        let engine = NormalsEngine::new(observations.clone(), normals)
            .with_min_coverage_days(settings.min_coverage_days)
            .with_workers(settings.normals_workers);

        let evaluation_date = settings
            .evaluation_date
            .map_or(SnapshotDate::Latest, SnapshotDate::On);
        let matcher = TwinsMatcher::new(observations).with_evaluation_date(evaluation_date);

        Self {
            store,
            engine,
            matcher,
            settings,
        }
    }

    /// Connects to PostgreSQL.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let db = Database::new(&settings.database).await?;
        if !db.is_schema_initialized().await? {
            warn!("Database schema is missing; run `init-db` before other commands");
        }
        Ok(Self::with_store(Arc::new(db), settings))
    }

    /// Uses a fresh in-memory store; nothing outlives the process.
    pub fn in_memory(settings: Settings) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), settings)
    }

    /// Execute a single command.
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::InitDb => {
                self.store.init_schema().await?;
                info!("Database schema initialized successfully");
                println!("{}", "Database schema initialized.".green());
            },
            Commands::Seed(args) => {
                let summary = self.seed(&args).await?;
                println!(
                    "{} {} observations for {} locations ({} to {})",
                    "Seeded".green(),
                    summary.observations,
                    summary.locations,
                    summary.first_date,
                    summary.last_date
                );
            },
            Commands::Normals(args) => self.compute_normals(&args).await?,
            Commands::NormalsAll(window) => {
                let report = self.compute_all_normals(&window).await?;
                print_batch_report(&report);
            },
            Commands::ShowNormals { location } => self.show_normals(location).await?,
            Commands::Twins(args) => {
                let report = self.matcher.find_twins(args.location, args.options()).await?;
                print_twins(&report, args.json)?;
            },
            Commands::Demo(args) => self.demo(&args).await?,
            Commands::Locations => self.list_locations().await?,
        }

        Ok(())
    }

    fn window(&self, args: &WindowArgs) -> (i32, i32) {
        (
            args.start.unwrap_or(self.settings.normals_year_start),
            args.end.unwrap_or(self.settings.normals_year_end),
        )
    }

    async fn seed(&self, args: &SeedArgs) -> Result<SeedSummary> {
        // First ensure the database schema exists
        self.store.init_schema().await?;

        let end_year = args.end_year.unwrap_or(self.settings.normals_year_end);
        let provider = MockObservationProvider::new(args.seed);
        seed_store(self.store.as_ref(), &provider, args.years, end_year).await
    }

    async fn compute_normals(&self, args: &NormalsArgs) -> Result<()> {
        let (start, end) = self.window(&args.window);
        let run = self
            .engine
            .compute_normals(args.location, start, end, args.window.force)
            .await;

        match run.status {
            RunStatus::Computed => println!(
                "{} {} months for location {} ({}-{})",
                "Computed".green(),
                run.months_written,
                run.location_id,
                start,
                end
            ),
            RunStatus::Skipped => println!(
                "{} location {} already has all twelve months; use --force to recompute",
                "Skipped".yellow(),
                run.location_id
            ),
            RunStatus::Failed => println!(
                "{} no normals written for location {}",
                "Failed".red(),
                run.location_id
            ),
        }
        if !run.months_without_data.is_empty() {
            println!("Months without data: {:?}", run.months_without_data);
        }
        if !run.months_removed.is_empty() {
            println!(
                "{} {:?}",
                "Removed stale months:".yellow(),
                run.months_removed
            );
        }
        for failure in &run.failures {
            println!("  {} {}", "!".red(), render::failure_line(failure));
        }

        if run.status == RunStatus::Failed {
            return Err(AppError::Cli(format!(
                "computing normals for location {} failed",
                run.location_id
            )));
        }
        Ok(())
    }

    async fn compute_all_normals(&self, window: &WindowArgs) -> Result<BatchReport> {
        let (start, end) = self.window(window);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")?);
        spinner.set_message(format!("Computing normals for {}-{}", start, end));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = self
            .engine
            .compute_normals_for_all_locations(start, end, window.force)
            .await;
        spinner.finish_and_clear();

        result.map_err(|e| {
            error!("Batch normals run aborted: {}", e);
            e
        })
    }

    async fn show_normals(&self, location_id: i64) -> Result<()> {
        let normals = self.engine.normals_for(location_id).await?;
        if normals.months.is_empty() {
            return Err(AppError::NotFound(format!(
                "no climate normals stored for location {}",
                location_id
            )));
        }

        println!("{}", render::normals_table(&normals));
        if !normals.is_complete() {
            println!(
                "{} only {} of 12 months are stored",
                "Note:".yellow(),
                normals.months.len()
            );
        }
        Ok(())
    }

    async fn list_locations(&self) -> Result<()> {
        let (start, end) = (
            self.settings.normals_year_start,
            self.settings.normals_year_end,
        );
        let locations = self
            .store
            .query_locations_with_coverage(start, end, 0)
            .await?;

        if locations.is_empty() {
            println!(
                "{} no locations have observations in {}-{}",
                "Note:".yellow(),
                start,
                end
            );
            return Ok(());
        }
        println!("{}", render::locations_table(&locations));
        Ok(())
    }

    async fn demo(&self, args: &DemoArgs) -> Result<()> {
        println!("{}", "Seeding synthetic observations...".cyan());
        let summary = self
            .seed(&SeedArgs {
                years: args.years,
                end_year: None,
                seed: DEFAULT_SEED,
            })
            .await?;
        println!(
            "Seeded {} observations for {} locations",
            summary.observations, summary.locations
        );

        let window = WindowArgs {
            start: Some(summary.first_date.year()),
            end: Some(summary.last_date.year()),
            force: true,
        };
        let report = self.compute_all_normals(&window).await?;
        print_batch_report(&report);

        self.show_normals(args.location).await?;

        let options = TwinOptions {
            scope: Scope::Global,
            limit: TwinOptions::default().limit,
            min_similarity: args.min_similarity,
        };
        let twins = self.matcher.find_twins(args.location, options).await?;
        print_twins(&twins, false)
    }
}

fn print_batch_report(report: &BatchReport) {
    let headline = format!(
        "Normals {}-{}: {} locations considered, {} computed, {} skipped, {} failed, {} months written",
        report.year_start,
        report.year_end,
        report.locations_considered,
        report.processed,
        report.skipped,
        report.failed,
        report.normals_written
    );
    if report.failed > 0 || !report.failures.is_empty() {
        println!("{}", headline.yellow());
    } else {
        println!("{}", headline.green());
    }
    for failure in &report.failures {
        println!("  {} {}", "!".red(), render::failure_line(failure));
    }
}

fn print_twins(report: &TwinsReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}", render::twins_headline(report).cyan().bold());
    if report.twins.is_empty() {
        println!(
            "{} no locations reached {}% similarity ({} candidates checked)",
            "Note:".yellow(),
            report.metadata.min_similarity,
            report.metadata.candidates_considered
        );
        return Ok(());
    }
    println!("{}", render::twins_table(report));
    Ok(())
}
