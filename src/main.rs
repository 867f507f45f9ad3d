mod analytics;
mod cli;
mod config;
mod db;
mod error;
mod logging;
mod models;
mod seed;

use clap::Parser;
use cli::{App, Cli, Commands, DemoArgs, NormalsArgs, SeedArgs, TwinsArgs, WindowArgs};
use colored::*;
use config::Settings;
use dialoguer::{theme::ColorfulTheme, Select};
use error::Result;
use models::TwinOptions;
use seed::DEFAULT_SEED;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    // Held until exit so buffered file logs are flushed
    let _log_guard = logging::init_logging(&settings)?;

    match cli.command {
        Some(Commands::Demo(args)) => {
            info!("Running demo against the in-memory store");
            App::in_memory(settings)
                .run_command(Commands::Demo(args))
                .await
                .map_err(report)
        },
        Some(command) => {
            let app = App::connect(settings).await.map_err(report)?;
            app.run_command(command).await.map_err(report)
        },
        None => interactive(settings).await,
    }
}

fn report(e: error::AppError) -> error::AppError {
    error!("Command execution failed: {:?}", e);
    eprintln!("{} {}", "Error:".red(), e.to_string().red());
    e
}

async fn interactive(settings: Settings) -> Result<()> {
    info!("Initializing climate twins app...");

    let app = match App::connect(settings.clone()).await {
        Ok(app) => {
            info!("Application initialized successfully.");
            app
        },
        Err(e) => {
            error!("Failed to initialize application: {:?}", e);
            println!(
                "{}",
                "Error: Failed to connect to the database. Try the `demo` command for an offline run."
                    .red()
            );
            return Err(e);
        },
    };

    println!("{}", "Welcome to the Climate Twins CLI!".cyan().bold());

    loop {
        let options = &[
            "Initialize Database Schema",
            "Seed Synthetic Observations",
            "Compute Normals for a Location",
            "Compute Normals for All Locations",
            "Show Normals for a Location",
            "Find Weather Twins",
            "List Locations",
            "Run In-Memory Demo",
            "Exit",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("What would you like to do?")
            .items(options)
            .default(0)
            .interact_opt()?
            .unwrap_or(options.len() - 1);

        println!("\n---\n");

        let command = match selection {
            0 => Ok(Commands::InitDb),
            1 => Ok(Commands::Seed(SeedArgs {
                years: 3,
                end_year: None,
                seed: DEFAULT_SEED,
            })),
            2 => cli::prompt_location("Location id").and_then(|location| {
                Ok(Commands::Normals(NormalsArgs {
                    location,
                    window: WindowArgs {
                        force: cli::prompt_force()?,
                        ..WindowArgs::default()
                    },
                }))
            }),
            3 => cli::prompt_force().map(|force| {
                Commands::NormalsAll(WindowArgs {
                    force,
                    ..WindowArgs::default()
                })
            }),
            4 => cli::prompt_location("Location id")
                .map(|location| Commands::ShowNormals { location }),
            5 => prompt_twins(),
            6 => Ok(Commands::Locations),
            7 => {
                let result = App::in_memory(settings.clone())
                    .run_command(Commands::Demo(DemoArgs {
                        location: cli::DEMO_REFERENCE_LOCATION,
                        years: 3,
                        min_similarity: 70,
                    }))
                    .await;
                if let Err(e) = result {
                    report(e);
                }
                println!("\n---\n");
                continue;
            },
            _ => {
                println!("{}", "Exiting application. Goodbye!".green());
                break;
            },
        };

        let command = match command {
            Ok(command) => command,
            Err(e) => {
                println!("{} {}", "Failed to get input:".red(), e);
                continue;
            },
        };

        if let Err(e) = app.run_command(command).await {
            report(e);
        }

        println!("\n---\n");
    }

    Ok(())
}

fn prompt_twins() -> Result<Commands> {
    let location = cli::prompt_location("Reference location id")?;
    let scope = cli::prompt_scope()?;
    let defaults = TwinOptions::default();
    let min_similarity = cli::prompt_min_similarity(defaults.min_similarity)?;
    Ok(Commands::Twins(TwinsArgs {
        location,
        scope,
        limit: defaults.limit,
        min_similarity,
        json: false,
    }))
}
