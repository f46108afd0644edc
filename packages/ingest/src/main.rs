#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the dataset import tool.

use std::time::Instant;

use clap::{Parser, Subcommand};
use risk_map_config::AppConfig;
use risk_map_geocoder::VWorldClient;
use risk_map_ingest::{dong, import_all, import_dataset, import_population};
use risk_map_ingest_models::{DatasetOutcome, ImportReport, ImportSummary};
use risk_map_point_models::RiskType;

#[derive(Parser)]
#[command(name = "risk_map_ingest", about = "Facility and population data import tool")]
struct Cli {
    /// Print import results as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every facility dataset, then the population dataset
    ImportAll,
    /// Import a single facility dataset
    Import {
        /// Facility type (e.g., "cctv", "police", "street-light")
        #[arg(value_parser = parse_risk_type)]
        risk_type: RiskType,
    },
    /// Import the population dataset
    Population,
    /// List the configured datasets
    Datasets,
    /// Look up a dong in the built-in centroid table
    ResolveDong {
        /// Dong name, or any text containing it
        name: String,
    },
}

fn parse_risk_type(raw: &str) -> Result<RiskType, String> {
    raw.trim()
        .replace('-', "_")
        .parse()
        .map_err(|_| format!("Unknown facility type: {raw} (expected cctv, police, street-light)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Commands::Datasets => {
            println!("{:<14} {:<8} {:<12} FILE", "TYPE", "ENCODING", "COLUMNS");
            println!("{}", "-".repeat(60));
            for def in &config.datasets {
                let columns = match (def.latitude.fixed(), def.longitude.fixed()) {
                    (Some(lat), Some(lon)) => format!("{lat},{lon}"),
                    _ => "auto".to_string(),
                };
                println!(
                    "{:<14} {:<8} {:<12} {}",
                    def.risk_type.to_string(),
                    def.encoding.to_string(),
                    columns,
                    def.path_in(&config.data.dir).display()
                );
            }
            println!(
                "{:<14} {:<8} {:<12} {}",
                risk_map_ingest::POPULATION_LABEL,
                "utf8",
                "-",
                config.data.dir.join(&config.population.file).display()
            );
        }
        Commands::ResolveDong { name } => match dong::lookup(&name) {
            Some(entry) => println!(
                "{} {}: {:.4}, {:.4}",
                entry.district, entry.dong, entry.coordinates.latitude, entry.coordinates.longitude
            ),
            None => {
                println!("No centroid for {name:?}; population import would geocode it");
            }
        },
        Commands::ImportAll => {
            let store = risk_map_database::open_from_env()?;
            let geocoder = VWorldClient::new(config.vworld.settings())?;

            let start = Instant::now();
            let summary = import_all(
                store.as_ref(),
                &geocoder,
                &config.data.dir,
                &config.datasets,
                &config.population,
            )
            .await;
            log::info!("Import finished in {:.1}s", start.elapsed().as_secs_f64());

            print_summary(&summary, cli.json)?;
            if !summary.all_ok() {
                return Err(format!(
                    "Failed datasets: {}",
                    summary.failed_datasets().join(", ")
                )
                .into());
            }
        }
        Commands::Import { risk_type } => {
            let store = risk_map_database::open_from_env()?;
            let geocoder = VWorldClient::new(config.vworld.settings())?;

            let report = import_dataset(
                store.as_ref(),
                &geocoder,
                &config.data.dir,
                &config.datasets,
                risk_type,
            )
            .await?;
            print_report(&report, cli.json)?;
        }
        Commands::Population => {
            let store = risk_map_database::open_from_env()?;
            let geocoder = VWorldClient::new(config.vworld.settings())?;

            let report = import_population(
                store.as_ref(),
                &geocoder,
                &config.data.dir,
                &config.population,
            )
            .await?;
            print_report(&report, cli.json)?;
        }
    }

    Ok(())
}

fn print_summary(summary: &ImportSummary, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    print_header();
    for outcome in &summary.outcomes {
        match outcome {
            DatasetOutcome::Ok { report } => print_row(report),
            DatasetOutcome::Error { dataset, message } => {
                println!("{dataset:<14} ERROR: {message}");
            }
        }
    }
    Ok(())
}

fn print_report(report: &ImportReport, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_header();
        print_row(report);
    }
    Ok(())
}

fn print_header() {
    println!(
        "{:<14} {:>9} {:>9} {:>9} {:>8}",
        "DATASET", "SUCCESS", "FAILURE", "SKIPPED", "BATCHES"
    );
    println!("{}", "-".repeat(53));
}

fn print_row(report: &ImportReport) {
    println!(
        "{:<14} {:>9} {:>9} {:>9} {:>8}",
        report.dataset, report.success, report.failure, report.skipped, report.batches_flushed
    );
}
