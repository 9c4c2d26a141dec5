#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the response planner.
//!
//! Uses `indicatif-log-bridge` (via [`response_planner_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use response_planner_cli::{
    build_registry, list_sources, load, parse_zooms, print_features, print_icon, print_scale,
    query_near,
};

#[derive(Parser)]
#[command(name = "response_planner", about = "Emergency facility map planner")]
struct Cli {
    /// TOML file of `[[sources]]` tables replacing the built-in sources
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Comma-separated list of source IDs to enable (overrides `RESPONSE_PLANNER_SOURCES` env var)
    #[arg(long, global = true)]
    sources: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured data sources
    Sources,
    /// Load every enabled source onto a headless map
    Load {
        /// Comma-separated zoom levels to replay after loading (e.g., "10,15,12")
        #[arg(long)]
        zoom: Option<String>,
    },
    /// Query every enabled source near a point
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
    /// Show which icon a category resolves to
    Icon {
        /// Category as published by a source (e.g., "FIRE STATION")
        category: String,
    },
    /// Show marker sizes for zoom levels
    Scale {
        /// Zoom levels
        #[arg(required = true)]
        zooms: Vec<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = response_planner_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return response_planner_cli::interactive::run(&multi).await;
    };

    match command {
        Commands::Sources => {
            let registry = build_registry(cli.config.as_deref(), cli.sources)?;
            list_sources(&registry);
        }
        Commands::Load { zoom } => {
            let zooms = zoom.as_deref().map(parse_zooms).transpose()?.unwrap_or_default();
            let registry = build_registry(cli.config.as_deref(), cli.sources)?;
            let start = Instant::now();
            let summary = load(registry, &zooms, &multi).await?;
            summary.print();
            log::info!("Loaded in {:.1}s", start.elapsed().as_secs_f64());
        }
        Commands::Query { lat, lng } => {
            let registry = build_registry(cli.config.as_deref(), cli.sources)?;
            let results = query_near(&registry, lat, lng, &multi).await?;
            print_features(&results);
        }
        Commands::Icon { category } => print_icon(&category)?,
        Commands::Scale { zooms } => print_scale(&zooms),
    }

    Ok(())
}
