#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Standalone generator binary: wires its own engine and CSV sink and
//! streams synthetic telemetry into them until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use terminal_map_boundary::BoundaryIndex;
use terminal_map_engine::TrackingEngine;
use terminal_map_export::CsvSink;
use terminal_map_generate::GeneratorConfig;

#[derive(Parser)]
#[command(name = "terminal_map_generate")]
#[command(about = "Generate synthetic satellite terminal telemetry")]
struct Args {
    /// Path to the district boundary GeoJSON dataset.
    #[arg(long, default_value = "india_districts.geojson")]
    boundary: PathBuf,

    /// Directory for the CSV output files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Number of simulated terminals.
    #[arg(long, default_value_t = 10)]
    terminals: usize,

    /// Seconds between report rounds.
    #[arg(long, default_value_t = 10)]
    interval_secs: u64,

    /// Maximum per-axis step in degrees.
    #[arg(long, default_value_t = 1.0)]
    max_change: f64,
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let args = Args::parse();

    log::info!("Loading boundary dataset from {}", args.boundary.display());
    let boundary = BoundaryIndex::load(&args.boundary).expect("Failed to load boundary dataset");

    let sink = CsvSink::open(&args.data_dir).expect("Failed to open CSV sink");
    let engine = Arc::new(TrackingEngine::new(Arc::new(boundary), Some(Box::new(sink))));

    terminal_map_generate::run(
        engine,
        GeneratorConfig {
            terminals: args.terminals,
            interval: Duration::from_secs(args.interval_secs),
            max_change: args.max_change,
        },
    )
    .await;
}
