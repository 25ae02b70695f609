#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the terminal map application.
//!
//! Serves the REST API for querying live terminal state, per-terminal
//! history and paths, the state/district catalog, and geofence control,
//! plus a Server-Sent Events stream (`/api/events`) pushing the engine's
//! transition and position events to connected map clients. All state is
//! read from the in-process [`TrackingEngine`]; telemetry persistence
//! goes through the engine's CSV sink.

mod handlers;

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use terminal_map_boundary::BoundaryIndex;
use terminal_map_engine::TrackingEngine;
use terminal_map_export::CsvSink;
use terminal_map_generate::GeneratorConfig;

/// Shared application state.
pub struct AppState {
    /// The tracking engine, shared with the embedded generator if one
    /// is running.
    pub engine: Arc<TrackingEngine>,
}

/// Registers the API routes on a service config.
///
/// Split out so integration tests can mount the same route table
/// without binding a listener.
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route(
                "/latest-terminal-data",
                web::get().to(handlers::latest_terminal_data),
            )
            .route("/terminals", web::get().to(handlers::terminals))
            .route("/terminal-data", web::get().to(handlers::terminal_data))
            .route("/path", web::get().to(handlers::path))
            .route("/states", web::get().to(handlers::states))
            .route("/districts", web::get().to(handlers::districts))
            .route(
                "/terminals-by-location",
                web::get().to(handlers::terminals_by_location),
            )
            .route("/geofences", web::get().to(handlers::list_geofences))
            .route("/geofences", web::post().to(handlers::create_geofence))
            .route(
                "/geofences/{id}",
                web::delete().to(handlers::delete_geofence),
            )
            .route("/events", web::get().to(handlers::events)),
    );
}

/// Starts the terminal map API server.
///
/// Loads the boundary dataset, opens the CSV sink, builds the tracking
/// engine, optionally spawns the embedded telemetry generator
/// (`GENERATE_TERMINALS`), and starts the Actix-Web HTTP server. This is
/// a regular async function; the caller provides the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind
/// or encounters a runtime error.
///
/// # Panics
///
/// Panics if the boundary dataset cannot be loaded or the CSV sink
/// cannot be opened.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let boundary_path = std::env::var("BOUNDARY_GEOJSON")
        .unwrap_or_else(|_| "india_districts.geojson".to_string());
    log::info!("Loading boundary dataset from {boundary_path}...");
    let boundary = Arc::new(
        BoundaryIndex::load(Path::new(&boundary_path)).expect("Failed to load boundary dataset"),
    );

    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    log::info!("Opening CSV sink in {data_dir}...");
    let sink = CsvSink::open(Path::new(&data_dir)).expect("Failed to open CSV sink");

    let engine = Arc::new(TrackingEngine::new(boundary, Some(Box::new(sink))));

    let generate_terminals: usize = std::env::var("GENERATE_TERMINALS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if generate_terminals > 0 {
        log::info!("Starting embedded generator with {generate_terminals} terminals");
        tokio::spawn(terminal_map_generate::run(
            Arc::clone(&engine),
            GeneratorConfig {
                terminals: generate_terminals,
                ..GeneratorConfig::default()
            },
        ));
    }

    let state = web::Data::new(AppState { engine });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(api_routes)
            // Serve frontend static files (production)
            .service(Files::new("/", "app/dist").index_file("index.html"))
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
