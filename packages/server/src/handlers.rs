//! HTTP handler functions for the terminal map API.

use actix_web::{HttpResponse, web};
use chrono::{Duration, Utc};
use terminal_map_engine::{EngineEvent, GeofenceControlError, GeofenceError, StateFilter};
use terminal_map_server_models::{
    ApiGeofenceCreated, ApiGeofenceList, ApiHealth, ApiPathPoint, ApiTerminal,
    ApiTerminalDataPage, ApiTerminalListItem, ApiTrackPoint, CreateGeofenceRequest,
    DistrictsQueryParams, LocationQueryParams, PathQueryParams, TerminalDataQueryParams,
};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

/// Rows per history page when the client does not ask for a size.
const DEFAULT_PER_PAGE: u32 = 50;

/// Upper bound on requested page size.
const MAX_PER_PAGE: u32 = 500;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/latest-terminal-data`
///
/// Returns every terminal's latest record, sorted by device id.
pub async fn latest_terminal_data(state: web::Data<AppState>) -> HttpResponse {
    let terminals: Vec<ApiTerminal> = state
        .engine
        .all_states(&StateFilter::default())
        .into_iter()
        .map(ApiTerminal::from)
        .collect();
    HttpResponse::Ok().json(terminals)
}

/// `GET /api/terminals`
///
/// Lists every known device id for the terminal dropdown.
pub async fn terminals(state: web::Data<AppState>) -> HttpResponse {
    let items: Vec<ApiTerminalListItem> = state
        .engine
        .device_ids()
        .into_iter()
        .map(|id| ApiTerminalListItem {
            name: id.clone(),
            id,
        })
        .collect();
    HttpResponse::Ok().json(items)
}

/// `GET /api/terminal-data`
///
/// Paginated history for one terminal within a look-back window,
/// newest first.
pub async fn terminal_data(
    state: web::Data<AppState>,
    params: web::Query<TerminalDataQueryParams>,
) -> HttpResponse {
    let (Some(terminal), Some(timeframe)) = (params.terminal.as_deref(), params.timeframe) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Missing terminal or timeframe"
        }));
    };

    let since = Utc::now() - Duration::hours(timeframe.max(0));
    let mut rows = state.engine.history(terminal, Some(since));
    rows.reverse();

    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let page = params.page.unwrap_or(1).max(1);
    let total_items = rows.len() as u64;
    let total_pages = u32::try_from(total_items.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX);

    let start = (page - 1).saturating_mul(per_page) as usize;
    let data: Vec<ApiTrackPoint> = rows
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .map(ApiTrackPoint::from)
        .collect();

    HttpResponse::Ok().json(ApiTerminalDataPage {
        data,
        total_pages,
        current_page: page,
        total_items,
    })
}

/// `GET /api/path`
///
/// Ordered track for one terminal within a look-back window, oldest
/// first. Missing parameters yield an empty list.
pub async fn path(state: web::Data<AppState>, params: web::Query<PathQueryParams>) -> HttpResponse {
    let (Some(terminal), Some(timeframe)) = (params.terminal.as_deref(), params.timeframe) else {
        return HttpResponse::Ok().json(Vec::<ApiPathPoint>::new());
    };

    let since = Utc::now() - Duration::hours(timeframe.max(0));
    let points: Vec<ApiPathPoint> = state
        .engine
        .history(terminal, Some(since))
        .into_iter()
        .map(ApiPathPoint::from)
        .collect();
    HttpResponse::Ok().json(points)
}

/// `GET /api/states`
pub async fn states(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.engine.boundary().states())
}

/// `GET /api/districts`
///
/// Districts for a state; unknown states get an empty 404.
pub async fn districts(
    state: web::Data<AppState>,
    params: web::Query<DistrictsQueryParams>,
) -> HttpResponse {
    params.state.as_deref().map_or_else(
        || {
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing state"
            }))
        },
        |name| match state.engine.boundary().districts(name) {
            Some(districts) => HttpResponse::Ok().json(districts),
            None => HttpResponse::NotFound().json(Vec::<String>::new()),
        },
    )
}

/// `GET /api/terminals-by-location`
///
/// Latest records filtered by current state and/or district.
pub async fn terminals_by_location(
    state: web::Data<AppState>,
    params: web::Query<LocationQueryParams>,
) -> HttpResponse {
    let filter = StateFilter {
        state: params.state.clone().filter(|s| !s.is_empty()),
        district: params.district.clone().filter(|d| !d.is_empty()),
    };
    let terminals: Vec<ApiTerminal> = state
        .engine
        .all_states(&filter)
        .into_iter()
        .map(ApiTerminal::from)
        .collect();
    HttpResponse::Ok().json(terminals)
}

/// `GET /api/geofences`
pub async fn list_geofences(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.engine.geofence_snapshot();
    HttpResponse::Ok().json(ApiGeofenceList {
        geofences: snapshot.ids().iter().map(ToString::to_string).collect(),
        generation: snapshot.generation(),
    })
}

/// `POST /api/geofences`
///
/// Creates a geofence over a district polygon.
pub async fn create_geofence(
    state: web::Data<AppState>,
    body: web::Json<CreateGeofenceRequest>,
) -> HttpResponse {
    match state.engine.create_geofence(&body.state, &body.district) {
        Ok(id) => HttpResponse::Created().json(ApiGeofenceCreated { id }),
        Err(e @ GeofenceControlError::UnknownDistrict { .. }) => {
            HttpResponse::NotFound().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(e @ GeofenceControlError::Geofence(GeofenceError::DuplicateGeofence { .. })) => {
            HttpResponse::Conflict().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(e) => {
            log::error!("Failed to create geofence: {e}");
            HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
        }
    }
}

/// `DELETE /api/geofences/{id}`
///
/// Deletes a geofence; terminals inside it get synthetic EXIT events.
pub async fn delete_geofence(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> HttpResponse {
    match state.engine.delete_geofence(&id) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e @ GeofenceControlError::Geofence(GeofenceError::NotFound { .. })) => {
            HttpResponse::NotFound().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(e) => {
            log::error!("Failed to delete geofence: {e}");
            HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
        }
    }
}

/// `GET /api/events`
///
/// Server-Sent Events stream of engine events. A lagging client skips
/// ahead rather than stalling the engine.
pub async fn events(state: web::Data<AppState>) -> HttpResponse {
    let mut rx = state.engine.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        yield Ok::<web::Bytes, std::convert::Infallible>(web::Bytes::from(
                            format!("event: {}\ndata: {json}\n\n", event_name(&event)),
                        ));
                    }
                    Err(e) => log::error!("Failed to serialize engine event: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("SSE subscriber lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

fn event_name(event: &EngineEvent) -> &'static str {
    match event {
        EngineEvent::Position { .. } => "terminal_update",
        EngineEvent::Transition(_) => "geofence_update",
        EngineEvent::Status { .. } => "status_update",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};
    use std::sync::Arc;
    use terminal_map_boundary::BoundaryIndex;
    use terminal_map_engine::TrackingEngine;
    use terminal_map_telemetry_models::TelemetryReport;

    const DATASET: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"NAME_1":"Maharashtra","NAME_2":"Pune"},
         "geometry":{"type":"Polygon","coordinates":[[[73.0,18.0],[74.5,18.0],[74.5,19.0],[73.0,19.0],[73.0,18.0]]]}},
        {"type":"Feature","properties":{"NAME_1":"Delhi","NAME_2":"New Delhi"},
         "geometry":{"type":"Polygon","coordinates":[[[76.8,28.3],[77.5,28.3],[77.5,28.9],[76.8,28.9],[76.8,28.3]]]}}
    ]}"#;

    fn test_state() -> web::Data<AppState> {
        let boundary = Arc::new(BoundaryIndex::from_geojson_str(DATASET).unwrap());
        web::Data::new(AppState {
            engine: Arc::new(TrackingEngine::new(boundary, None)),
        })
    }

    fn ingest(state: &web::Data<AppState>, device_id: &str, latitude: f64, longitude: f64) {
        state
            .engine
            .ingest(&TelemetryReport {
                device_id: device_id.to_string(),
                latitude,
                longitude,
                timestamp: Utc::now(),
            })
            .unwrap();
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .configure(crate::api_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let app = test_app!(test_state());
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
            .await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn latest_terminal_data_returns_ingested_terminals() {
        let state = test_state();
        ingest(&state, "dev-1", 18.52, 73.85);
        let app = test_app!(state);

        let body: Vec<ApiTerminal> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/latest-terminal-data")
                .to_request(),
        )
        .await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].device_id, "dev-1");
        assert_eq!(body[0].district, "Pune");
    }

    #[actix_web::test]
    async fn terminal_data_requires_params() {
        let app = test_app!(test_state());
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/terminal-data").to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn terminal_data_paginates_newest_first() {
        let state = test_state();
        for i in 0..5 {
            ingest(&state, "dev-1", 18.5 + f64::from(i) * 0.01, 73.85);
        }
        let app = test_app!(state);

        let page: ApiTerminalDataPage = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/terminal-data?terminal=dev-1&timeframe=1&page=1&perPage=2")
                .to_request(),
        )
        .await;
        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 2);
        // Newest first.
        assert!(page.data[0].timestamp >= page.data[1].timestamp);
    }

    #[actix_web::test]
    async fn path_without_params_is_empty() {
        let app = test_app!(test_state());
        let body: Vec<ApiPathPoint> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/path").to_request(),
        )
        .await;
        assert!(body.is_empty());
    }

    #[actix_web::test]
    async fn states_and_districts_catalog() {
        let app = test_app!(test_state());

        let states: Vec<String> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/states").to_request(),
        )
        .await;
        assert_eq!(states, vec!["Delhi", "Maharashtra"]);

        let districts: Vec<String> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/districts?state=Maharashtra")
                .to_request(),
        )
        .await;
        assert_eq!(districts, vec!["Pune"]);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/districts?state=Atlantis")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn terminals_by_location_filters() {
        let state = test_state();
        ingest(&state, "pune-dev", 18.52, 73.85);
        ingest(&state, "delhi-dev", 28.6139, 77.209);
        let app = test_app!(state);

        let body: Vec<ApiTerminal> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/terminals-by-location?state=Delhi")
                .to_request(),
        )
        .await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].device_id, "delhi-dev");
    }

    #[actix_web::test]
    async fn geofence_lifecycle() {
        let state = test_state();
        ingest(&state, "dev-1", 18.52, 73.85);
        let app = test_app!(state);

        // Create.
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/geofences")
                .set_json(CreateGeofenceRequest {
                    state: "Maharashtra".to_string(),
                    district: "Pune".to_string(),
                })
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);

        // Duplicate create conflicts.
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/geofences")
                .set_json(CreateGeofenceRequest {
                    state: "Maharashtra".to_string(),
                    district: "Pune".to_string(),
                })
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);

        // Unknown district 404s.
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/geofences")
                .set_json(CreateGeofenceRequest {
                    state: "Maharashtra".to_string(),
                    district: "Nagpur".to_string(),
                })
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        // Listed.
        let list: ApiGeofenceList = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/geofences").to_request(),
        )
        .await;
        assert_eq!(list.geofences, vec!["Maharashtra_Pune"]);

        // Delete.
        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri("/api/geofences/Maharashtra_Pune")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NO_CONTENT);

        // Deleting again 404s.
        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri("/api/geofences/Maharashtra_Pune")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}
