//! Critterkeep server wiring: shared state, the `/api` router and its layers.

pub mod app_state;

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use critterkeep_db::DbClient;
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub use app_state::{AppState, AppStateBuilder};

async fn health_handler(State(db): State<DbClient>) -> impl IntoResponse {
    if db.is_healthy().await {
        (StatusCode::OK, Json(json!({ "status": "ok", "database": "up" })))
    } else {
        warn!("Health check failed: database unreachable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "down" })),
        )
    }
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    match frontend_url.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            warn!(?frontend_url, "Invalid frontend_url, cross-origin requests disabled");
            layer
        }
        None => layer,
    }
}

/// The full application: task and notification routes under `/api`, the
/// health check, request tracing and CORS for the configured frontend.
pub fn app(state: &AppState) -> Router {
    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to the Critterkeep API!" }))
        .merge(critterkeep_tasks::routes(state.tasks.clone()))
        .merge(critterkeep_push::routes(state.push.clone()));

    #[allow(unused_mut)] // only mutated with the openapi feature
    let mut app = Router::new().nest("/api", api_router).route(
        "/health",
        get(health_handler).with_state(state.db.clone()),
    );

    #[cfg(feature = "openapi")]
    {
        use critterkeep_push::openapi::PushApiDoc;
        use critterkeep_tasks::openapi::TaskApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "Critterkeep API",
                version = "0.1.0",
                description = "Care tasks and Web Push notifications"
            ),
            servers((url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(TaskApiDoc::openapi());
        openapi_doc.merge(PushApiDoc::openapi());
        tracing::info!("Adding Swagger UI at /api/docs");

        app = app.merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc));
    }

    app.layer(cors_layer(state.config.server.frontend_url.as_deref()))
        .layer(TraceLayer::new_for_http())
}
