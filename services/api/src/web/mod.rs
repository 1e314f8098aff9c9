pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{delete, get, post},
    Router,
};
use rest::{ApiDoc, AUDIO_URL_PREFIX, PROOF_URL_PREFIX};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application: REST routes, artifact downloads and Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/api/excuses",
            post(rest::generate_excuse_handler).get(rest::list_excuses_handler),
        )
        .route(
            "/api/excuses/{id}",
            get(rest::get_excuse_handler).delete(rest::delete_excuse_handler),
        )
        .route(
            "/api/excuses/{id}/favorite",
            post(rest::toggle_favorite_handler).put(rest::set_favorite_handler),
        )
        .route(
            "/api/excuses/{id}/proofs",
            post(rest::create_proof_handler).get(rest::list_proofs_handler),
        )
        .route(
            "/api/excuses/{id}/voice",
            post(rest::create_voice_handler).get(rest::list_voice_clips_handler),
        )
        .route("/api/proofs/{id}", delete(rest::delete_proof_handler))
        .route(
            "/api/templates/{document_type}/{language}",
            get(rest::template_fields_handler),
        )
        .route("/health", get(rest::health_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(app_state.clone());

    Router::new()
        .merge(api_router)
        .nest_service(AUDIO_URL_PREFIX, ServeDir::new(&app_state.config.audio_dir))
        .nest_service(PROOF_URL_PREFIX, ServeDir::new(&app_state.config.proof_dir))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(app_state.config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}

/// A configured origin gets credentialed access; otherwise any origin may call
/// the API without credentials.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);
    // The origin was validated when the config was loaded.
    match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(origin) => layer.allow_origin(origin).allow_credentials(true),
        None => layer.allow_origin(AllowOrigin::any()),
    }
}
