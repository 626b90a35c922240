use axum::{http::Method, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod error;
pub mod lots;
pub mod merchant;
pub mod middleware;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
            axum::http::HeaderName::from_static(middleware::identity::USER_HEADER),
            axum::http::HeaderName::from_static(middleware::identity::MERCHANT_HEADER),
        ]);

    let user_routes = bookings::routes()
        .route_layer(axum::middleware::from_fn(middleware::user_identity_middleware));
    let merchant_routes = merchant::routes()
        .route_layer(axum::middleware::from_fn(middleware::merchant_identity_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/v1", user_routes.merge(merchant_routes).merge(lots::routes()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
