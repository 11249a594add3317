//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: adapter wiring (queue, result store, embedded workers)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // The calculator front end is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/status", get(routes::system::status))
        .nest("/api", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(Extension(services)),
        )
}
