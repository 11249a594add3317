use axum::{
    routing::{get, post},
    Router,
};

pub mod jobs;
pub mod system;

/// Router for the calculator endpoints under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/calculate", post(jobs::calculate))
        .route("/result/:task_id", get(jobs::result))
}
