use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use asyncalc_core::{LookupResult, RawCalcRequest};

use crate::app::dto::{ResultResponse, SubmitResponse};
use crate::app::errors::{self, json_error};
use crate::app::services::AppServices;

/// `POST /api/calculate`
pub async fn calculate(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RawCalcRequest>, JsonRejection>,
) -> axum::response::Response {
    // Unparseable bodies are reported like any other invalid request.
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text());
        }
    };

    let submitted =
        tokio::task::spawn_blocking(move || services.submissions().submit(request)).await;

    match submitted {
        Ok(Ok(task_id)) => {
            (StatusCode::ACCEPTED, Json(SubmitResponse::accepted(task_id))).into_response()
        }
        Ok(Err(e)) => errors::submit_error_to_response(e),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string()),
    }
}

/// `GET /api/result/:task_id`
pub async fn result(
    Extension(services): Extension<Arc<AppServices>>,
    Path(task_id): Path<String>,
) -> axum::response::Response {
    let fetched =
        tokio::task::spawn_blocking(move || services.results().fetch_key(&task_id)).await;

    match fetched {
        Ok(Ok(LookupResult::Pending)) => {
            (StatusCode::NOT_FOUND, Json(ResultResponse::pending())).into_response()
        }
        Ok(Ok(LookupResult::Completed(outcome))) => {
            (StatusCode::OK, Json(ResultResponse::completed(&outcome))).into_response()
        }
        Ok(Err(e)) => errors::fetch_error_to_response(e),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string()),
    }
}
