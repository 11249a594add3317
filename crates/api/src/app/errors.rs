use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use asyncalc_infra::gateway::{FetchError, SubmitError};

pub fn submit_error_to_response(err: SubmitError) -> axum::response::Response {
    match err {
        SubmitError::InvalidRequest(e) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_request", e.to_string())
        }
        SubmitError::DispatchFailure(e) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "dispatch_failure",
            e.to_string(),
        ),
    }
}

pub fn fetch_error_to_response(err: FetchError) -> axum::response::Response {
    match err {
        FetchError::StoreUnavailable(e) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            e.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
