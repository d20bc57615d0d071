use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{ApiError, ServiceError};
use crate::session::{
    messages::{self, FlashMessage},
    Session,
};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// `303 See Other` to `location`.
pub fn see_other(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::SEE_OTHER, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::SEE_OTHER, [(header::LOCATION, HeaderValue::from_static("/"))]).into_response(),
    }
}

/// Where a form post should land: `next` when it is a local path, else the
/// path of the `Referer`, else `fallback`.
pub fn redirect_target(next: Option<&str>, headers: &HeaderMap, fallback: &str) -> String {
    if let Some(next) = next.map(str::trim).filter(|n| is_local_path(n)) {
        return next.to_string();
    }
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(referer_path)
        .unwrap_or_else(|| fallback.to_string())
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

fn referer_path(referer: &str) -> Option<String> {
    let path = match referer.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|idx| &rest[idx..]).unwrap_or("/"),
        None => referer,
    };
    is_local_path(path).then(|| path.to_string())
}

/// Drains the session's flash messages for the response body.
pub async fn flash(session: &Session) -> Result<Vec<FlashMessage>, ServiceError> {
    messages::take(session).await
}

/// Checkbox-style form flags.
pub fn form_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "on" | "1" | "yes")
    )
}
