//! API errors and their HTTP mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use c2wasm_lib::BuildError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors that end a request without a build result.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Body missing, not JSON, or not a build request
  #[error("Bad request: {0}")]
  BadRequest(String),

  /// The pipeline could not carry out the build
  #[error("Internal error: {0}")]
  Build(#[from] BuildError),

  /// The default include directory could not be listed
  #[error("Internal error: failed to list headers: {0}")]
  Headers(#[source] std::io::Error),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  pub code: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = match &self {
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
      ApiError::Build(_) | ApiError::Headers(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };

    if status.is_server_error() {
      error!(error = %self, "request failed");
    }

    let body = ErrorResponse {
      error: self.to_string(),
      code: code.to_string(),
    };

    (status, Json(body)).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
