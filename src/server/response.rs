use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::future::Future;
use tracing::error;

use crate::error::Error;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidPdf { .. } | Error::InvalidImage { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::UnsupportedFormat
            | Error::InvalidDimensions
            | Error::DimensionTooLarge { .. }
            | Error::NoFile
            | Error::NoFiles
            | Error::NotEnoughFiles { .. }
            | Error::NoPagesSpecified
            | Error::NoValidPages
            | Error::BadForm { .. }
            | Error::MissingSignature
            | Error::InvalidSignature
            | Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Processing { .. } | Error::Store(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Server-side failures get a generic "Failed to <action>" message; the
    /// detail only goes to the log.
    pub fn for_tool(action: &str, err: Error) -> Self {
        let status = err.status();
        if status.is_server_error() {
            error!(error = %err, "Failed to {}", action);
            ApiError {
                status,
                message: format!("Failed to {}", action),
            }
        } else {
            ApiError::from(err)
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.status().is_server_error() {
            error!(error = %err, "Request failed");
        }
        ApiError {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = if self.status == StatusCode::TOO_MANY_REQUESTS {
            json!({ "error": self.message, "remaining": 0 })
        } else {
            json!({ "error": self.message })
        };
        (self.status, Json(body)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Run a tool handler body, mapping its errors for the client.
pub async fn run_tool<F>(action: &str, body: F) -> Result<Response, ApiError>
where
    F: Future<Output = Result<Response, Error>>,
{
    body.await.map_err(|e| ApiError::for_tool(action, e))
}

pub fn attachment(bytes: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub fn set_header(response: &mut Response, name: &'static str, value: impl Into<HeaderValue>) {
    response
        .headers_mut()
        .insert(HeaderName::from_static(name), value.into());
}
