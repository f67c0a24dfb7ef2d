//! Maps `CoreError` onto HTTP responses at the API edge, sanitizing any
//! filesystem path out of the message first (the core's `sanitize_message`
//! does the redaction; this module only picks the status code).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use channelcast_core::error::{sanitize_message, CoreError};
use std::path::PathBuf;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn from_core(error: CoreError, known_base_paths: &[PathBuf]) -> Self {
        let status = match &error {
            CoreError::ChannelNotFound(_)
            | CoreError::MediaNotFound(_)
            | CoreError::BucketNotFound(_)
            | CoreError::InputNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::RepositoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::TranscoderSpawn(_)
            | CoreError::TranscoderAbnormalExit(_)
            | CoreError::ConcatInvalid(_)
            | CoreError::Io(_)
            | CoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = sanitize_message(&error.to_string(), known_base_paths);
        Self { status, message }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}
