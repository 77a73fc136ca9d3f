use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pet_policy_core::{ExtractionError, IngestError, QueryError};
use serde::Serialize;
use thiserror::Error;

const GENERIC_FAILURE: &str = "internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("policy {0} not found")]
    NotFound(String),

    #[error("upload failed: {0}")]
    Upload(#[from] MultipartError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upload(error) => error.status(),
            Self::Ingest(IngestError::InvalidArgument(_))
            | Self::Ingest(IngestError::Extraction(
                ExtractionError::EmptyInput
                | ExtractionError::PdfParse(_)
                | ExtractionError::NoPages
                | ExtractionError::NoText,
            )) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Ingest(_) | Self::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            GENERIC_FAILURE.to_string()
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            self.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
