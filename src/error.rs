use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::pipeline::brand_voice::BrandVoiceError;
use crate::pipeline::generation::GenerationError;
use crate::pipeline::quota::QuotaWindow;
use crate::pipeline::revision::RevisionError;
use crate::services::extractor::ExtractError;
use crate::services::gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Server configuration error")]
    Misconfigured(Vec<&'static str>),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::NoContentTypes => AppError::BadRequest(e.to_string()),
            GenerationError::AllowanceExhausted { .. } => AppError::TooManyRequests(e.to_string()),
            GenerationError::Database(e) => AppError::Anyhow(e),
        }
    }
}

impl From<RevisionError> for AppError {
    fn from(e: RevisionError) -> Self {
        match e {
            RevisionError::NotFound => AppError::NotFound("content".into()),
            RevisionError::EmptyText | RevisionError::MetadataMismatch(_) => AppError::BadRequest(e.to_string()),
            RevisionError::Gateway(e) => AppError::Gateway(e),
            RevisionError::Database(e) => AppError::Anyhow(e),
        }
    }
}

impl From<BrandVoiceError> for AppError {
    fn from(e: BrandVoiceError) -> Self {
        match e {
            BrandVoiceError::NothingToAnalyze => AppError::BadRequest(e.to_string()),
            BrandVoiceError::Gateway(e) => AppError::Gateway(e),
            BrandVoiceError::Database(e) => AppError::Anyhow(e),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Extract(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::Gateway(GatewayError::Unauthorized) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::TooManyRequests(_) | AppError::Gateway(GatewayError::RateLimitExceeded(_)) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::Gateway(GatewayError::RateLimitCheckUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gateway(GatewayError::Provider(_)) => StatusCode::BAD_GATEWAY,
            AppError::Misconfigured(_) | AppError::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(%status, error = %self);
        } else {
            tracing::debug!(%status, error = %self);
        }

        let body = match &self {
            AppError::Misconfigured(missing) => json!({ "error": self.to_string(), "missing": missing }),
            AppError::Gateway(GatewayError::RateLimitExceeded(window)) => json!({
                "error": self.to_string(),
                "window": match window {
                    QuotaWindow::Minute => "minute",
                    QuotaWindow::Day => "day",
                },
            }),
            // Storage details stay in the log.
            AppError::Anyhow(_) => json!({ "error": "Internal server error" }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
