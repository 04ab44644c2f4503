use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

use crate::util::newsapi::NewsError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Configuration(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body shown to the dashboard; internal causes are logged, not exposed.
    pub fn detail(&self) -> ErrorDetail {
        let (code, message) = match self {
            AppError::BadRequest(msg) => ("BadRequest", msg.clone()),
            AppError::Configuration(msg) => ("Configuration", msg.clone()),
            AppError::Upstream { message, .. } => {
                ("UpstreamUnavailable", format!("Error fetching news: {message}"))
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                ("Internal", "internal server error".to_string())
            }
        };
        ErrorDetail {
            code: code.to_string(),
            message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.detail(),
        });

        (status, body).into_response()
    }
}

impl From<NewsError> for AppError {
    fn from(err: NewsError) -> Self {
        match err {
            NewsError::MissingCredential => {
                AppError::Configuration("Please enter your NewsAPI key.".to_string())
            }
            NewsError::Upstream { status, message } => AppError::Upstream { status, message },
            NewsError::Unreachable(message) => AppError::Upstream {
                status: StatusCode::BAD_GATEWAY.as_u16(),
                message,
            },
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
