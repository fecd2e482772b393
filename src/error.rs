use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Failures that end a request without rendering a page.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("session error: {0}")]
    Session(String),

    #[error("malformed upload: {0}")]
    Multipart(String),
}

impl From<actix_web::Error> for AppError {
    fn from(err: actix_web::Error) -> Self {
        AppError::Session(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Template(_) | AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }
        HttpResponse::build(status)
            .content_type("text/plain")
            .body(status.canonical_reason().unwrap_or("Error"))
    }
}

pub type AppResult<T> = Result<T, AppError>;
