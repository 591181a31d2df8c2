use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use directory::DirectoryError;
use thiserror::Error;
use tracing::error;

use crate::utils::login_url;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    /// Carries the path to come back to after logging in.
    #[error("Login required for {0}")]
    LoginRequired(String),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MalformedPayload => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            AppError::LoginRequired(next) => Redirect::to(&login_url(&next)).into_response(),
            AppError::Directory { .. } | AppError::Template { .. } | AppError::Io { .. } => {
                error!("{self}");

                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
