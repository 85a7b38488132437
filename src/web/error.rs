use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::plot::render::RenderError;
use crate::store::logs::LogError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unknown machine: {0}")]
    UnknownMachine(String),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Job list expired or unknown; reload the job listing")]
    JobListExpired,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("Chart rendering failed: {0}")]
    Chart(#[from] RenderError),
    #[error("Datalog error: {0}")]
    Datalog(#[from] LogError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnknownMachine(_)
            | AppError::UnknownTable(_)
            | AppError::JobListExpired
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Template(_)
            | AppError::Chart(_)
            | AppError::Datalog(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
