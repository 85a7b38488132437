pub mod machine_routes;
pub mod plot_routes;

use crate::web::error::AppError;

/// Required request parameter, mapped to a 400 instead of the framework's
/// generic rejection so missing and malformed input stay distinguishable.
pub(crate) fn require<T>(value: Option<T>, name: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::InvalidInput(format!("missing parameter: {name}")))
}

pub(crate) fn parse_index(raw: &str) -> Result<usize, AppError> {
    raw.parse::<usize>()
        .map_err(|_| AppError::InvalidInput(format!("index must be a non-negative integer, got {raw:?}")))
}

pub(crate) fn parse_token(raw: &str) -> Result<uuid::Uuid, AppError> {
    uuid::Uuid::parse_str(raw)
        .map_err(|_| AppError::InvalidInput(format!("malformed job-list token {raw:?}")))
}
