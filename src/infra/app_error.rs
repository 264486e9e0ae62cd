use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::infra::aliases::DieselError;

/// JSON envelope shared by every endpoint.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    ForbiddenResource(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                AppError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, ref info) => {
                AppError::Validation(info.message().to_string())
            }
            _ => AppError::Other(err.into()),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Other(err) => {
                tracing::error!("Unhandled error: {:?}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            StdResponse::<(), String> {
                data: None,
                message: Some(message),
            },
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err: AppError = DieselError::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_errors_keep_their_message() {
        let err = AppError::Validation("Local Bangladeshi numbers must start with 01.".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.to_string(),
            "Local Bangladeshi numbers must start with 01."
        );
    }

    #[test]
    fn anyhow_errors_are_internal() {
        let err: AppError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
