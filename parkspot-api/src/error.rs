use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parkspot_core::LifecycleError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Lifecycle(LifecycleError::InvalidInput(rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Lifecycle(LifecycleError::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Lifecycle(LifecycleError::InvalidInput(rejection.body_text()))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Lifecycle(err) => match err {
                LifecycleError::LotNotFound(_) | LifecycleError::BookingNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                LifecycleError::LotFull(_) | LifecycleError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                LifecycleError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LifecycleError::TransientStoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                LifecycleError::DataIntegrityFault(_) | LifecycleError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Lifecycle(err) => err.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Lifecycle(LifecycleError::DataIntegrityFault(msg)) => {
                tracing::error!(reason = %msg, "Consistency violation surfaced to client");
                "Internal Server Error".to_string()
            }
            AppError::Lifecycle(LifecycleError::Storage(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Lifecycle(LifecycleError::TransientStoreFailure(msg)) => {
                tracing::warn!("Store contention after retries: {}", msg);
                "Service busy, please retry".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
