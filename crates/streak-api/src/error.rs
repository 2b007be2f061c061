use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use streak_db::StoreError;
use streak_types::api::DetailResponse;

/// Handler error. Rendered as `{"detail": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Unavailable(String),

    /// An outbound call failed; the message is passed through.
    #[error("Internal Server Error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => ApiError::NotFound(msg.to_string()),
            StoreError::Conflict(_) | StoreError::Invalid(_) | StoreError::Transition(_) => {
                ApiError::BadRequest(e.to_string())
            }
            StoreError::Sqlite(_) | StoreError::LockPoisoned(_) | StoreError::Migration(_) => {
                error!("Store error: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(DetailResponse {
            detail: self.to_string(),
        });

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streak_types::models::TransitionError;

    #[test]
    fn store_errors_map_to_client_statuses() {
        let cases = [
            (StoreError::NotFound("Account not found"), StatusCode::NOT_FOUND),
            (StoreError::Conflict("Email already registered".into()), StatusCode::BAD_REQUEST),
            (StoreError::Invalid("nope".into()), StatusCode::BAD_REQUEST),
            (StoreError::Transition(TransitionError::CompleteAfterFail), StatusCode::BAD_REQUEST),
            (StoreError::LockPoisoned("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = ApiError::from(StoreError::LockPoisoned("secret path".into()));
        assert_eq!(err.to_string(), "Internal server error");
    }
}
