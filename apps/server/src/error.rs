use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pocketbook_core::errors::{DatabaseError, Error as CoreError, GatewayError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) | CoreError::Database(DatabaseError::NotFound(_)) => StatusCode::NOT_FOUND,
        CoreError::InsufficientFunds { .. } => StatusCode::CONFLICT,
        CoreError::Database(DatabaseError::UniqueViolation(_)) => StatusCode::CONFLICT,
        CoreError::Gateway(GatewayError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        CoreError::Gateway(_) => StatusCode::BAD_GATEWAY,
        CoreError::Inconsistency(_) => StatusCode::LOCKED,
        CoreError::Database(_) | CoreError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Core(e) => core_status(e),
            ApiError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pocketbook_core::errors::ValidationError;

    #[test]
    fn core_errors_map_to_status_codes() {
        let cases = [
            (CoreError::from(ValidationError::SameAccount), 400),
            (CoreError::NotFound("pocket".into()), 404),
            (
                CoreError::InsufficientFunds {
                    requested: 2,
                    available: 1,
                },
                409,
            ),
            (CoreError::from(GatewayError::remote("bank", "no")), 502),
            (CoreError::from(GatewayError::timeout("bank")), 504),
            (CoreError::Inconsistency("drift".into()), 423),
            (CoreError::Unexpected("boom".into()), 500),
        ];
        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status().as_u16(), expected);
        }
    }
}
