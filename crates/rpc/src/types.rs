//! Request/response types and error mapping for the RPC API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use council_engine::ApiError;
use council_types::Address;
use serde::{Deserialize, Serialize};

/// Body of `POST /candidates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub address: Address,
    pub auth: bool,
}

/// Uniform error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// RPC-layer error: either a malformed request or an engine error.
#[derive(Debug)]
pub enum RpcError {
    BadRequest(String),
    Api(ApiError),
}

impl From<ApiError> for RpcError {
    fn from(e: ApiError) -> Self {
        RpcError::Api(e)
    }
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Api(e) => match e {
                ApiError::PendingNotAllowed
                | ApiError::StartNotPositive
                | ApiError::EndLargerThanLatest
                | ApiError::StartLargerThanEnd
                | ApiError::RequestedBlocksTooLarge
                | ApiError::RangeNil
                | ApiError::NoBlockNumber => StatusCode::BAD_REQUEST,
                ApiError::UnknownBlock | ApiError::NoBlockExist(_) => StatusCode::NOT_FOUND,
                ApiError::ExtractConsensusExtra | ApiError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            RpcError::BadRequest(msg) => msg.clone(),
            RpcError::Api(e) => e.to_string(),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message(),
        });
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_shape() {
        let body = serde_json::to_string(&ErrorResponse {
            error: "pending is not allowed".into(),
        })
        .unwrap();
        assert_eq!(body, r#"{"error":"pending is not allowed"}"#);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            RpcError::from(ApiError::PendingNotAllowed).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RpcError::from(ApiError::UnknownBlock).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RpcError::from(ApiError::NoBlockExist("block number: 9".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RpcError::from(ApiError::Internal("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RpcError::BadRequest("bad hash".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
