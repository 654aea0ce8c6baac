use crate::protocol::{error_codes, JsonRpcResponse};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Bad Request: No valid session ID provided")]
    InvalidSession,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session channel error: {0}")]
    Channel(String),
}

impl GatewayError {
    fn rpc_code(&self) -> i64 {
        match self {
            GatewayError::InvalidSession => error_codes::INVALID_SESSION,
            GatewayError::Parse(_) => error_codes::PARSE_ERROR,
            GatewayError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            GatewayError::Channel(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidSession
            | GatewayError::Parse(_)
            | GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Channel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(JsonRpcResponse::error(
            Value::Null,
            self.rpc_code(),
            self.to_string(),
        ))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_session_is_bad_request() {
        let err = GatewayError::InvalidSession;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.rpc_code(), error_codes::INVALID_SESSION);
    }

    #[test]
    fn test_channel_error_is_internal() {
        let err = GatewayError::Channel("mailbox closed".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
