//! API error types and formatting

use serde::Serialize;
use thiserror::Error;

/// Error codes surfaced by the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Caller misuse
    InvalidQueueUrl,
    MissingParameter,
    InvalidParameterValue,

    // Queue state
    QueueDoesNotExist,
    MessageNotAvailable,
    ReceiptHandleIsInvalid,

    // Transport
    ServiceUnavailable,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidQueueUrl => "InvalidQueueUrl",
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::QueueDoesNotExist => "QueueDoesNotExist",
            Self::MessageNotAvailable => "MessageNotAvailable",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalError => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidQueueUrl
            | Self::MissingParameter
            | Self::InvalidParameterValue
            | Self::ReceiptHandleIsInvalid => 400,
            Self::QueueDoesNotExist | Self::MessageNotAvailable => 404,
            Self::ServiceUnavailable => 503,
            Self::InternalError => 500,
        }
    }
}

/// Error returned to API callers
#[derive(Debug, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Format as a JSON error body
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            #[serde(rename = "__type")]
            error_type: &'a str,
            message: &'a str,
            #[serde(rename = "requestId")]
            request_id: &'a str,
        }

        let error = JsonError {
            error_type: self.code.as_str(),
            message: &self.message,
            request_id: &self.request_id,
        };

        serde_json::to_string(&error).unwrap_or_else(|_| {
            format!(
                r#"{{"__type":"{}","message":"{}"}}"#,
                self.code.as_str(),
                self.message
            )
        })
    }
}

impl From<crate::QueueRefError> for ApiError {
    fn from(err: crate::QueueRefError) -> Self {
        Self::new(ErrorCode::InvalidQueueUrl, err.to_string())
    }
}
