use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateways may prepend a namespace segment before the real tool name.
pub const TOOL_NAME_DELIMITER: &str = "___";

pub const MAX_SEQUENCE_LENGTH: usize = 10_000;
pub const VALID_AMINO_ACIDS: &str = "ACDEFGHIKLMNPQRSTVWY";

/// Suggested delay between `get_results` polls while a prediction is pending.
pub const CHECK_INTERVAL_SECONDS: u64 = 30;
/// Suggested delay before retrying after a transient storage error.
pub const RETRY_AFTER_SECONDS: u64 = 30;

pub const INVOCATION_TIMEOUT_SECONDS: i32 = 3_600;
pub const REQUEST_TTL_SECONDS: i32 = 21_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    InvokeEndpoint,
    GetResults,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvokeEndpoint => "invoke_endpoint",
            Self::GetResults => "get_results",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "invoke_endpoint" => Some(Self::InvokeEndpoint),
            "get_results" => Some(Self::GetResults),
            _ => None,
        }
    }
}

/// Strips a gateway namespace prefix (`namespace___tool`) down to the bare
/// tool name. Names without the delimiter pass through unchanged.
pub fn resolve_tool_name(raw: &str) -> &str {
    match raw.find(TOOL_NAME_DELIMITER) {
        Some(index) => &raw[index + TOOL_NAME_DELIMITER.len()..],
        None => raw,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidEventStructure,
    InvalidSequence,
    MissingToolName,
    UnknownTool,
    ConfigurationError,
    S3UploadError,
    SagemakerValidationError,
    SagemakerModelError,
    SagemakerInternalError,
    SagemakerServiceUnavailable,
    SagemakerError,
    AwsConnectionError,
    InvalidS3Path,
    AccessDenied,
    BucketNotFound,
    InvalidS3Name,
    S3ServiceUnavailable,
    S3ConnectionError,
    ResultRetrievalError,
    FailureRetrievalError,
    PredictionFailed,
    HandlerError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidEventStructure => "INVALID_EVENT_STRUCTURE",
            Self::InvalidSequence => "INVALID_SEQUENCE",
            Self::MissingToolName => "MISSING_TOOL_NAME",
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::S3UploadError => "S3_UPLOAD_ERROR",
            Self::SagemakerValidationError => "SAGEMAKER_VALIDATION_ERROR",
            Self::SagemakerModelError => "SAGEMAKER_MODEL_ERROR",
            Self::SagemakerInternalError => "SAGEMAKER_INTERNAL_ERROR",
            Self::SagemakerServiceUnavailable => "SAGEMAKER_SERVICE_UNAVAILABLE",
            Self::SagemakerError => "SAGEMAKER_ERROR",
            Self::AwsConnectionError => "AWS_CONNECTION_ERROR",
            Self::InvalidS3Path => "INVALID_S3_PATH",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::BucketNotFound => "BUCKET_NOT_FOUND",
            Self::InvalidS3Name => "INVALID_S3_NAME",
            Self::S3ServiceUnavailable => "S3_SERVICE_UNAVAILABLE",
            Self::S3ConnectionError => "S3_CONNECTION_ERROR",
            Self::ResultRetrievalError => "RESULT_RETRIEVAL_ERROR",
            Self::FailureRetrievalError => "FAILURE_RETRIEVAL_ERROR",
            Self::PredictionFailed => "PREDICTION_FAILED",
            Self::HandlerError => "HANDLER_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success half of a tool outcome, before envelope construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSuccess {
    pub message: String,
    pub data: Value,
}

impl ToolSuccess {
    pub fn new(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Failure half of a tool outcome. Every handler error path produces one of
/// these; the router converts it into the envelope exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

pub type ToolResult = Result<ToolSuccess, ToolError>;

/// Uniform response shape returned by every operation, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: String,
}

impl ToolResponse {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error_code: None,
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self {
            success: false,
            message: error.message,
            data: None,
            error_code: Some(error.code.as_str().to_string()),
            details: error.details,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn from_result(result: ToolResult) -> Self {
        match result {
            Ok(success) => Self::success(success.message, success.data),
            Err(error) => Self::failure(error),
        }
    }
}

/// Caller-facing hint only; not a latency contract.
pub fn estimated_completion_minutes(sequence_length: usize) -> u64 {
    std::cmp::max(1, (sequence_length / 600) as u64 + 1)
}
