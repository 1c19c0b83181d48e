use serde::{Deserialize, Serialize};

/// One async inference submission, referencing input already uploaded to the
/// object store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitRequest {
    pub endpoint_name: String,
    pub input_location: String,
    pub invocation_id: String,
    pub sequence_length: usize,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitAccepted {
    pub inference_id: String,
    /// Location the service will write the result to, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
}

/// Submission failures, kept separate so callers can tell "retry later" from
/// "fix the input" from "fix the deployment".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitErrorKind {
    Validation,
    Model,
    Internal,
    Unavailable,
    Connection,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitError {
    pub kind: SubmitErrorKind,
    pub message: String,
}

impl SubmitError {
    pub fn new(kind: SubmitErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SubmitError {}

/// Capability interface over the async inference service.
pub trait InferenceClient {
    fn submit_async(&self, request: &SubmitRequest) -> Result<SubmitAccepted, SubmitError>;
}
