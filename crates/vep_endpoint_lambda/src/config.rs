//! Environment-provided configuration for the tool handlers.
//!
//! Required values are carried as `Option` rather than failing at load time:
//! each handler reports `CONFIGURATION_ERROR` for the values it actually
//! needs, so `get_results` keeps working on a deployment that never set the
//! endpoint name.

pub const ENDPOINT_NAME_VAR: &str = "SAGEMAKER_ENDPOINT_NAME";
pub const BUCKET_NAME_VAR: &str = "S3_BUCKET_NAME";
pub const INPUT_PREFIX_VAR: &str = "S3_INPUT_PREFIX";
pub const OUTPUT_PREFIX_VAR: &str = "S3_OUTPUT_PREFIX";
pub const FAILURE_PREFIX_VAR: &str = "S3_FAILURE_PREFIX";

pub const DEFAULT_INPUT_PREFIX: &str = "async-inference-input";
pub const DEFAULT_OUTPUT_PREFIX: &str = "async-inference-output";
pub const DEFAULT_FAILURE_PREFIX: &str = "async-inference-failures";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub endpoint_name: Option<String>,
    pub bucket: Option<String>,
    pub input_prefix: String,
    pub output_prefix: String,
    pub failure_prefix: String,
}

impl EndpointConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint_name: non_empty_var(ENDPOINT_NAME_VAR),
            bucket: non_empty_var(BUCKET_NAME_VAR),
            input_prefix: non_empty_var(INPUT_PREFIX_VAR)
                .unwrap_or_else(|| DEFAULT_INPUT_PREFIX.to_string()),
            output_prefix: non_empty_var(OUTPUT_PREFIX_VAR)
                .unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string()),
            failure_prefix: non_empty_var(FAILURE_PREFIX_VAR)
                .unwrap_or_else(|| DEFAULT_FAILURE_PREFIX.to_string()),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
