use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use vep_endpoint_core::contract::{
    estimated_completion_minutes, ErrorCode, ToolError, ToolResult, ToolSuccess,
};
use vep_endpoint_core::storage_keys::{input_object_key, output_object_key, s3_uri};
use vep_endpoint_core::validators::{validate_amino_acid_sequence, validate_event_structure};

use crate::adapters::inference::{InferenceClient, SubmitError, SubmitErrorKind, SubmitRequest};
use crate::adapters::object_store::ObjectStore;
use crate::config::{EndpointConfig, BUCKET_NAME_VAR, ENDPOINT_NAME_VAR};
use crate::telemetry::{log_error, log_event, MetricSink, MetricUnit};

const COMPONENT: &str = "invoke_endpoint";

/// Submits one async inference request: uploads the validated sequence to the
/// input prefix, invokes the endpoint, and reports where the result will land.
/// Each step maps to its own error kind; no step is retried here.
pub fn handle_invoke_endpoint(
    event: &Value,
    config: &EndpointConfig,
    store: &dyn ObjectStore,
    inference: &dyn InferenceClient,
    metrics: &dyn MetricSink,
) -> ToolResult {
    let started_at = Utc::now();

    if let Err(failure) = validate_event_structure(event, &["sequence"]) {
        metrics.count("ValidationError");
        return Err(failure.into_tool_error(ErrorCode::InvalidEventStructure));
    }

    let raw_sequence = event
        .get("sequence")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let sequence = match validate_amino_acid_sequence(raw_sequence) {
        Ok(cleaned) => cleaned,
        Err(failure) => {
            metrics.count("ValidationError");
            return Err(failure.into_tool_error(ErrorCode::InvalidSequence));
        }
    };

    let Some(endpoint_name) = config.endpoint_name.as_deref() else {
        metrics.count("ConfigurationError");
        return Err(ToolError::new(
            ErrorCode::ConfigurationError,
            format!(
                "SageMaker endpoint name not configured. Check {ENDPOINT_NAME_VAR} environment variable."
            ),
        ));
    };
    let Some(bucket) = config.bucket.as_deref() else {
        metrics.count("ConfigurationError");
        return Err(ToolError::new(
            ErrorCode::ConfigurationError,
            format!("S3 bucket name not configured. Check {BUCKET_NAME_VAR} environment variable."),
        ));
    };

    let invocation_id = Uuid::new_v4().to_string();
    let input_key = input_object_key(&config.input_prefix, &invocation_id);
    let input_location = s3_uri(bucket, &input_key);
    let fallback_output_path = s3_uri(
        bucket,
        &output_object_key(&config.output_prefix, &invocation_id),
    );

    let input_body = serde_json::to_vec(&json!({ "sequence": sequence }))
        .expect("input payload should serialize");
    if let Err(error) = store.put_object(bucket, &input_key, &input_body, "application/json") {
        metrics.count("S3Error");
        log_error(
            COMPONENT,
            "input_upload_failed",
            json!({ "input_location": input_location, "message": error.message }),
        );
        return Err(ToolError::new(
            ErrorCode::S3UploadError,
            format!("Failed to upload input data to S3: {}", error.message),
        ));
    }

    log_event(
        COMPONENT,
        "sagemaker_invocation_started",
        json!({
            "endpoint_name": endpoint_name,
            "invocation_id": invocation_id,
            "sequence_length": sequence.len(),
            "input_location": input_location,
            "expected_output_path": fallback_output_path,
        }),
    );

    let request = SubmitRequest {
        endpoint_name: endpoint_name.to_string(),
        input_location: input_location.clone(),
        invocation_id: invocation_id.clone(),
        sequence_length: sequence.len(),
        submitted_at: started_at.to_rfc3339(),
    };
    let accepted = match inference.submit_async(&request) {
        Ok(accepted) => accepted,
        Err(error) => return Err(submit_error(error, metrics)),
    };

    let output_location = accepted
        .output_location
        .unwrap_or_else(|| fallback_output_path.clone());
    let output_id = output_id_from_location(&output_location, &invocation_id);

    let duration_ms = (Utc::now() - started_at).num_milliseconds();
    metrics.millis("InvocationDuration", duration_ms as f64);
    metrics.record("SequenceLength", sequence.len() as f64, MetricUnit::Count);

    log_event(
        COMPONENT,
        "sagemaker_invocation_success",
        json!({
            "s3_output_path": output_location,
            "output_id": output_id,
            "inference_id": accepted.inference_id,
            "sequence_length": sequence.len(),
            "endpoint_name": endpoint_name,
            "duration_ms": duration_ms,
        }),
    );

    let estimated_completion = started_at
        + Duration::minutes(estimated_completion_minutes(sequence.len()) as i64);
    Ok(ToolSuccess::new(
        "Async inference request submitted successfully",
        json!({
            "s3_output_path": output_location,
            "output_id": output_id,
            "sequence_length": sequence.len(),
            "estimated_completion_time": estimated_completion.to_rfc3339(),
        }),
    ))
}

/// The service reports the output object it will write; the id is its file
/// name minus the `.out` suffix. Falls back to the locally generated id when
/// the location has no usable file name.
fn output_id_from_location(location: &str, fallback: &str) -> String {
    let file_name = location.rsplit('/').next().unwrap_or("");
    let id = file_name.strip_suffix(".out").unwrap_or(file_name);
    if id.is_empty() {
        fallback.to_string()
    } else {
        id.to_string()
    }
}

fn submit_error(error: SubmitError, metrics: &dyn MetricSink) -> ToolError {
    match error.kind {
        SubmitErrorKind::Connection => metrics.count("ConnectionError"),
        _ => metrics.count("SageMakerError"),
    }
    match error.kind {
        SubmitErrorKind::Validation => ToolError::new(
            ErrorCode::SagemakerValidationError,
            format!("SageMaker validation error: {}", error.message),
        ),
        SubmitErrorKind::Model => ToolError::new(
            ErrorCode::SagemakerModelError,
            "Model error occurred during invocation",
        ),
        SubmitErrorKind::Internal => ToolError::new(
            ErrorCode::SagemakerInternalError,
            "SageMaker internal error occurred",
        ),
        SubmitErrorKind::Unavailable => ToolError::new(
            ErrorCode::SagemakerServiceUnavailable,
            "SageMaker service is temporarily unavailable",
        ),
        SubmitErrorKind::Connection => ToolError::new(
            ErrorCode::AwsConnectionError,
            "Failed to connect to AWS services",
        ),
        SubmitErrorKind::Other => ToolError::new(
            ErrorCode::SagemakerError,
            format!("SageMaker error: {}", error.message),
        ),
    }
}
