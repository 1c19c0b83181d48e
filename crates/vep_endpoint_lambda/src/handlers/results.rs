use chrono::Utc;
use serde_json::{json, Value};
use vep_endpoint_core::contract::{
    ErrorCode, ToolError, ToolResult, ToolSuccess, CHECK_INTERVAL_SECONDS, RETRY_AFTER_SECONDS,
};
use vep_endpoint_core::storage_keys::{
    failure_object_key, output_object_key, parse_output_reference, s3_uri, OutputReference,
};
use vep_endpoint_core::validators::validate_event_structure;

use crate::adapters::object_store::{ObjectHead, ObjectStore, StoreError, StoreErrorKind};
use crate::config::{EndpointConfig, BUCKET_NAME_VAR};
use crate::telemetry::{log_error, log_event, MetricSink};

const COMPONENT: &str = "get_results";

/// Resolves one output identifier to its current state: completed (success
/// object exists), failed (failure object exists), or in progress (neither).
/// Exactly one head probe per location and at most one get per invocation;
/// polling cadence is the caller's responsibility.
pub fn handle_get_results(
    event: &Value,
    config: &EndpointConfig,
    store: &dyn ObjectStore,
    metrics: &dyn MetricSink,
) -> ToolResult {
    let started_at = Utc::now();

    if let Err(failure) = validate_event_structure(event, &["output_id"]) {
        metrics.count("ValidationError");
        return Err(failure.into_tool_error(ErrorCode::InvalidEventStructure));
    }

    let raw_reference = event
        .get("output_id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let reference = parse_output_reference(raw_reference)
        .map_err(|error| ToolError::new(ErrorCode::InvalidS3Path, error.message()))?;

    let (bucket, output_key, output_id) = match &reference {
        OutputReference::Path {
            bucket,
            key,
            output_id,
        } => (bucket.clone(), key.clone(), output_id.clone()),
        OutputReference::Id(id) => {
            let Some(bucket) = config.bucket.as_deref() else {
                return Err(ToolError::new(
                    ErrorCode::ConfigurationError,
                    format!(
                        "S3 bucket name not configured. Check {BUCKET_NAME_VAR} environment variable."
                    ),
                ));
            };
            (
                bucket.to_string(),
                output_object_key(&config.output_prefix, id),
                id.clone(),
            )
        }
    };
    let failure_key = failure_object_key(&config.failure_prefix, &output_id);

    log_event(
        COMPONENT,
        "result_check_started",
        json!({
            "output_id": output_id,
            "bucket": bucket,
            "output_key": output_key,
            "failure_key": failure_key,
        }),
    );

    let mut warnings: Vec<String> = Vec::new();

    // Success object first; a prediction never has both outcomes.
    let output_head = probe_strict(store, &bucket, &output_key, &output_id, &mut warnings)?;
    if let Some(head) = output_head {
        return retrieve_completed_results(
            store, metrics, &bucket, &output_key, &output_id, &head, started_at,
        );
    }

    let failure_head = probe_lenient(store, &bucket, &failure_key, &mut warnings);
    if let Some(head) = failure_head {
        return retrieve_failure_details(store, metrics, &bucket, &failure_key, &output_id, &head);
    }

    log_event(
        COMPONENT,
        "prediction_in_progress",
        json!({
            "output_id": output_id,
            "output_key": output_key,
            "failure_key": failure_key,
        }),
    );

    let mut data = json!({
        "status": "in_progress",
        "output_id": output_id,
        "message": "Prediction is still in progress. Please check again later.",
        "expected_paths": {
            "success": s3_uri(&bucket, &output_key),
            "failure": s3_uri(&bucket, &failure_key),
        },
        "check_interval_seconds": CHECK_INTERVAL_SECONDS,
    });
    if !warnings.is_empty() {
        data["s3_warnings"] = json!(warnings);
    }
    Ok(ToolSuccess::new("Prediction is still in progress", data))
}

fn retrieve_completed_results(
    store: &dyn ObjectStore,
    metrics: &dyn MetricSink,
    bucket: &str,
    output_key: &str,
    output_id: &str,
    head: &ObjectHead,
    started_at: chrono::DateTime<Utc>,
) -> ToolResult {
    let bytes = match store.get_object(bucket, output_key) {
        Ok(bytes) => bytes,
        Err(error) => {
            metrics.count("ResultsRetrievalError");
            return Err(ToolError::with_details(
                ErrorCode::ResultRetrievalError,
                format!("Failed to retrieve results from S3: {}", error.message),
                json!({
                    "output_id": output_id,
                    "s3_output_path": s3_uri(bucket, output_key),
                }),
            ));
        }
    };

    let results = match parse_result_body(&bytes) {
        Ok(results) => results,
        Err(reason) => {
            metrics.count("ResultsRetrievalError");
            return Err(ToolError::with_details(
                ErrorCode::ResultRetrievalError,
                format!("Failed to retrieve results from S3: {reason}"),
                json!({
                    "output_id": output_id,
                    "s3_output_path": s3_uri(bucket, output_key),
                }),
            ));
        }
    };

    let duration_ms = (Utc::now() - started_at).num_milliseconds();
    metrics.count("ResultsRetrievalSuccess");
    metrics.millis("ResultsRetrievalDuration", duration_ms as f64);
    metrics.bytes("ResultsSize", bytes.len() as f64);

    log_event(
        COMPONENT,
        "results_retrieved",
        json!({
            "output_id": output_id,
            "results_size": bytes.len(),
            "duration_ms": duration_ms,
        }),
    );

    Ok(ToolSuccess::new(
        "Results retrieved successfully",
        json!({
            "status": "completed",
            "results": results,
            "output_id": output_id,
            "s3_output_path": s3_uri(bucket, output_key),
            "completion_time": head.last_modified,
        }),
    ))
}

fn retrieve_failure_details(
    store: &dyn ObjectStore,
    metrics: &dyn MetricSink,
    bucket: &str,
    failure_key: &str,
    output_id: &str,
    head: &ObjectHead,
) -> ToolResult {
    let failure_path = s3_uri(bucket, failure_key);
    match store.get_object(bucket, failure_key) {
        Ok(bytes) => {
            metrics.count("PredictionFailed");
            log_event(
                COMPONENT,
                "failure_detected",
                json!({
                    "output_id": output_id,
                    "failure_time": head.last_modified,
                }),
            );
            Err(ToolError::with_details(
                ErrorCode::PredictionFailed,
                "Async inference prediction failed",
                json!({
                    "status": "failed",
                    "output_id": output_id,
                    "s3_failure_path": failure_path,
                    "failure_time": head.last_modified,
                    "error_details": parse_failure_body(&bytes),
                }),
            ))
        }
        Err(error) => {
            metrics.count("FailureRetrievalError");
            Err(ToolError::with_details(
                ErrorCode::FailureRetrievalError,
                "Prediction failed, but could not retrieve failure details",
                json!({
                    "status": "failed",
                    "output_id": output_id,
                    "s3_failure_path": failure_path,
                    "retrieval_error": error.message,
                }),
            ))
        }
    }
}

/// Probe for the success object. Configuration-level failures abort the call;
/// transient failures surface as a retryable error; anything else degrades to
/// a warning carried on the in-progress response.
fn probe_strict(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    output_id: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<ObjectHead>, ToolError> {
    match store.head_object(bucket, key) {
        Ok(head) => Ok(head),
        Err(error) => match error.kind {
            StoreErrorKind::AccessDenied
            | StoreErrorKind::BucketNotFound
            | StoreErrorKind::InvalidName => Err(ToolError::with_details(
                store_error_code(error.kind),
                format!("S3 configuration error: {}", error.message),
                json!({
                    "output_id": output_id,
                    "s3_bucket": bucket,
                    "attempted_path": s3_uri(bucket, key),
                }),
            )),
            StoreErrorKind::ServiceUnavailable | StoreErrorKind::Connection => {
                Err(ToolError::with_details(
                    store_error_code(error.kind),
                    format!("S3 service temporarily unavailable: {}", error.message),
                    json!({
                        "output_id": output_id,
                        "retry_suggested": true,
                        "retry_after_seconds": RETRY_AFTER_SECONDS,
                    }),
                ))
            }
            StoreErrorKind::Other => {
                log_error(
                    COMPONENT,
                    "output_probe_degraded",
                    json!({ "key": key, "message": error.message }),
                );
                warnings.push(format!("Output path check: {}", error.message));
                Ok(None)
            }
        },
    }
}

/// Probe for the failure object. By this point the success probe has already
/// vetted the bucket, so every failure here degrades to a warning.
fn probe_lenient(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    warnings: &mut Vec<String>,
) -> Option<ObjectHead> {
    match store.head_object(bucket, key) {
        Ok(head) => head,
        Err(error) => {
            log_error(
                COMPONENT,
                "failure_probe_degraded",
                json!({ "key": key, "message": error.message }),
            );
            warnings.push(format!("Failure path check: {}", error.message));
            None
        }
    }
}

fn store_error_code(kind: StoreErrorKind) -> ErrorCode {
    match kind {
        StoreErrorKind::AccessDenied => ErrorCode::AccessDenied,
        StoreErrorKind::BucketNotFound => ErrorCode::BucketNotFound,
        StoreErrorKind::InvalidName => ErrorCode::InvalidS3Name,
        StoreErrorKind::ServiceUnavailable => ErrorCode::S3ServiceUnavailable,
        StoreErrorKind::Connection => ErrorCode::S3ConnectionError,
        StoreErrorKind::Other => ErrorCode::ResultRetrievalError,
    }
}

/// Result bodies are usually JSON but the model may emit bare text; only an
/// undecodable body is treated as an error.
fn parse_result_body(bytes: &[u8]) -> Result<Value, String> {
    let content = std::str::from_utf8(bytes)
        .map_err(|_| "Results file contains invalid character encoding".to_string())?;
    if content.trim().is_empty() {
        return Ok(json!({
            "raw_output": "",
            "warning": "Results file is empty",
        }));
    }
    match serde_json::from_str::<Value>(content) {
        Ok(parsed) => Ok(parsed),
        Err(json_error) => Ok(json!({
            "raw_output": content,
            "parsing_info": {
                "format": "text",
                "json_error": json_error.to_string(),
                "content_length": content.len(),
            },
        })),
    }
}

/// Failure bodies never abort the call; the prediction is already known to
/// have failed, so any readable content is better than none.
fn parse_failure_body(bytes: &[u8]) -> Value {
    let Ok(content) = std::str::from_utf8(bytes) else {
        return json!({
            "error_message": "Failure details file contains invalid character encoding",
            "error_type": "encoding_error",
        });
    };
    if content.trim().is_empty() {
        return json!({
            "error_message": "Prediction failed but no error details available",
            "error_type": "empty_failure_log",
        });
    }
    match serde_json::from_str::<Value>(content) {
        Ok(parsed) => parsed,
        Err(_) => json!({
            "error_message": content,
            "error_type": "text_format",
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vep_endpoint_core::contract::ErrorCode;

    use super::*;
    use crate::adapters::object_store::test_support::{InMemoryStore, TEST_LAST_MODIFIED};
    use crate::config::test_support::test_config;
    use crate::telemetry::NoopMetrics;

    fn get_results(event: serde_json::Value, store: &InMemoryStore) -> ToolResult {
        handle_get_results(&event, &test_config(), store, &NoopMetrics)
    }

    #[test]
    fn reports_in_progress_when_neither_object_exists() {
        let store = InMemoryStore::new();
        let success =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");

        assert_eq!(success.data["status"], json!("in_progress"));
        assert_eq!(success.data["check_interval_seconds"], json!(30));
        assert_eq!(
            success.data["expected_paths"]["success"],
            json!("s3://vep-results/async-inference-output/abc-123.out")
        );
        assert_eq!(
            success.data["expected_paths"]["failure"],
            json!("s3://vep-results/async-inference-failures/abc-123.out")
        );
        assert!(success.data.get("s3_warnings").is_none());
    }

    #[test]
    fn in_progress_is_stable_across_repeated_calls() {
        let store = InMemoryStore::new();
        let first =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");
        let second =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn returns_completed_results_with_object_timestamp() {
        let store = InMemoryStore::new();
        store.insert(
            "vep-results",
            "async-inference-output/abc-123.out",
            br#"{"predictions": [0.12, 0.88]}"#,
        );

        let success =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");

        assert_eq!(success.data["status"], json!("completed"));
        assert_eq!(
            success.data["results"],
            json!({"predictions": [0.12, 0.88]})
        );
        assert_eq!(success.data["completion_time"], json!(TEST_LAST_MODIFIED));
        assert_eq!(
            success.data["s3_output_path"],
            json!("s3://vep-results/async-inference-output/abc-123.out")
        );
    }

    #[test]
    fn completed_results_are_identical_across_calls() {
        let store = InMemoryStore::new();
        store.insert(
            "vep-results",
            "async-inference-output/abc-123.out",
            br#"{"score": 1}"#,
        );

        let first =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");
        let second =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn accepts_full_s3_path_as_reference() {
        let store = InMemoryStore::new();
        store.insert("other-bucket", "custom/out/abc-123.out", br#"{"ok": true}"#);

        let success = get_results(
            json!({"output_id": "s3://other-bucket/custom/out/abc-123.out"}),
            &store,
        )
        .expect("call should succeed");

        assert_eq!(success.data["status"], json!("completed"));
        assert_eq!(success.data["output_id"], json!("abc-123"));
        assert_eq!(
            success.data["s3_output_path"],
            json!("s3://other-bucket/custom/out/abc-123.out")
        );
    }

    #[test]
    fn reports_prediction_failure_with_error_details() {
        let store = InMemoryStore::new();
        store.insert(
            "vep-results",
            "async-inference-failures/abc-123.out",
            br#"{"error": "model out of memory"}"#,
        );

        let error =
            get_results(json!({"output_id": "abc-123"}), &store).expect_err("call should fail");

        assert_eq!(error.code, ErrorCode::PredictionFailed);
        let details = error.details.expect("details should be present");
        assert_eq!(details["status"], json!("failed"));
        assert_eq!(details["failure_time"], json!(TEST_LAST_MODIFIED));
        assert_eq!(
            details["error_details"],
            json!({"error": "model out of memory"})
        );
    }

    #[test]
    fn success_object_takes_precedence_over_failure_object() {
        let store = InMemoryStore::new();
        store.insert(
            "vep-results",
            "async-inference-output/abc-123.out",
            br#"{"ok": true}"#,
        );
        store.insert(
            "vep-results",
            "async-inference-failures/abc-123.out",
            br#"{"error": "stale"}"#,
        );

        let success =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");
        assert_eq!(success.data["status"], json!("completed"));
    }

    #[test]
    fn wraps_non_json_results_as_raw_output() {
        let store = InMemoryStore::new();
        store.insert(
            "vep-results",
            "async-inference-output/abc-123.out",
            b"score\t0.97",
        );

        let success =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");
        assert_eq!(success.data["results"]["raw_output"], json!("score\t0.97"));
        assert_eq!(
            success.data["results"]["parsing_info"]["format"],
            json!("text")
        );
    }

    #[test]
    fn rejects_event_without_output_id() {
        let store = InMemoryStore::new();
        let error = get_results(json!({}), &store).expect_err("call should fail");
        assert_eq!(error.code, ErrorCode::InvalidEventStructure);
    }

    #[test]
    fn rejects_malformed_s3_path() {
        let store = InMemoryStore::new();
        let error = get_results(json!({"output_id": "s3://bucket-only"}), &store)
            .expect_err("call should fail");
        assert_eq!(error.code, ErrorCode::InvalidS3Path);
    }

    #[test]
    fn reports_missing_bucket_for_bare_identifier() {
        let mut config = test_config();
        config.bucket = None;
        let store = InMemoryStore::new();
        let error = handle_get_results(
            &json!({"output_id": "abc-123"}),
            &config,
            &store,
            &NoopMetrics,
        )
        .expect_err("call should fail");
        assert_eq!(error.code, ErrorCode::ConfigurationError);
    }

    #[test]
    fn critical_probe_errors_abort_the_call() {
        let store = InMemoryStore::new();
        store.fail_head(
            "vep-results",
            "async-inference-output/abc-123.out",
            StoreError::new(StoreErrorKind::AccessDenied, "access denied"),
        );

        let error =
            get_results(json!({"output_id": "abc-123"}), &store).expect_err("call should fail");
        assert_eq!(error.code, ErrorCode::AccessDenied);
        let details = error.details.expect("details should be present");
        assert_eq!(
            details["attempted_path"],
            json!("s3://vep-results/async-inference-output/abc-123.out")
        );
    }

    #[test]
    fn transient_probe_errors_suggest_a_retry() {
        let store = InMemoryStore::new();
        store.fail_head(
            "vep-results",
            "async-inference-output/abc-123.out",
            StoreError::new(StoreErrorKind::ServiceUnavailable, "slow down"),
        );

        let error =
            get_results(json!({"output_id": "abc-123"}), &store).expect_err("call should fail");
        assert_eq!(error.code, ErrorCode::S3ServiceUnavailable);
        let details = error.details.expect("details should be present");
        assert_eq!(details["retry_suggested"], json!(true));
        assert_eq!(details["retry_after_seconds"], json!(30));
    }

    #[test]
    fn degraded_probes_surface_as_warnings_on_in_progress() {
        let store = InMemoryStore::new();
        store.fail_head(
            "vep-results",
            "async-inference-output/abc-123.out",
            StoreError::new(StoreErrorKind::Other, "internal error"),
        );
        store.fail_head(
            "vep-results",
            "async-inference-failures/abc-123.out",
            StoreError::new(StoreErrorKind::Other, "internal error"),
        );

        let success =
            get_results(json!({"output_id": "abc-123"}), &store).expect("call should succeed");
        assert_eq!(success.data["status"], json!("in_progress"));
        let warnings = success.data["s3_warnings"]
            .as_array()
            .expect("warnings should be present");
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn failure_details_fetch_error_keeps_failed_status() {
        let store = InMemoryStore::new();
        store.insert(
            "vep-results",
            "async-inference-failures/abc-123.out",
            br#"{"error": "boom"}"#,
        );
        store.fail_gets(StoreError::new(StoreErrorKind::Other, "read timeout"));

        let error =
            get_results(json!({"output_id": "abc-123"}), &store).expect_err("call should fail");
        assert_eq!(error.code, ErrorCode::FailureRetrievalError);
        let details = error.details.expect("details should be present");
        assert_eq!(details["status"], json!("failed"));
    }

    #[test]
    fn non_json_failure_body_is_reported_as_text() {
        let store = InMemoryStore::new();
        store.insert(
            "vep-results",
            "async-inference-failures/abc-123.out",
            b"CUDA out of memory",
        );

        let error =
            get_results(json!({"output_id": "abc-123"}), &store).expect_err("call should fail");
        let details = error.details.expect("details should be present");
        assert_eq!(
            details["error_details"]["error_message"],
            json!("CUDA out of memory")
        );
        assert_eq!(details["error_details"]["error_type"], json!("text_format"));
    }
}
