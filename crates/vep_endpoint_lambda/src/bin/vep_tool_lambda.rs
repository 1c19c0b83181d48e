use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTimeFormat};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use vep_endpoint_core::contract::{
    ToolResponse, INVOCATION_TIMEOUT_SECONDS, REQUEST_TTL_SECONDS,
};
use vep_endpoint_lambda::adapters::inference::{
    InferenceClient, SubmitAccepted, SubmitError, SubmitErrorKind, SubmitRequest,
};
use vep_endpoint_lambda::adapters::object_store::{
    ObjectHead, ObjectStore, StoreError, StoreErrorKind,
};
use vep_endpoint_lambda::config::EndpointConfig;
use vep_endpoint_lambda::handlers::router::route_tool_call;
use vep_endpoint_lambda::telemetry::{log_error, MetricSink, MetricUnit};

/// Custom client-context attribute some gateways use to carry the tool name.
const CONTEXT_TOOL_NAME_KEY: &str = "bedrockAgentCoreToolName";

struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl ObjectStore for S3ObjectStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        let body = body.to_vec();
        let content_type = content_type.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .content_type(content_type)
                    .body(ByteStream::from(body))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| classify_s3_error("failed to write object to s3", &error))
            })
        })
    }

    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>, StoreError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                match client.head_object().bucket(bucket).key(key).send().await {
                    Ok(head) => Ok(Some(ObjectHead {
                        last_modified: head
                            .last_modified()
                            .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()),
                    })),
                    Err(error) => {
                        let not_found = error
                            .as_service_error()
                            .map(|service| service.is_not_found())
                            .unwrap_or(false);
                        if not_found {
                            Ok(None)
                        } else {
                            Err(classify_s3_error("failed to probe object in s3", &error))
                        }
                    }
                }
            })
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|error| classify_s3_error("failed to read object from s3", &error))?;
                let data = output.body.collect().await.map_err(|error| {
                    StoreError::new(
                        StoreErrorKind::Connection,
                        format!("failed to read object body from s3: {error}"),
                    )
                })?;
                Ok(data.into_bytes().to_vec())
            })
        })
    }
}

fn classify_s3_error<E, R>(action: &str, error: &SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let kind = match error {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => StoreErrorKind::Connection,
        _ => match error.code() {
            Some("AccessDenied") | Some("403") => StoreErrorKind::AccessDenied,
            Some("NoSuchBucket") => StoreErrorKind::BucketNotFound,
            Some("InvalidBucketName") | Some("InvalidObjectName") => StoreErrorKind::InvalidName,
            Some("RequestTimeout") | Some("ServiceUnavailable") | Some("SlowDown") => {
                StoreErrorKind::ServiceUnavailable
            }
            _ => StoreErrorKind::Other,
        },
    };
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    StoreError::new(kind, format!("{action}: {message}"))
}

struct SageMakerInference {
    client: aws_sdk_sagemakerruntime::Client,
}

impl InferenceClient for SageMakerInference {
    fn submit_async(&self, request: &SubmitRequest) -> Result<SubmitAccepted, SubmitError> {
        let client = self.client.clone();
        let request = request.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let custom_attributes = json!({
                    "invocation_id": request.invocation_id,
                    "sequence_length": request.sequence_length,
                    "timestamp": request.submitted_at,
                })
                .to_string();

                let response = client
                    .invoke_endpoint_async()
                    .endpoint_name(&request.endpoint_name)
                    .content_type("application/json")
                    .accept("application/json")
                    .input_location(&request.input_location)
                    .invocation_timeout_seconds(INVOCATION_TIMEOUT_SECONDS)
                    .request_ttl_seconds(REQUEST_TTL_SECONDS)
                    .custom_attributes(custom_attributes)
                    .send()
                    .await
                    .map_err(classify_sagemaker_error)?;

                let inference_id = response
                    .inference_id()
                    .map(str::to_string)
                    .ok_or_else(|| {
                        SubmitError::new(
                            SubmitErrorKind::Other,
                            "SageMaker response missing inference id",
                        )
                    })?;
                Ok(SubmitAccepted {
                    inference_id,
                    output_location: response.output_location().map(str::to_string),
                })
            })
        })
    }
}

fn classify_sagemaker_error<E, R>(error: SdkError<E, R>) -> SubmitError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let kind = match &error {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => SubmitErrorKind::Connection,
        _ => match error.code() {
            Some("ValidationError") | Some("ValidationException") => SubmitErrorKind::Validation,
            Some("ModelError") => SubmitErrorKind::Model,
            Some("InternalFailure") | Some("InternalError") => SubmitErrorKind::Internal,
            Some("ServiceUnavailable") => SubmitErrorKind::Unavailable,
            _ => SubmitErrorKind::Other,
        },
    };
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    SubmitError::new(kind, message)
}

struct CloudWatchMetrics {
    client: aws_sdk_cloudwatch::Client,
    function_name: String,
}

impl MetricSink for CloudWatchMetrics {
    fn record(&self, name: &str, value: f64, unit: MetricUnit) {
        use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};

        let standard_unit = match unit {
            MetricUnit::Count => StandardUnit::Count,
            MetricUnit::Milliseconds => StandardUnit::Milliseconds,
            MetricUnit::Bytes => StandardUnit::Bytes,
        };
        let datum = MetricDatum::builder()
            .metric_name(name)
            .value(value)
            .unit(standard_unit)
            .dimensions(
                Dimension::builder()
                    .name("FunctionName")
                    .value(&self.function_name)
                    .build(),
            )
            .build();

        let client = self.client.clone();
        let outcome = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_metric_data()
                    .namespace("SageMaker/AsyncEndpoint")
                    .metric_data(datum)
                    .send()
                    .await
            })
        });

        // Metrics are best effort; a failed put must not fail the invocation.
        if let Err(error) = outcome {
            log_error(
                "telemetry",
                "metric_put_failed",
                json!({ "metric": name, "message": error.to_string() }),
            );
        }
    }
}

fn extract_tool_name(payload: &Value, context: &lambda_runtime::Context) -> Option<String> {
    if let Some(name) = payload.get("tool_name").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    context
        .client_context
        .as_ref()
        .and_then(|client_context| client_context.custom.get(CONTEXT_TOOL_NAME_KEY))
        .cloned()
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<ToolResponse, Error> {
    let (payload, context) = event.into_parts();
    let tool_name = extract_tool_name(&payload, &context);

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3ObjectStore {
        client: aws_sdk_s3::Client::new(&aws_config),
    };
    let inference = SageMakerInference {
        client: aws_sdk_sagemakerruntime::Client::new(&aws_config),
    };
    let metrics = CloudWatchMetrics {
        client: aws_sdk_cloudwatch::Client::new(&aws_config),
        function_name: std::env::var("AWS_LAMBDA_FUNCTION_NAME")
            .unwrap_or_else(|_| "unknown".to_string()),
    };
    let config = EndpointConfig::from_env();

    Ok(route_tool_call(
        tool_name.as_deref(),
        &payload,
        &config,
        &store,
        &inference,
        &metrics,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
