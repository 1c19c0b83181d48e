use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::Utc;
use serde_json::{json, Value};
use vep_endpoint_core::contract::{
    resolve_tool_name, ErrorCode, Tool, ToolError, ToolResponse,
};

use crate::adapters::inference::InferenceClient;
use crate::adapters::object_store::ObjectStore;
use crate::config::EndpointConfig;
use crate::handlers::invoke::handle_invoke_endpoint;
use crate::handlers::results::handle_get_results;
use crate::telemetry::{log_error, log_event, GuardedMetrics, MetricSink};

const COMPONENT: &str = "router";

/// Dispatches one tool invocation and converts the outcome into the uniform
/// envelope. Every execution path returns the envelope; panics inside a
/// handler are contained here rather than escaping the function boundary.
pub fn route_tool_call(
    tool_name: Option<&str>,
    event: &Value,
    config: &EndpointConfig,
    store: &dyn ObjectStore,
    inference: &dyn InferenceClient,
    metrics: &dyn MetricSink,
) -> ToolResponse {
    let started_at = Utc::now();
    // Telemetry is observational; a broken sink must not change the outcome.
    let guarded = GuardedMetrics::new(metrics);
    let metrics: &dyn MetricSink = &guarded;
    log_event(
        COMPONENT,
        "tool_request_received",
        json!({ "tool_name": tool_name }),
    );

    let resolved = tool_name
        .map(resolve_tool_name)
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let Some(name) = resolved else {
        metrics.count("InvocationError");
        return ToolResponse::failure(ToolError::new(
            ErrorCode::MissingToolName,
            "Tool name not found in invocation context.",
        ));
    };

    let Some(tool) = Tool::parse(name) else {
        metrics.count("InvocationError");
        return ToolResponse::failure(ToolError::new(
            ErrorCode::UnknownTool,
            format!(
                "Unknown tool: {name}. Supported tools are: {}, {}",
                Tool::InvokeEndpoint.as_str(),
                Tool::GetResults.as_str(),
            ),
        ));
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| match tool {
        Tool::InvokeEndpoint => handle_invoke_endpoint(event, config, store, inference, metrics),
        Tool::GetResults => handle_get_results(event, config, store, metrics),
    }));
    let result = outcome.unwrap_or_else(|panic| {
        let message = panic_message(panic.as_ref());
        log_error(
            COMPONENT,
            "handler_panicked",
            json!({ "tool": tool.as_str(), "message": message }),
        );
        Err(ToolError::new(
            ErrorCode::HandlerError,
            format!("Unexpected error occurred: {message}"),
        ))
    });

    let duration_ms = (Utc::now() - started_at).num_milliseconds();
    metrics.millis("Duration", duration_ms as f64);

    let response = ToolResponse::from_result(result);
    if response.success {
        metrics.count("InvocationSuccess");
    } else {
        metrics.count("InvocationError");
    }
    response
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked".to_string()
    }
}
