//! Object-key construction for the async-inference request/poll cycle.
//!
//! The same output identifier must always map to one input key, one success
//! key, and one failure key; the results handler depends on that determinism.

pub fn input_object_key(input_prefix: &str, output_id: &str) -> String {
    format!("{}/{output_id}.json", input_prefix.trim_end_matches('/'))
}

pub fn output_object_key(output_prefix: &str, output_id: &str) -> String {
    format!("{}/{output_id}.out", output_prefix.trim_end_matches('/'))
}

pub fn failure_object_key(failure_prefix: &str, output_id: &str) -> String {
    format!("{}/{output_id}.out", failure_prefix.trim_end_matches('/'))
}

pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// A caller-supplied output reference, normalized to a canonical identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputReference {
    /// Bare identifier; bucket and key come from configuration.
    Id(String),
    /// Full `s3://bucket/key` path; overrides the configured output location.
    Path {
        bucket: String,
        key: String,
        output_id: String,
    },
}

impl OutputReference {
    pub fn output_id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Path { output_id, .. } => output_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceError {
    message: String,
}

impl ReferenceError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ReferenceError {}

/// Accepts either a bare output id or a full `s3://bucket/key` path and
/// normalizes both to the same canonical identifier.
pub fn parse_output_reference(raw: &str) -> Result<OutputReference, ReferenceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReferenceError::new("Output identifier cannot be empty"));
    }

    let Some(remainder) = trimmed.strip_prefix("s3://") else {
        return Ok(OutputReference::Id(trimmed.to_string()));
    };

    let Some((bucket, key)) = remainder.split_once('/') else {
        return Err(ReferenceError::new(
            "Invalid S3 path format. Expected: s3://bucket/key",
        ));
    };
    if bucket.is_empty() || key.is_empty() {
        return Err(ReferenceError::new(
            "Invalid S3 path format. Expected: s3://bucket/key",
        ));
    }

    let file_name = key.rsplit('/').next().unwrap_or(key);
    let output_id = file_name.strip_suffix(".out").unwrap_or(file_name);
    if output_id.is_empty() {
        return Err(ReferenceError::new(
            "Could not extract an output identifier from the S3 path",
        ));
    }

    Ok(OutputReference::Path {
        bucket: bucket.to_string(),
        key: key.to_string(),
        output_id: output_id.to_string(),
    })
}
