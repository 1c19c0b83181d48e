use serde_json::{json, Value};

use crate::contract::{ErrorCode, ToolError, MAX_SEQUENCE_LENGTH, VALID_AMINO_ACIDS};

/// Accumulated reasons why an input was rejected. `invalid_characters` is
/// populated only for alphabet violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub errors: Vec<String>,
    pub invalid_characters: Vec<char>,
}

impl ValidationFailure {
    fn new(errors: Vec<String>) -> Self {
        Self {
            errors,
            invalid_characters: Vec::new(),
        }
    }

    /// Shapes the failure into the envelope error for the given code, so the
    /// caller can distinguish malformed requests from invalid sequences.
    pub fn into_tool_error(self, code: ErrorCode) -> ToolError {
        let mut details = json!({ "errors": self.errors });
        if !self.invalid_characters.is_empty() {
            details["invalid_characters"] = Value::from(
                self.invalid_characters
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>(),
            );
        }
        ToolError::with_details(code, "Input validation failed", details)
    }
}

/// Validates an amino-acid sequence and returns the cleaned (trimmed,
/// uppercased) form on success.
pub fn validate_amino_acid_sequence(raw: &str) -> Result<String, ValidationFailure> {
    if raw.is_empty() {
        return Err(ValidationFailure::new(vec![
            "Amino acid sequence cannot be empty".to_string(),
        ]));
    }

    let cleaned: String = raw.trim().to_uppercase();
    let mut errors = Vec::new();

    if cleaned.is_empty() {
        errors.push("Amino acid sequence must contain at least 1 amino acid".to_string());
    }
    if cleaned.chars().count() > MAX_SEQUENCE_LENGTH {
        errors.push(format!(
            "Amino acid sequence too long (maximum {MAX_SEQUENCE_LENGTH} characters)"
        ));
    }

    let mut invalid_characters: Vec<char> = cleaned
        .chars()
        .filter(|c| !VALID_AMINO_ACIDS.contains(*c))
        .collect();
    invalid_characters.sort_unstable();
    invalid_characters.dedup();

    if !invalid_characters.is_empty() {
        let offending: Vec<String> = invalid_characters.iter().map(|c| c.to_string()).collect();
        errors.push(format!(
            "Invalid amino acid characters found: {}. Only standard 20 amino acids are allowed: {}",
            offending.join(", "),
            VALID_AMINO_ACIDS
                .chars()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ));
    }

    if errors.is_empty() {
        Ok(cleaned)
    } else {
        Err(ValidationFailure {
            errors,
            invalid_characters,
        })
    }
}

/// Confirms the event payload is an object carrying every required field as a
/// non-empty string-compatible value.
pub fn validate_event_structure(
    event: &Value,
    required_fields: &[&str],
) -> Result<(), ValidationFailure> {
    let Some(object) = event.as_object() else {
        return Err(ValidationFailure::new(vec![
            "Event must be a JSON object".to_string(),
        ]));
    };

    let mut errors = Vec::new();
    for field in required_fields {
        match object.get(*field) {
            None => errors.push(format!("Missing required field: '{field}'")),
            Some(Value::Null) => errors.push(format!("Required field '{field}' cannot be null")),
            Some(Value::String(text)) if text.trim().is_empty() => {
                errors.push(format!("Required field '{field}' cannot be empty"));
            }
            Some(Value::String(_)) => {}
            Some(_) => errors.push(format!("Required field '{field}' must be a string")),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure::new(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_sequences() {
        let cleaned = validate_amino_acid_sequence("MKTVRQERLK").expect("sequence should pass");
        assert_eq!(cleaned, "MKTVRQERLK");
    }

    #[test]
    fn cleans_whitespace_and_case_before_validating() {
        let cleaned = validate_amino_acid_sequence("  mktvrq  ").expect("sequence should pass");
        assert_eq!(cleaned, "MKTVRQ");
    }

    #[test]
    fn rejects_empty_sequence() {
        let failure = validate_amino_acid_sequence("").expect_err("sequence should fail");
        assert_eq!(failure.errors, vec!["Amino acid sequence cannot be empty"]);
        assert!(failure.invalid_characters.is_empty());
    }

    #[test]
    fn rejects_whitespace_only_sequence() {
        let failure = validate_amino_acid_sequence("   ").expect_err("sequence should fail");
        assert_eq!(
            failure.errors,
            vec!["Amino acid sequence must contain at least 1 amino acid"]
        );
    }

    #[test]
    fn rejects_sequence_over_maximum_length() {
        let sequence = "A".repeat(MAX_SEQUENCE_LENGTH + 1);
        let failure = validate_amino_acid_sequence(&sequence).expect_err("sequence should fail");
        assert_eq!(
            failure.errors,
            vec!["Amino acid sequence too long (maximum 10000 characters)"]
        );
    }

    #[test]
    fn accepts_sequence_at_maximum_length() {
        let sequence = "ACDEFGHIKL".repeat(MAX_SEQUENCE_LENGTH / 10);
        assert_eq!(sequence.len(), MAX_SEQUENCE_LENGTH);
        assert!(validate_amino_acid_sequence(&sequence).is_ok());
    }

    #[test]
    fn lists_offending_characters_deduplicated_and_sorted() {
        let failure =
            validate_amino_acid_sequence("MKTVRQERLKXBZXB").expect_err("sequence should fail");
        assert_eq!(failure.invalid_characters, vec!['B', 'X', 'Z']);
        assert!(failure.errors[0].starts_with("Invalid amino acid characters found: B, X, Z"));
    }

    #[test]
    fn rejects_digits_and_punctuation_as_invalid_characters() {
        let failure = validate_amino_acid_sequence("MKT1V.R").expect_err("sequence should fail");
        assert_eq!(failure.invalid_characters, vec!['.', '1']);
    }

    #[test]
    fn validation_failure_details_expose_invalid_characters() {
        let failure = validate_amino_acid_sequence("MKXBZ").expect_err("sequence should fail");
        let error = failure.into_tool_error(ErrorCode::InvalidSequence);
        assert_eq!(error.code, ErrorCode::InvalidSequence);
        let details = error.details.expect("details should be present");
        assert_eq!(
            details["invalid_characters"],
            serde_json::json!(["B", "X", "Z"])
        );
    }

    #[test]
    fn event_validation_requires_object_payload() {
        let failure = validate_event_structure(&serde_json::json!("sequence"), &["sequence"])
            .expect_err("event should fail");
        assert_eq!(failure.errors, vec!["Event must be a JSON object"]);
    }

    #[test]
    fn event_validation_reports_missing_null_and_empty_fields() {
        let failure = validate_event_structure(&serde_json::json!({}), &["sequence"])
            .expect_err("event should fail");
        assert_eq!(failure.errors, vec!["Missing required field: 'sequence'"]);

        let failure =
            validate_event_structure(&serde_json::json!({"output_id": null}), &["output_id"])
                .expect_err("event should fail");
        assert_eq!(
            failure.errors,
            vec!["Required field 'output_id' cannot be null"]
        );

        let failure =
            validate_event_structure(&serde_json::json!({"output_id": "  "}), &["output_id"])
                .expect_err("event should fail");
        assert_eq!(
            failure.errors,
            vec!["Required field 'output_id' cannot be empty"]
        );
    }

    #[test]
    fn event_validation_rejects_non_string_fields() {
        let failure = validate_event_structure(&serde_json::json!({"sequence": 42}), &["sequence"])
            .expect_err("event should fail");
        assert_eq!(
            failure.errors,
            vec!["Required field 'sequence' must be a string"]
        );
    }

    #[test]
    fn event_validation_passes_with_all_fields_present() {
        let event = serde_json::json!({"sequence": "MKTV"});
        assert!(validate_event_structure(&event, &["sequence"]).is_ok());
    }
}
