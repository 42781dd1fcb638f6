//! Model response handling: pull a JSON body out of whatever the model
//! returned and check it against the requested output shape.

use regex::Regex;

use super::AnalysisError;

/// Extracts the JSON body from a model reply.
///
/// Tries the raw text first, then the contents of a markdown code fence,
/// then a brace-balanced scan from the first `{` — models occasionally
/// wrap the body in prose despite being asked not to.
pub fn extract_json(content: &str) -> Result<serde_json::Value, AnalysisError> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = extract_fenced(trimmed) {
        if let Ok(value) = serde_json::from_str(fenced.trim()) {
            return Ok(value);
        }
    }

    let scanned = scan_object(trimmed);
    serde_json::from_str(&scanned).map_err(|e| {
        AnalysisError::MalformedJson(format!(
            "{} (response started with: {:.80})",
            e, trimmed
        ))
    })
}

/// Returns the contents of the first markdown code fence, if any.
fn extract_fenced(content: &str) -> Option<&str> {
    // The pattern is a literal and cannot fail to compile.
    let fence = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok()?;
    fence
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extracts a brace-balanced object starting at the first `{`, tracking
/// string boundaries and escape sequences.
fn scan_object(content: &str) -> String {
    let start = match content.find('{') {
        Some(idx) => idx,
        None => return content.to_string(),
    };

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = content.len();

    for (i, c) in content[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                depth += 1;
            }
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    content[start..end].to_string()
}

/// Validates the extracted body against the request's JSON Schema.
pub fn validate(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Result<(), AnalysisError> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| AnalysisError::SchemaViolation(format!("schema does not compile: {}", e)))?;

    if let Err(errors) = compiled.validate(instance) {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(AnalysisError::SchemaViolation(messages.join("; ")));
    }

    Ok(())
}
