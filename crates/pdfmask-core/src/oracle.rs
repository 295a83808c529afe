//! Entity oracle interface
//!
//! The oracle reads the extracted document text and reports sensitive values
//! with synthetic replacements. Only its contract lives here; the client
//! that talks to a model is supplied by the caller.

use crate::config::MaskConfig;
use crate::error::MaskError;
use crate::record::{RawRecord, SensitiveRecord};
use serde_json::Value;
use tracing::warn;

/// Text handed to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    /// Page-marked text, already cut to the configured budget.
    pub text: String,
    pub text_truncated: bool,
    pub page_count: u32,
}

pub trait EntityOracle {
    /// Detect sensitive values in `request.text`.
    ///
    /// # Errors
    ///
    /// `MaskError::OracleUnavailable` when the detector cannot be reached,
    /// `MaskError::OracleMalformed` when its answer cannot be read.
    fn detect(&self, request: &OracleRequest) -> Result<Vec<SensitiveRecord>, MaskError>;
}

/// An oracle that always answers with the same records.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    records: Vec<SensitiveRecord>,
}

impl StaticOracle {
    pub fn new(records: Vec<SensitiveRecord>) -> Self {
        Self { records }
    }

    /// Build from a stored oracle answer (bare or chat-completion envelope).
    pub fn from_payload(payload: &str, config: &MaskConfig) -> Result<Self, MaskError> {
        Ok(Self::new(parse_oracle_payload(payload, config)?))
    }

    pub fn records(&self) -> &[SensitiveRecord] {
        &self.records
    }
}

impl EntityOracle for StaticOracle {
    fn detect(&self, _request: &OracleRequest) -> Result<Vec<SensitiveRecord>, MaskError> {
        Ok(self.records.clone())
    }
}

/// Parse an oracle answer into records.
///
/// Accepts `{"sensitive_elements": [...]}` or a chat-completion response
/// whose `choices[0].message.content` holds that object as a JSON string.
/// A missing `sensitive_elements` key means no findings; entries that are
/// not objects are skipped.
pub fn parse_oracle_payload(
    payload: &str,
    config: &MaskConfig,
) -> Result<Vec<SensitiveRecord>, MaskError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| MaskError::OracleMalformed(format!("invalid JSON: {e}")))?;
    let body = match value.get("choices") {
        Some(choices) => {
            let content = choices
                .get(0)
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    MaskError::OracleMalformed("missing choices[0].message.content".to_string())
                })?;
            serde_json::from_str(content)
                .map_err(|e| MaskError::OracleMalformed(format!("invalid message content: {e}")))?
        }
        None => value,
    };
    if !body.is_object() {
        return Err(MaskError::OracleMalformed(
            "expected a JSON object".to_string(),
        ));
    }

    let elements = match body.get("sensitive_elements") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(MaskError::OracleMalformed(
                "sensitive_elements is not an array".to_string(),
            ))
        }
    };

    let mut records = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match serde_json::from_value::<RawRecord>(element.clone()) {
            Ok(raw) if element.is_object() => records.push(raw.into_record(config)),
            _ => warn!(index, "Skipping oracle entry that is not an object"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_payload() {
        let payload = r#"{"sensitive_elements":[
            {"type":"IBAN","value":"FR76","replacement":"FR00","page":2,"confidence":0.95}
        ],"summary":{"total_sensitive_elements":1}}"#;
        let records = parse_oracle_payload(payload, &MaskConfig::default()).unwrap();
        assert_eq!(
            records,
            vec![SensitiveRecord::new("IBAN", "FR76", "FR00", 2).with_confidence(0.95)]
        );
    }

    #[test]
    fn test_chat_envelope() {
        let inner = r#"{"sensitive_elements":[{"type":"Person Name","value":"John Doe","replacement":"Jane Smith","page":1}]}"#;
        let payload = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": inner}}]
        })
        .to_string();
        let records = parse_oracle_payload(&payload, &MaskConfig::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original_value, "John Doe");
        assert_eq!(records[0].confidence, 0.0);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let payload = r#"{"sensitive_elements":[{"value":"secret"}, 42]}"#;
        let records = parse_oracle_payload(payload, &MaskConfig::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, "Unknown");
        assert_eq!(records[0].replacement_value, "XXXXX");
        assert_eq!(records[0].page, 1);
    }

    #[test]
    fn test_malformed_payloads() {
        let config = MaskConfig::default();
        for payload in [
            "not json",
            "[1, 2]",
            r#"{"choices": []}"#,
            r#"{"choices": [{"message": {"content": "{oops"}}]}"#,
            r#"{"sensitive_elements": "none"}"#,
        ] {
            let err = parse_oracle_payload(payload, &config).unwrap_err();
            assert!(err.is_oracle_error(), "{payload}");
        }
    }

    #[test]
    fn test_static_oracle_answers_its_records() {
        let oracle = StaticOracle::new(vec![SensitiveRecord::new("IBAN", "FR76", "FR00", 1)]);
        let request = OracleRequest {
            text: String::new(),
            text_truncated: false,
            page_count: 1,
        };
        assert_eq!(oracle.detect(&request).unwrap().len(), 1);
    }
}
