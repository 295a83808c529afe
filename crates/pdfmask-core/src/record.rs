//! Records exchanged between the oracle, the locator and the compositor

use crate::config::MaskConfig;
use crate::geometry::{Color, Rect};
use serde::{Deserialize, Serialize};

/// A sensitive value reported by the entity oracle.
///
/// Field names on the wire follow the oracle's JSON (`type`, `value`,
/// `replacement`, `page`, `confidence`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensitiveRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(rename = "value")]
    pub original_value: String,
    #[serde(rename = "replacement")]
    pub replacement_value: String,
    /// 1-indexed; anything outside `[1, page_count]` is skipped.
    pub page: i64,
    pub confidence: f32,
}

impl SensitiveRecord {
    pub fn new(
        record_type: impl Into<String>,
        original_value: impl Into<String>,
        replacement_value: impl Into<String>,
        page: i64,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            original_value: original_value.into(),
            replacement_value: replacement_value.into(),
            page,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    /// Page as a 1-indexed page number when it exists in a document of
    /// `page_count` pages.
    pub fn page_in(&self, page_count: u32) -> Option<u32> {
        if self.page >= 1 && self.page <= page_count as i64 {
            Some(self.page as u32)
        } else {
            None
        }
    }
}

/// Loosely-typed record as the oracle sends it. Missing or mistyped fields
/// are tolerated here and defaulted by [`RawRecord::into_record`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default, rename = "type")]
    pub record_type: Option<serde_json::Value>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub replacement: Option<serde_json::Value>,
    #[serde(default)]
    pub page: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<serde_json::Value>,
}

impl RawRecord {
    pub fn into_record(self, config: &MaskConfig) -> SensitiveRecord {
        let record_type = text_field(self.record_type)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| config.default_record_type.clone());
        let original_value = text_field(self.value).unwrap_or_default();
        let replacement_value = text_field(self.replacement)
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| config.placeholder_replacement.clone());
        let page = self.page.as_ref().and_then(integer_field).unwrap_or(1);
        let confidence = self
            .confidence
            .as_ref()
            .and_then(float_field)
            .map(clamp_confidence)
            .unwrap_or(0.0);

        SensitiveRecord {
            record_type,
            original_value,
            replacement_value,
            page,
            confidence,
        }
    }
}

fn text_field(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn integer_field(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_field(value: &serde_json::Value) -> Option<f32> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(|f| f as f32),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Rendering style recovered for a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Style {
    /// Family name with any subset prefix removed, e.g. `Helvetica-Bold`.
    pub font_family: String,
    /// Size after scale correction.
    pub font_size: f32,
    pub color: Color,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font_family: "Helvetica".to_string(),
            font_size: 10.0,
            color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StyleSource {
    Matched,
    Default,
}

/// One visual location of a searched string, ready for compositing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedOccurrence {
    pub page: u32,
    pub rect: Rect,
    pub searched_text: String,
    pub replacement_text: String,
    pub record_type: String,
    pub style: Style,
    pub style_source: StyleSource,
}

/// A reported value that is not present verbatim on its declared page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotFoundRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    pub page: u32,
    pub replacement: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raw_record_defaults() {
        let raw: RawRecord = serde_json::from_str(r#"{"value": "John Doe"}"#).unwrap();
        let record = raw.into_record(&MaskConfig::default());
        assert_eq!(
            record,
            SensitiveRecord {
                record_type: "Unknown".to_string(),
                original_value: "John Doe".to_string(),
                replacement_value: "XXXXX".to_string(),
                page: 1,
                confidence: 0.0,
            }
        );
    }

    #[test]
    fn test_raw_record_tolerates_string_numbers() {
        let raw: RawRecord = serde_json::from_str(
            r#"{"type": "IBAN", "value": "FR76", "replacement": "", "page": "3", "confidence": 1.7}"#,
        )
        .unwrap();
        let record = raw.into_record(&MaskConfig::default());
        assert_eq!(record.page, 3);
        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.replacement_value, "XXXXX");
    }

    #[test]
    fn test_page_in_range() {
        let record = SensitiveRecord::new("Person Name", "A", "B", 3);
        assert_eq!(record.page_in(3), Some(3));
        assert_eq!(record.page_in(2), None);
        assert_eq!(SensitiveRecord::new("x", "a", "b", 0).page_in(5), None);
        assert_eq!(SensitiveRecord::new("x", "a", "b", -2).page_in(5), None);
    }

    #[test]
    fn test_record_wire_names() {
        let record = SensitiveRecord::new("Email", "a@b.c", "x@y.z", 1);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "Email");
        assert_eq!(json["value"], "a@b.c");
        assert_eq!(json["replacement"], "x@y.z");
    }
}
