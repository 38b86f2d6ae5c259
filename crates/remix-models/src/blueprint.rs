//! Analysis blueprint data models.
//!
//! A blueprint is the structured stylistic analysis the model extracts from a
//! source video or image. Its inner schema is owned by the analysis prompt; the
//! server only guarantees that the top-level required fields are present.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Top-level fields every video blueprint must carry.
pub const VIDEO_REQUIRED_FIELDS: &[&str] = &[
    "meta",
    "hook_analysis",
    "retention_signals",
    "engagement_tactics",
];

/// Top-level fields every image blueprint must carry.
pub const IMAGE_REQUIRED_FIELDS: &[&str] = &["subjects", "setting", "style_elements"];

/// Which medium a blueprint was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlueprintKind {
    Video,
    Image,
}

impl BlueprintKind {
    /// Required top-level fields for this medium.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            BlueprintKind::Video => VIDEO_REQUIRED_FIELDS,
            BlueprintKind::Image => IMAGE_REQUIRED_FIELDS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlueprintKind::Video => "video",
            BlueprintKind::Image => "image",
        }
    }
}

/// Errors raised while validating a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintError {
    #[error("analysis is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("analysis must be a JSON object")]
    NotAnObject,

    #[error("analysis is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("analysis is empty")]
    Empty,
}

/// Structured stylistic analysis of a source video or image.
///
/// Held only by the client between the analyze and generate phases; the
/// server never stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisBlueprint(Map<String, Value>);

impl AnalysisBlueprint {
    /// Validate a model-produced value against the required fields of `kind`.
    pub fn from_model_value(kind: BlueprintKind, value: Value) -> Result<Self, BlueprintError> {
        let map = match value {
            Value::Object(map) => map,
            _ => return Err(BlueprintError::NotAnObject),
        };

        for field in kind.required_fields() {
            match map.get(*field) {
                Some(Value::Null) | None => return Err(BlueprintError::MissingField(field)),
                Some(_) => {}
            }
        }

        Ok(Self(map))
    }

    /// Parse model output text (already stripped of code fences).
    pub fn parse_model_output(kind: BlueprintKind, text: &str) -> Result<Self, BlueprintError> {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| BlueprintError::InvalidJson(e.to_string()))?;
        Self::from_model_value(kind, value)
    }

    /// Accept a blueprint resent by the client for the generate phase.
    ///
    /// Only the shape is checked: clients may legitimately prune fields.
    pub fn from_client_value(value: Value) -> Result<Self, BlueprintError> {
        match value {
            Value::Object(map) if map.is_empty() => Err(BlueprintError::Empty),
            Value::Object(map) => Ok(Self(map)),
            // Some clients send the blueprint as a JSON string.
            Value::String(s) => {
                let inner: Value = serde_json::from_str(&s)
                    .map_err(|e| BlueprintError::InvalidJson(e.to_string()))?;
                match inner {
                    Value::String(_) => Err(BlueprintError::NotAnObject),
                    other => Self::from_client_value(other),
                }
            }
            _ => Err(BlueprintError::NotAnObject),
        }
    }

    /// Pretty-printed JSON for prompt substitution.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Look up a string at a dotted path, e.g. `meta.primary_tone`.
    pub fn str_at(&self, path: &str) -> Option<&str> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = current.get(part)?;
        }
        current.as_str()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video_value() -> Value {
        json!({
            "meta": {"primary_tone": "Energetic"},
            "hook_analysis": {"technique": "question"},
            "retention_signals": [],
            "engagement_tactics": ["cta"]
        })
    }

    #[test]
    fn test_video_blueprint_accepts_required_fields() {
        let bp = AnalysisBlueprint::from_model_value(BlueprintKind::Video, video_value()).unwrap();
        assert_eq!(bp.str_at("meta.primary_tone"), Some("Energetic"));
        assert_eq!(bp.str_at("meta.missing"), None);
    }

    #[test]
    fn test_missing_field_is_reported() {
        let mut v = video_value();
        v.as_object_mut().unwrap().remove("retention_signals");
        let err = AnalysisBlueprint::from_model_value(BlueprintKind::Video, v).unwrap_err();
        assert_eq!(err, BlueprintError::MissingField("retention_signals"));
    }

    #[test]
    fn test_null_field_counts_as_missing() {
        let v = json!({"subjects": null, "setting": "beach", "style_elements": {}});
        let err = AnalysisBlueprint::from_model_value(BlueprintKind::Image, v).unwrap_err();
        assert_eq!(err, BlueprintError::MissingField("subjects"));
    }

    #[test]
    fn test_arrays_are_not_blueprints() {
        let err = AnalysisBlueprint::parse_model_output(BlueprintKind::Image, "[1, 2]").unwrap_err();
        assert_eq!(err, BlueprintError::NotAnObject);
    }

    #[test]
    fn test_client_value_accepts_stringified_json() {
        let s = Value::String(video_value().to_string());
        let bp = AnalysisBlueprint::from_client_value(s).unwrap();
        assert!(bp.fields().contains_key("meta"));
        assert_eq!(
            AnalysisBlueprint::from_client_value(json!({})).unwrap_err(),
            BlueprintError::Empty
        );
    }
}
