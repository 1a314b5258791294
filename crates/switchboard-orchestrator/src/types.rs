//! Adapter call results.

use rmcp::model::{self as rmcp_model, RawContent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result of a successful capability call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    /// Adapter that served the call.
    pub service: String,
    /// Content blocks returned by the adapter.
    pub content: Vec<ContentBlock>,
    /// Structured result, when the adapter provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    /// Whether the adapter flagged the result as an error.
    #[serde(default)]
    pub is_error: bool,
}

impl AdapterResponse {
    /// A successful response carrying one text block.
    #[must_use]
    pub fn text(service: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            content: vec![ContentBlock::Text { text: text.into() }],
            structured: None,
            is_error: false,
        }
    }

    /// A successful response carrying a structured value.
    #[must_use]
    pub fn json(service: impl Into<String>, value: Value) -> Self {
        Self {
            service: service.into(),
            content: vec![ContentBlock::Text {
                text: value.to_string(),
            }],
            structured: Some(value),
            is_error: false,
        }
    }

    /// An error-flagged response.
    #[must_use]
    pub fn error(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(service, message)
        }
    }

    /// All text blocks joined by newlines.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build from an rmcp tool result.
    #[must_use]
    pub fn from_rmcp(service: &str, result: rmcp_model::CallToolResult) -> Self {
        Self {
            service: service.to_string(),
            content: result.content.iter().map(ContentBlock::from_rmcp).collect(),
            structured: result.structured_content,
            is_error: result.is_error.unwrap_or(false),
        }
    }
}

/// One block of adapter output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text.
    Text {
        /// The text.
        text: String,
    },
    /// Base64 image.
    Image {
        /// Base64 data.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// Embedded resource.
    Resource {
        /// Resource URI.
        uri: String,
        /// Text or base64 payload.
        data: Option<String>,
        /// MIME type.
        mime_type: Option<String>,
    },
    /// Anything this crate does not model.
    Other,
}

impl ContentBlock {
    fn from_rmcp(content: &rmcp_model::Content) -> Self {
        match &**content {
            RawContent::Text(text) => Self::Text {
                text: text.text.clone(),
            },
            RawContent::Image(image) => Self::Image {
                data: image.data.clone(),
                mime_type: image.mime_type.clone(),
            },
            RawContent::Resource(embedded) => match &embedded.resource {
                rmcp_model::ResourceContents::TextResourceContents {
                    uri,
                    mime_type,
                    text,
                    ..
                } => Self::Resource {
                    uri: uri.clone(),
                    data: Some(text.clone()),
                    mime_type: mime_type.clone(),
                },
                rmcp_model::ResourceContents::BlobResourceContents {
                    uri,
                    mime_type,
                    blob,
                    ..
                } => Self::Resource {
                    uri: uri.clone(),
                    data: Some(blob.clone()),
                    mime_type: mime_type.clone(),
                },
            },
            _ => Self::Other,
        }
    }
}

/// Turn call params into MCP tool arguments.
///
/// Objects pass through, `null` means no arguments, and any other value is
/// wrapped as `{"value": ...}`.
#[must_use]
pub fn tool_arguments(params: Value) -> Option<serde_json::Map<String, Value>> {
    match params {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            Some(map)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_content_skips_non_text() {
        let response = AdapterResponse {
            service: "fetch".into(),
            content: vec![
                ContentBlock::Text { text: "a".into() },
                ContentBlock::Other,
                ContentBlock::Text { text: "b".into() },
            ],
            structured: None,
            is_error: false,
        };
        assert_eq!(response.text_content(), "a\nb");
    }

    #[test]
    fn error_response_is_flagged() {
        let response = AdapterResponse::error("postgres", "relation does not exist");
        assert!(response.is_error);
        assert_eq!(response.text_content(), "relation does not exist");
    }

    #[test]
    fn from_rmcp_keeps_structured_content() {
        let result = rmcp_model::CallToolResult::structured(json!({"rows": 3}));
        let response = AdapterResponse::from_rmcp("postgres", result);

        assert_eq!(response.service, "postgres");
        assert_eq!(response.structured, Some(json!({"rows": 3})));
        assert!(!response.is_error);
    }

    #[test]
    fn arguments_wrapping() {
        assert_eq!(tool_arguments(Value::Null), None);
        assert_eq!(
            tool_arguments(json!({"k": 1})).unwrap().get("k"),
            Some(&json!(1))
        );
        assert_eq!(
            tool_arguments(json!("https://example.com"))
                .unwrap()
                .get("value"),
            Some(&json!("https://example.com"))
        );
    }
}
