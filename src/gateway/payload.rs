//! Normalisation of raw gateway tool output
//!
//! Gateway targets are usually HTTP-style functions answering with
//! `{"statusCode": .., "body": ..}` where `body` is often a JSON string.
//! Anything else is wrapped so callers always get a status and an object body.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Output of a gateway tool in a predictable shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPayload {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Value,
}

impl ToolPayload {
    /// Parse raw tool text
    ///
    /// - a JSON object with `statusCode` keeps its status; a string body that
    ///   decodes to a JSON object is replaced by that object
    /// - any other JSON object becomes the body of a 200
    /// - anything else is kept verbatim under `_text`
    pub fn normalize(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(mut envelope)) if envelope.contains_key("statusCode") => {
                let status_code = envelope
                    .get("statusCode")
                    .and_then(Value::as_u64)
                    .and_then(|code| u16::try_from(code).ok())
                    .unwrap_or(200);

                let body = match envelope.remove("body") {
                    Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
                        Ok(decoded @ Value::Object(_)) => decoded,
                        _ => Value::String(text),
                    },
                    Some(other) => other,
                    None => Value::Object(Map::new()),
                };

                Self { status_code, body }
            }
            Ok(body @ Value::Object(_)) => Self {
                status_code: 200,
                body,
            },
            _ => Self {
                status_code: 200,
                body: json!({ "_text": raw }),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The plain text body, when the tool answered with text only
    pub fn text(&self) -> Option<&str> {
        self.body.get("_text").and_then(Value::as_str)
    }
}
