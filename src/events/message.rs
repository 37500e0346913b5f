//! Control-stream messages
//!
//! Payloads arrive as JSON objects `{"name": ..., "value": ..., "loop_ts": ...}`.
//! They are classified once into a closed [`MessageKind`] so that the trial
//! state machine matches exhaustively instead of dispatching on strings.

use crate::error::{Result, StreamLogError};
use serde_json::Value;

/// Message name carrying the current file name
pub const FILENAME: &str = "filename";
/// Message name carrying the acquisition state
pub const STATE: &str = "state";
/// Message name carrying a parameter change
pub const PARAMETER: &str = "parameter";

/// Classified message body
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// New current file name (`null` clears it)
    Filename(Option<String>),
    /// Acquisition state
    State(String),
    /// Parameter change with its value
    Parameter(Value),
    /// Any other message name
    Unknown { name: String, value: Value },
}

impl MessageKind {
    /// Name of the per-type table this message belongs to
    pub fn table(&self) -> &'static str {
        match self {
            MessageKind::Filename(_) => FILENAME,
            MessageKind::State(_) => STATE,
            MessageKind::Parameter(_) => PARAMETER,
            MessageKind::Unknown { .. } => "other",
        }
    }
}

/// One decoded control message
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    /// Stream-clock timestamp assigned by the transport
    pub timestamp: f64,
    /// Sender's loop timestamp, when provided
    pub loop_timestamp: Option<f64>,
    /// Message name as sent
    pub name: String,
    /// Classified body
    pub kind: MessageKind,
    /// The message as received
    pub raw: Value,
}

impl EventMessage {
    /// Decode a JSON payload
    ///
    /// Fails with [`StreamLogError::MalformedMessage`] when the payload is not
    /// a JSON object with a string `name`.
    pub fn decode(payload: &str, timestamp: f64) -> Result<Self> {
        let raw: Value = serde_json::from_str(payload).map_err(|e| {
            StreamLogError::MalformedMessage(format!("{} in {:?}", e, truncate(payload)))
        })?;
        Self::from_value(raw, timestamp)
    }

    /// Classify an already parsed payload
    pub fn from_value(raw: Value, timestamp: f64) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            StreamLogError::MalformedMessage(format!("payload is not an object: {}", raw))
        })?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StreamLogError::MalformedMessage(format!("payload has no string name: {}", raw))
            })?
            .to_string();
        let value = object.get("value").cloned().unwrap_or(Value::Null);
        let loop_timestamp = object.get("loop_ts").and_then(Value::as_f64);

        let kind = match name.as_str() {
            FILENAME => MessageKind::Filename(match &value {
                Value::Null => None,
                other => Some(value_text(other)),
            }),
            STATE => MessageKind::State(value_text(&value)),
            PARAMETER => MessageKind::Parameter(value),
            _ => MessageKind::Unknown {
                name: name.clone(),
                value,
            },
        };

        Ok(Self {
            timestamp,
            loop_timestamp,
            name,
            kind,
            raw,
        })
    }

    /// The `value` field rendered as table text
    pub fn value_text(&self) -> String {
        match &self.kind {
            MessageKind::Filename(name) => name.clone().unwrap_or_default(),
            MessageKind::State(state) => state.clone(),
            MessageKind::Parameter(value) | MessageKind::Unknown { value, .. } => {
                value_text(value)
            }
        }
    }

    /// The message re-serialized as compact JSON
    pub fn encoded(&self) -> String {
        self.raw.to_string()
    }
}

/// Strings as-is, everything else as JSON text
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate(payload: &str) -> String {
    const MAX: usize = 120;
    if payload.len() <= MAX {
        return payload.to_string();
    }
    let mut end = MAX;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &payload[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_known_names() {
        let msg = EventMessage::decode(r#"{"name":"state","value":"rec","loop_ts":3.5}"#, 1.0)
            .unwrap();
        assert_eq!(msg.kind, MessageKind::State("rec".to_string()));
        assert_eq!(msg.loop_timestamp, Some(3.5));

        let msg = EventMessage::decode(r#"{"name":"filename","value":"run01"}"#, 1.0).unwrap();
        assert_eq!(msg.kind, MessageKind::Filename(Some("run01".to_string())));

        let msg = EventMessage::decode(r#"{"name":"parameter","value":{"amp":2}}"#, 1.0).unwrap();
        assert_eq!(msg.kind, MessageKind::Parameter(json!({"amp": 2})));
        assert_eq!(msg.value_text(), r#"{"amp":2}"#);
    }

    #[test]
    fn test_unknown_name() {
        let msg = EventMessage::decode(r#"{"name":"note","value":"hello"}"#, 0.0).unwrap();
        assert_eq!(msg.kind.table(), "other");
        assert!(matches!(msg.kind, MessageKind::Unknown { ref name, .. } if name == "note"));
    }

    #[test]
    fn test_non_string_state_rendered_as_json() {
        let msg = EventMessage::decode(r#"{"name":"state","value":3}"#, 0.0).unwrap();
        assert_eq!(msg.kind, MessageKind::State("3".to_string()));
    }

    #[test]
    fn test_null_filename_clears() {
        let msg = EventMessage::decode(r#"{"name":"filename","value":null}"#, 0.0).unwrap();
        assert_eq!(msg.kind, MessageKind::Filename(None));
    }

    #[test]
    fn test_malformed_payloads() {
        for payload in ["not json", "[1,2]", r#"{"value":1}"#, r#"{"name":5}"#] {
            let err = EventMessage::decode(payload, 0.0).unwrap_err();
            assert!(
                matches!(err, StreamLogError::MalformedMessage(_)),
                "{} should be malformed",
                payload
            );
        }
    }

    #[test]
    fn test_encoded_roundtrips_original() {
        let payload = r#"{"name":"parameter","value":{"freq":20}}"#;
        let msg = EventMessage::decode(payload, 0.0).unwrap();
        let back: Value = serde_json::from_str(&msg.encoded()).unwrap();
        assert_eq!(back, msg.raw);
    }
}
