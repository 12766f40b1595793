//! Request and reply envelopes for the dispatcher channel

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request envelope: `{command, params}`
///
/// Constructed by the caller, consumed exactly once by the receiving handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Command name
    pub command: String,

    /// Command parameters; an absent mapping decodes as empty
    #[serde(default)]
    pub params: Value,
}

impl Envelope {
    /// Create an envelope with parameters
    pub fn new(command: impl Into<String>, params: Value) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }

    /// Create an envelope with no parameters
    pub fn bare(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: Value::Object(Default::default()),
        }
    }
}

/// Reply envelope: `{data, status_code}`
///
/// `status_code` is HTTP-analogous; transport-level success with a semantic
/// failure still produces a well-formed reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    /// Handler output
    pub data: Value,

    /// HTTP-analogous status code
    pub status_code: u16,
}

impl ReplyEnvelope {
    /// Create a reply
    pub fn new(data: Value, status_code: u16) -> Self {
        Self { data, status_code }
    }

    /// 200 reply
    pub fn ok(data: Value) -> Self {
        Self::new(data, 200)
    }

    /// Error reply with a human-readable message
    pub fn error(message: impl Into<String>, status_code: u16) -> Self {
        Self::new(serde_json::json!({ "error": message.into() }), status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization() {
        let env = Envelope::new("create", serde_json::json!({"collection_name": "Tenders"}));
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"command\":\"create\""));
        assert!(json.contains("\"collection_name\":\"Tenders\""));
    }

    #[test]
    fn test_envelope_missing_params_defaults() {
        let env: Envelope = serde_json::from_str(r#"{"command":"status"}"#).unwrap();
        assert_eq!(env.command, "status");
        assert!(env.params.is_null());
    }

    #[test]
    fn test_envelope_missing_command_rejected() {
        let result: Result<Envelope, _> = serde_json::from_str(r#"{"params":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_reply_roundtrip() {
        let reply = ReplyEnvelope::ok(serde_json::json!({"message": "Server is online!"}));
        let json = serde_json::to_string(&reply).unwrap();
        let parsed: ReplyEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status_code, 200);
        assert_eq!(parsed.data["message"], "Server is online!");
    }

    #[test]
    fn test_error_reply() {
        let reply = ReplyEnvelope::error("Unknown command \"bogus\"", 400);
        assert_eq!(reply.status_code, 400);
        assert_eq!(reply.data["error"], "Unknown command \"bogus\"");
    }
}
