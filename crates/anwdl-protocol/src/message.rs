//! Request and response message shapes exchanged over both surfaces.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::verb::Verb;

/// A decoded client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The requested operation.
    pub verb: Verb,
    /// Verb-specific parameters (e.g. `container_uuid`, `client_token`).
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// A response to a request, sent back over whichever surface received it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
    /// Verb-specific result payload.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Machine-readable failure reason, present only when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Builds a canonical response. This is the only constructor: callers never
/// build a [`Response`] by hand, which keeps the `reason`/`success` pairing
/// consistent everywhere.
#[must_use]
pub fn make_response(
    success: bool,
    message: impl Into<String>,
    data: Map<String, Value>,
    reason: Option<String>,
) -> Response {
    Response {
        success,
        message: message.into(),
        data,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_omits_reason_on_serialize() {
        let resp = make_response(true, "ok", Map::new(), None);
        let json = serde_json::to_string(&resp).expect("serialize");
        assert!(!json.contains("reason"));
    }

    #[test]
    fn failure_response_carries_reason() {
        let resp = make_response(false, "denied", Map::new(), Some("capacity".to_string()));
        assert_eq!(resp.reason.as_deref(), Some("capacity"));
    }
}
