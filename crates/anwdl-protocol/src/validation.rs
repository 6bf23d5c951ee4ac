//! Structural validation of decoded requests, independent of the transport
//! that received them.

use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::message::Request;
use crate::verb::Verb;

/// A single structural problem found in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required parameter was missing.
    MissingParameter(&'static str),
    /// A parameter was present but not of the expected shape.
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter(name) => write!(f, "missing parameter: {name}"),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter {name}: {reason}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates that `request` carries every parameter its verb requires, in
/// the expected shape. `Create` and `Stat` need no parameters; `Destroy`
/// needs `container_uuid` (a valid UUIDv4 string) and `client_token` (a
/// non-empty string).
pub fn verify_request_content(request: &Request) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if request.verb == Verb::Destroy {
        match request.parameters.get("container_uuid") {
            None => errors.push(ValidationError::MissingParameter("container_uuid")),
            Some(Value::String(s)) if Uuid::parse_str(s).is_ok() => {}
            Some(_) => errors.push(ValidationError::InvalidParameter {
                name: "container_uuid",
                reason: "must be a valid UUID string".to_string(),
            }),
        }

        match request.parameters.get("client_token") {
            None => errors.push(ValidationError::MissingParameter("client_token")),
            Some(Value::String(s)) if !s.is_empty() => {}
            Some(_) => errors.push(ValidationError::InvalidParameter {
                name: "client_token",
                reason: "must be a non-empty string".to_string(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn destroy_request(params: Map<String, Value>) -> Request {
        Request {
            verb: Verb::Destroy,
            parameters: params,
        }
    }

    #[test]
    fn create_request_needs_no_parameters() {
        let request = Request {
            verb: Verb::Create,
            parameters: Map::new(),
        };
        assert!(verify_request_content(&request).is_ok());
    }

    #[test]
    fn destroy_request_requires_uuid_and_token() {
        let request = destroy_request(Map::new());
        let errors = verify_request_content(&request).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn destroy_request_rejects_malformed_uuid() {
        let mut params = Map::new();
        params.insert("container_uuid".into(), Value::String("not-a-uuid".into()));
        params.insert("client_token".into(), Value::String("tok".into()));
        let request = destroy_request(params);
        let errors = verify_request_content(&request).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn destroy_request_accepts_valid_shape() {
        let mut params = Map::new();
        params.insert(
            "container_uuid".into(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        params.insert("client_token".into(), Value::String("tok".into()));
        let request = destroy_request(params);
        assert!(verify_request_content(&request).is_ok());
    }
}
