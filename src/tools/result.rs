//! The outcome of one tool call.

use serde_json::{json, Value};

use crate::error::{ErrorKind, ToolError};

/// Outcome status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The call succeeded; the payload may still be an empty collection.
    Ok,
    /// The call failed.
    Error,
}

/// Exactly one of these is produced per tool request.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// A formatted payload.
    Ok(Value),
    /// A failure with a stable kind tag.
    Error(ToolError),
}

impl ToolResult {
    /// Returns the status of this result.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Ok(_) => Status::Ok,
            Self::Error(_) => Status::Error,
        }
    }

    /// Returns the payload of a successful result.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Ok(payload) => Some(payload),
            Self::Error(_) => None,
        }
    }

    /// Returns the error of a failed result.
    #[must_use]
    pub const fn error(&self) -> Option<&ToolError> {
        match self {
            Self::Ok(_) => None,
            Self::Error(e) => Some(e),
        }
    }

    /// Returns the error kind of a failed result.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Ok(_) => None,
            Self::Error(e) => Some(e.kind()),
        }
    }

    /// Renders the result as the JSON document sent to the assistant.
    ///
    /// Errors become `{"status": "error", "kind", "message", "retryable"}`
    /// plus `field` for argument errors.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Ok(payload) => payload.clone(),
            Self::Error(e) => {
                let kind = e.kind();
                let mut body = json!({
                    "status": "error",
                    "kind": kind,
                    "message": e.to_string(),
                    "retryable": kind.is_retryable(),
                });
                if let (Some(field), Value::Object(obj)) = (e.field(), &mut body) {
                    obj.insert("field".into(), json!(field));
                }
                body
            }
        }
    }
}

impl From<Result<Value, ToolError>> for ToolResult {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(payload) => Self::Ok(payload),
            Err(e) => Self::Error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;

    #[test]
    fn ok_result_passes_payload_through() {
        let result = ToolResult::Ok(json!({"status": "success"}));
        assert_eq!(result.status(), Status::Ok);
        assert_eq!(result.to_json(), json!({"status": "success"}));
        assert!(result.kind().is_none());
    }

    #[test]
    fn invalid_argument_renders_field() {
        let result = ToolResult::Error(ToolError::invalid_argument("material_id", "missing"));
        let body = result.to_json();
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "InvalidArgument");
        assert_eq!(body["field"], "material_id");
        assert_eq!(body["retryable"], false);
    }

    #[test]
    fn unavailable_is_marked_retryable() {
        let err: ToolError = UpstreamError::unavailable("down").into();
        let result = ToolResult::from(Err::<Value, _>(err));
        let body = result.to_json();
        assert_eq!(body["kind"], "Unavailable");
        assert_eq!(body["retryable"], true);
        assert!(body.get("field").is_none());
    }
}
