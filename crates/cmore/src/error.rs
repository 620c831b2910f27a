use serde_json::Value;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, CmoreError>;

#[derive(Debug, Error)]
pub enum CmoreError {
    /// Error envelope declared by the backend in a response body. Carries
    /// the backend's `message`, `code` or bare error string.
    #[error("backend error: {0}")]
    Backend(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
}

impl CmoreError {
    pub(crate) fn payload(msg: impl Into<String>) -> Self {
        Self::UnexpectedPayload(msg.into())
    }
}

/// Inspect a raw response body for the backend's `{"error": ...}` envelope.
///
/// A non-JSON body or one without a top-level `error` field is not an error
/// here; the caller's own parse step decides what to make of it. This runs
/// on every response regardless of HTTP status, so backend failures surface
/// uniformly.
pub fn check_error_envelope(body: &str) -> Result<()> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Ok(());
    };
    let Some(error) = value.get("error") else {
        return Ok(());
    };

    match error {
        Value::Object(fields) => {
            if let Some(message) = fields.get("message") {
                Err(CmoreError::Backend(stringify(message)))
            } else if let Some(code) = fields.get("code") {
                Err(CmoreError::Backend(stringify(code)))
            } else {
                Err(CmoreError::Backend("error".to_string()))
            }
        }
        Value::String(message) => Err(CmoreError::Backend(message.clone())),
        _ => Err(CmoreError::Backend("error".to_string())),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_message(result: Result<()>) -> String {
        match result {
            Err(CmoreError::Backend(message)) => message,
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[test]
    fn envelope_with_message() {
        let result = check_error_envelope(r#"{"error":{"message":"bad login"}}"#);
        assert_eq!(backend_message(result), "bad login");
    }

    #[test]
    fn envelope_with_code() {
        let result = check_error_envelope(r#"{"error":{"code":42}}"#);
        assert_eq!(backend_message(result), "42");
    }

    #[test]
    fn envelope_with_bare_string() {
        let result = check_error_envelope(r#"{"error":"locked"}"#);
        assert_eq!(backend_message(result), "locked");
    }

    #[test]
    fn envelope_with_unrecognized_shape() {
        assert_eq!(backend_message(check_error_envelope(r#"{"error":[1,2]}"#)), "error");
        assert_eq!(backend_message(check_error_envelope(r#"{"error":{"detail":"x"}}"#)), "error");
    }

    #[test]
    fn no_error_field_is_ok() {
        assert!(check_error_envelope(r#"{"data":{"id":1}}"#).is_ok());
    }

    #[test]
    fn non_json_body_is_ok() {
        assert!(check_error_envelope("<html>oops</html>").is_ok());
        assert!(check_error_envelope("").is_ok());
    }
}
