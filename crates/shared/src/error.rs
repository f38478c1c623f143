//! JSON error body returned by the chat proxy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The `/chat` request body could not be read.
    Validation,
    /// The completion endpoint failed or answered with something unusable.
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Upstream, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_in_snake_case() {
        let body = serde_json::to_value(ApiError::upstream("status 429")).expect("encode");
        assert_eq!(
            body,
            serde_json::json!({ "code": "upstream", "message": "status 429" })
        );
        assert_eq!(
            serde_json::from_str::<ApiError>(r#"{"code":"validation","message":"bad body"}"#)
                .expect("decode"),
            ApiError::validation("bad body")
        );
    }
}
