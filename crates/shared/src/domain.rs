use serde::{Deserialize, Serialize};

/// Canonical speaker tag for transcript entries.
///
/// Wire shapes disagree on the assistant label (`assistant` vs `bot`); both
/// decode to [`Role::Assistant`] and it always serializes as `assistant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    #[serde(alias = "bot")]
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_label_decodes_as_assistant() {
        let message: Message =
            serde_json::from_str(r#"{"role":"bot","content":"hi"}"#).expect("decode");
        assert_eq!(message, Message::assistant("hi"));
    }

    #[test]
    fn assistant_serializes_with_canonical_tag() {
        let encoded = serde_json::to_string(&Message::assistant("hi")).expect("encode");
        assert_eq!(encoded, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<Message>(r#"{"role":"tool","content":"x"}"#).is_err());
    }
}
