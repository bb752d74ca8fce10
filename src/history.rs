//! Chat history types shared by the backend client and the sync controller.
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl Role {
    /// Server logs only carry `user` and `assistant`; anything that is not
    /// the user is shown on the assistant side.
    pub fn from_wire(role: &str) -> Self {
        if role == "user" {
            Role::User
        } else {
            Role::Assistant
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "ASSISTANT",
            Role::System => "System",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// IPFS handle of the stored response, present on verified assistant replies.
    #[serde(rename = "ipfs", default, skip_serializing_if = "Option::is_none")]
    pub content_address: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            content_address: None,
        }
    }

    pub fn assistant(content: impl Into<String>, content_address: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            content_address: content_address.filter(|handle| !handle.is_empty()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            content_address: None,
        }
    }
}

/// A message as the server stores it. Entries without a role or content
/// are dropped before display.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WireMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub ipfs: Option<String>,
}

impl WireMessage {
    pub fn into_message(self) -> Option<ChatMessage> {
        let role = self.role.filter(|r| !r.is_empty())?;
        let content = self.content.filter(|c| !c.is_empty())?;
        let message = match Role::from_wire(&role) {
            Role::User => ChatMessage::user(content),
            _ => ChatMessage::assistant(content, self.ipfs),
        };
        Some(message)
    }
}

pub fn messages_from_wire(wire: Vec<WireMessage>) -> Vec<ChatMessage> {
    wire.into_iter().filter_map(WireMessage::into_message).collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

impl SessionEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_messages_without_role_or_content_are_dropped() {
        let wire: Vec<WireMessage> = serde_json::from_value(serde_json::json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant"},
            {"content": "orphan"},
            {"role": "assistant", "content": "hello", "ipfs": "bafy123"},
            {"role": "user", "content": ""}
        ]))
        .unwrap();

        let messages = messages_from_wire(wire);
        assert_eq!(
            messages,
            vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello", Some("bafy123".to_string())),
            ]
        );
    }

    #[test]
    fn unknown_roles_render_as_assistant() {
        let wire = WireMessage {
            role: Some("tool".into()),
            content: Some("output".into()),
            ipfs: None,
        };
        assert_eq!(wire.into_message().unwrap().role, Role::Assistant);
    }

    #[test]
    fn empty_handle_is_not_a_content_address() {
        let message = ChatMessage::assistant("x", Some(String::new()));
        assert!(message.content_address.is_none());
    }

    #[test]
    fn session_entry_reads_mongo_style_id() {
        let entry: SessionEntry =
            serde_json::from_str(r#"{"_id": "s1", "title": "Chat | 10:00 AM"}"#).unwrap();
        assert_eq!(entry, SessionEntry::new("s1", "Chat | 10:00 AM"));
    }
}
