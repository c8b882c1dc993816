use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
///
/// Serialized lowercase because the persisted history and the remote wire
/// format share the same `"user"`/`"model"` spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One atomic content unit of a message.
///
/// The untagged representation matches the external JSON shape exactly:
/// `{"text": "..."}` for text and `{"inlineData": {"mimeType": "...",
/// "data": "..."}}` for an inline image payload. Anything else fails to
/// deserialize and is treated as corruption by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePart {
    Text {
        text: String,
    },
    InlineImage {
        #[serde(rename = "inlineData")]
        inline_data: InlineImageData,
    },
}

/// Base64-encoded image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImageData {
    pub mime_type: String,
    pub data: String,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline_image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineImage {
            inline_data: InlineImageData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }
}

/// A single conversation turn. Immutable once appended; the conversation
/// list is append-only during a session except for full replacement on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self { role, parts }
    }

    /// Convenience for the common single-text-part message.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![MessagePart::text(text)])
    }
}

/// Raw user-supplied image bytes prior to base64 encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub data: Vec<u8>,
    pub mime_type: String,
}
