//! Message domain types — the record written to the semantic store for
//! every conversational turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::Scope;

/// Who authored a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The end user
    User,
    /// The assistant's own reply
    Assistant,
    /// System-originated content (tool notes, ingested documents)
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// The medium the content arrived in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    Text,
    Image,
    Audio,
    Document,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Audio => "audio",
            Modality::Document => "document",
        }
    }
}

/// Metadata attached to a message record in the store.
///
/// Immutable once created except for deletion by explicit purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Platform message id (caller-chosen record identifier)
    pub message_id: String,

    /// Where the message was observed
    #[serde(flatten)]
    pub scope: Scope,

    /// Author identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Author display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    pub role: MessageRole,

    #[serde(default)]
    pub modality: Modality,

    /// The message this one replies to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Categorization tags (e.g. "memo", "private")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl MessageMeta {
    /// A user-authored text message in the given scope.
    pub fn user(message_id: impl Into<String>, scope: Scope, user_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            scope,
            user_id: Some(user_id.into()),
            username: None,
            role: MessageRole::User,
            modality: Modality::Text,
            reply_to: None,
            created_at: Utc::now(),
            tags: Vec::new(),
        }
    }

    /// An assistant reply, keyed by a fresh id, replying to `reply_to`.
    pub fn assistant_reply(scope: Scope, reply_to: impl Into<String>) -> Self {
        Self {
            message_id: format!("reply:{}", Uuid::new_v4()),
            scope,
            user_id: None,
            username: None,
            role: MessageRole::Assistant,
            modality: Modality::Text,
            reply_to: Some(reply_to.into()),
            created_at: Utc::now(),
            tags: Vec::new(),
        }
    }

    pub fn with_username(mut self, name: impl Into<String>) -> Self {
        self.username = Some(name.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}
