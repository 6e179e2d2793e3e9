//! Scope — the visibility partition for stored content.
//!
//! A scope names a server ("guild") and, within it, a channel. Direct
//! messages have neither. Every record in the semantic store is keyed by
//! the scope it was observed in, and the disclosure policy decides whether
//! content may cross scope boundaries.

use serde::{Deserialize, Serialize};

/// Where a message or fact was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// The enclosing server, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// The channel within the server, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl Scope {
    /// A scope inside a server channel.
    pub fn channel(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: Some(guild_id.into()),
            channel_id: Some(channel_id.into()),
        }
    }

    /// A direct-message scope (no server, no channel).
    pub fn direct() -> Self {
        Self::default()
    }

    /// Whether this scope is a direct message.
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }

    /// Whether two scopes name the same channel.
    pub fn same_channel(&self, other: &Scope) -> bool {
        self.channel_id.is_some() && self.channel_id == other.channel_id
    }

    /// The guild id, or "direct" for DMs. Used in prompts and log fields.
    pub fn guild_or_direct(&self) -> &str {
        self.guild_id.as_deref().unwrap_or("direct")
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            self.guild_or_direct(),
            self.channel_id.as_deref().unwrap_or("-")
        )
    }
}
