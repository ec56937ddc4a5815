use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

snowflake!(
    /// Platform user (human or bot account).
    UserId
);
snowflake!(
    /// A community (Discord guild).
    CommunityId
);
snowflake!(ChannelId);
snowflake!(MessageId);

/// What sort of channel a message was posted in.
///
/// Only the distinction the addressing heuristic cares about is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A standard text channel inside a community.
    Text,
    /// A one-to-one direct message.
    Direct,
    /// Threads, forums, voice text, announcement channels, ...
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ChannelId,
    /// `None` for direct messages, which have no name.
    pub name: Option<String>,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    /// Set by the platform for bot and webhook accounts.
    pub bot: bool,
}

/// A message as delivered by the chat platform. Read-only input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: MessageId,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub channel: ChannelRef,
    pub community_id: Option<CommunityId>,
    pub mentions: Vec<UserId>,
}

impl RawMessage {
    pub fn mentions_user(&self, user: UserId) -> bool {
        self.mentions.contains(&user)
    }
}

/// The bot's own account, learned from the platform's ready event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
    pub name: String,
}

/// One entry of a community roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    pub bot: bool,
}
