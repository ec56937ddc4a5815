use async_trait::async_trait;

use banter_core::types::{ChannelId, CommunityId, Member, MessageId, RawMessage};

/// Errors surfaced by a chat platform adapter.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("history fetch failed: {0}")]
    Fetch(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("typing indicator failed: {0}")]
    Typing(String),

    #[error("roster fetch failed: {0}")]
    Roster(String),
}

/// The chat platform operations the pipeline depends on.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The most recent `limit` messages of a channel, in any order.
    async fn fetch_recent(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<RawMessage>, PlatformError>;

    async fn send_typing(&self, channel: ChannelId) -> Result<(), PlatformError>;

    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), PlatformError>;

    /// Send `content` as a reply referencing `message`.
    async fn reply(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), PlatformError>;

    /// Full member roster of a community.
    async fn fetch_roster(&self, community: CommunityId) -> Result<Vec<Member>, PlatformError>;
}
