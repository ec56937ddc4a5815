//! [`ChatPlatform`] over the Discord REST API, plus conversion of serenity
//! models into the pipeline's platform-neutral types.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::{CreateMessage, GetMessages};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::{Channel, ChannelType, Message};
use serenity::model::id::{
    ChannelId as DiscordChannelId, GuildId, MessageId as DiscordMessageId, UserId as DiscordUserId,
};
use serenity::prelude::Context;

use banter_agent::pipeline::{ChatPlatform, PlatformError};
use banter_core::types::{
    Author, ChannelId, ChannelKind, ChannelRef, CommunityId, Member, MessageId, RawMessage, UserId,
};

/// Discord's own epoch (2015-01-01T00:00:00Z) in unix milliseconds.
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;
/// Largest page the guild member list endpoint returns.
const MEMBER_PAGE: u64 = 1000;

/// Discord-backed chat platform. Cheap to build per event.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    pub fn from_context(ctx: &Context) -> Self {
        Self::new(Arc::clone(&ctx.http), Arc::clone(&ctx.cache))
    }

    /// Name and kind of a channel, from cache when possible.
    pub async fn channel_ref(
        &self,
        channel: DiscordChannelId,
    ) -> Result<ChannelRef, serenity::Error> {
        let resolved = channel.to_channel((&self.cache, self.http.as_ref())).await?;
        Ok(to_channel_ref(channel, &resolved))
    }

    /// Convert a serenity message posted in `channel`.
    pub fn to_raw_message(&self, msg: &Message, channel: &ChannelRef) -> RawMessage {
        RawMessage {
            id: MessageId(msg.id.get()),
            author: Author {
                id: UserId(msg.author.id.get()),
                name: msg.author.name.clone(),
                bot: msg.author.bot,
            },
            content: msg.content.clone(),
            created_at: snowflake_time(msg.id.get()),
            channel: channel.clone(),
            community_id: msg.guild_id.map(|g| CommunityId(g.get())),
            mentions: msg.mentions.iter().map(|u| UserId(u.id.get())).collect(),
        }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn fetch_recent(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        let id = DiscordChannelId::new(channel.get());
        let channel_ref = self
            .channel_ref(id)
            .await
            .map_err(|e| PlatformError::Fetch(e.to_string()))?;
        let limit = u8::try_from(limit).unwrap_or(u8::MAX);
        let messages = id
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|e| PlatformError::Fetch(e.to_string()))?;
        Ok(messages
            .iter()
            .map(|m| self.to_raw_message(m, &channel_ref))
            .collect())
    }

    async fn send_typing(&self, channel: ChannelId) -> Result<(), PlatformError> {
        DiscordChannelId::new(channel.get())
            .broadcast_typing(&self.http)
            .await
            .map_err(|e| PlatformError::Typing(e.to_string()))
    }

    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), PlatformError> {
        DiscordChannelId::new(channel.get())
            .say(self.http.as_ref(), content)
            .await
            .map(|_| ())
            .map_err(|e| PlatformError::Send(e.to_string()))
    }

    async fn reply(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), PlatformError> {
        let channel = DiscordChannelId::new(channel.get());
        let builder = CreateMessage::new()
            .content(content)
            .reference_message((channel, DiscordMessageId::new(message.get())));
        channel
            .send_message(self.http.as_ref(), builder)
            .await
            .map(|_| ())
            .map_err(|e| PlatformError::Send(e.to_string()))
    }

    async fn fetch_roster(&self, community: CommunityId) -> Result<Vec<Member>, PlatformError> {
        let guild = GuildId::new(community.get());
        let mut roster = Vec::new();
        let mut after: Option<DiscordUserId> = None;
        loop {
            let page = guild
                .members(&self.http, Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| PlatformError::Roster(e.to_string()))?;
            let full_page = page.len() as u64 == MEMBER_PAGE;
            after = page.last().map(|m| m.user.id);
            roster.extend(page.iter().map(|m| Member {
                user_id: UserId(m.user.id.get()),
                bot: m.user.bot,
            }));
            if !full_page {
                break;
            }
        }
        Ok(roster)
    }
}

fn to_channel_ref(id: DiscordChannelId, channel: &Channel) -> ChannelRef {
    let (name, kind) = match channel {
        Channel::Guild(gc) => (Some(gc.name.clone()), channel_kind(gc.kind)),
        Channel::Private(_) => (None, ChannelKind::Direct),
        _ => (None, ChannelKind::Other),
    };
    ChannelRef {
        id: ChannelId(id.get()),
        name,
        kind,
    }
}

/// Map serenity channel types onto the kinds the addressing heuristic knows.
pub fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text => ChannelKind::Text,
        ChannelType::Private => ChannelKind::Direct,
        _ => ChannelKind::Other,
    }
}

/// Creation time encoded in a Discord snowflake, millisecond precision.
pub fn snowflake_time(snowflake: u64) -> DateTime<Utc> {
    let ms = (snowflake >> 22) + DISCORD_EPOCH_MS;
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or(DateTime::UNIX_EPOCH)
}
