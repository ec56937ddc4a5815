//! Conversation window assembly: recent channel history turned into the
//! ordered prompt sent to the completion API.

use tracing::debug;

use banter_core::config::{AddressingMode, Behavior, BotConfig};
use banter_core::types::{BotIdentity, ChannelId, RawMessage, UserId};

use super::addressing::{is_message_for_bot, member_count, starts_with_prefix};
use super::header::{carries_sender, with_header};
use super::membership::MembershipTracker;
use super::platform::{ChatPlatform, PlatformError};
use super::sanitize::sanitize_username;
use crate::provider::PromptTurn;

/// Prompt turns for one completion call. Rebuilt for every inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationWindow {
    /// System turn first, then history oldest-first.
    pub turns: Vec<PromptTurn>,
    /// Author of the newest fetched message, whether or not it made it into
    /// `turns`.
    pub last_speaker: Option<UserId>,
}

pub struct WindowBuilder<'a> {
    pub config: &'a BotConfig,
    pub behavior: Behavior,
    pub bot: &'a BotIdentity,
    pub membership: &'a MembershipTracker,
    pub system_prompt: &'a str,
}

impl<'a> WindowBuilder<'a> {
    /// Fetch recent history from the platform and build the window.
    pub async fn fetch_and_build<P: ChatPlatform + ?Sized>(
        &self,
        platform: &P,
        channel: ChannelId,
    ) -> Result<ConversationWindow, PlatformError> {
        let history = platform
            .fetch_recent(channel, self.config.history_limit)
            .await?;
        Ok(self.build(history))
    }

    /// Build the window from already fetched history, in any order.
    pub fn build(&self, mut history: Vec<RawMessage>) -> ConversationWindow {
        history.sort_by_key(|m| (m.created_at, m.id));

        let mut turns = Vec::with_capacity(history.len() + 1);
        turns.push(PromptTurn::system(self.system_prompt));

        for msg in &history {
            if let Some(turn) = self.turn_for(msg) {
                turns.push(turn);
            }
        }

        debug!(turns = turns.len(), fetched = history.len(), "conversation window built");

        ConversationWindow {
            turns,
            last_speaker: history.last().map(|m| m.author.id),
        }
    }

    fn turn_for(&self, msg: &RawMessage) -> Option<PromptTurn> {
        let from_self = msg.author.id == self.bot.id;
        if msg.author.bot && !from_self {
            return None;
        }

        if self.behavior.addressing_mode == AddressingMode::Selective
            && !is_message_for_bot(msg, self.bot.id, member_count(msg, self.membership))
        {
            return None;
        }

        let (content, to) = match strip_bot_mention(&msg.content, self.bot.id) {
            Some(rest) => (rest, Some(sanitize_username(&self.bot.name))),
            None => (msg.content.as_str(), None),
        };

        if starts_with_prefix(content, &self.config.ignore_prefix) {
            return None;
        }

        let from = sanitize_username(&msg.author.name);
        let style = self.behavior.header_style;
        let content = with_header(style, msg.created_at, &from, to.as_deref(), content);

        // The participant name field is redundant once the header says FROM.
        let name = if carries_sender(style) {
            None
        } else {
            Some(from).filter(|n| !n.is_empty())
        };

        Some(if from_self {
            PromptTurn::assistant(name, content)
        } else {
            PromptTurn::user(name, content)
        })
    }
}

/// Strip a leading `<@ID>` / `<@!ID>` mention of the bot, plus the whitespace
/// after it. `None` when the content does not start with one.
pub fn strip_bot_mention(content: &str, bot: UserId) -> Option<&str> {
    let id = bot.get().to_string();
    ["<@", "<@!"].iter().find_map(|open| {
        content
            .strip_prefix(open)
            .and_then(|rest| rest.strip_prefix(id.as_str()))
            .and_then(|rest| rest.strip_prefix('>'))
            .map(str::trim_start)
    })
}
