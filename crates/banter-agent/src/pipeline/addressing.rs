//! Deciding whether an inbound message is meant for the bot.

use std::fmt;

use banter_core::config::{AddressingMode, BotConfig};
use banter_core::types::{ChannelKind, RawMessage, UserId};

use super::membership::MembershipTracker;

/// Above this many participants a message without a mention is assumed to be
/// aimed at someone else.
const PRIVATE_CONVERSATION_MAX: usize = 2;

/// Why an inbound message was dropped before reaching the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AutomatedAuthor,
    UnwatchedChannel,
    IgnorePrefix,
    NotAddressed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutomatedAuthor => write!(f, "automated-author"),
            Self::UnwatchedChannel => write!(f, "unwatched-channel"),
            Self::IgnorePrefix => write!(f, "ignore-prefix"),
            Self::NotAddressed => write!(f, "not-addressed"),
        }
    }
}

/// Gates applied to every inbound message in both addressing modes.
///
/// Returns `None` when the message may proceed to the addressing check.
pub fn admission_check(msg: &RawMessage, bot: UserId, config: &BotConfig) -> Option<SkipReason> {
    if msg.author.bot {
        return Some(SkipReason::AutomatedAuthor);
    }

    let watched = match (&msg.channel.name, msg.channel.kind) {
        (_, ChannelKind::Direct) if config.dm_allowed => true,
        (Some(name), _) => config.watches(name),
        (None, _) => false,
    };
    if !watched {
        return Some(SkipReason::UnwatchedChannel);
    }

    if starts_with_prefix(&msg.content, &config.ignore_prefix) && !msg.mentions_user(bot) {
        return Some(SkipReason::IgnorePrefix);
    }

    None
}

/// An empty prefix ignores nothing.
pub(crate) fn starts_with_prefix(content: &str, prefix: &str) -> bool {
    !prefix.is_empty() && content.starts_with(prefix)
}

/// Participant count the heuristic reasons about for a message's channel.
pub fn member_count(msg: &RawMessage, membership: &MembershipTracker) -> usize {
    match msg.channel.kind {
        ChannelKind::Text => msg
            .community_id
            .map(|c| membership.count(c))
            .unwrap_or(0),
        ChannelKind::Direct => 2,
        ChannelKind::Other => 0,
    }
}

/// Selective-mode decision for a message given its channel's member count.
///
/// A direct mention of the bot always wins. Otherwise the message counts as
/// addressed only in a small conversation, and not when the author mentions
/// themselves.
pub fn is_message_for_bot(msg: &RawMessage, bot: UserId, member_count: usize) -> bool {
    if msg.mentions_user(bot) {
        return true;
    }
    if member_count > PRIVATE_CONVERSATION_MAX {
        return false;
    }
    !msg.mentions_user(msg.author.id)
}

/// Addressing decision under the configured mode.
pub fn is_addressed(
    mode: AddressingMode,
    msg: &RawMessage,
    bot: UserId,
    membership: &MembershipTracker,
) -> bool {
    match mode {
        AddressingMode::Always => true,
        AddressingMode::Selective => is_message_for_bot(msg, bot, member_count(msg, membership)),
    }
}
