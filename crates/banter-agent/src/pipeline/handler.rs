//! Per-message orchestration: gate, build the window, call the model, reply.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use banter_core::config::{Behavior, BotConfig, MentionPolicy};
use banter_core::types::{BotIdentity, CommunityId, RawMessage};

use super::addressing::{admission_check, is_addressed, SkipReason};
use super::dispatch::{dispatch, DispatchOptions, DispatchOutcome};
use super::membership::MembershipTracker;
use super::platform::{ChatPlatform, PlatformError};
use super::typing::TypingGuard;
use super::window::WindowBuilder;
use crate::prompt::system_prompt_for;
use crate::provider::{ChatRequest, LlmProvider};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Skipped(SkipReason),
    /// The completion call succeeded and its text was dispatched.
    Replied(DispatchOutcome),
    /// The completion call failed and the apology was dispatched.
    Apologized(DispatchOutcome),
}

/// Owns the membership state and drives the pipeline for each event.
///
/// Platform handles are passed per call: adapters only get a usable client
/// once connected, and may rebuild it on reconnect.
pub struct MessageHandler<L: LlmProvider + ?Sized> {
    provider: Arc<L>,
    membership: MembershipTracker,
    config: BotConfig,
    behavior: Behavior,
    model: String,
    max_tokens: Option<u32>,
    system_prompt: String,
}

impl<L: LlmProvider + ?Sized> MessageHandler<L> {
    pub fn new(
        provider: Arc<L>,
        config: BotConfig,
        model: String,
        max_tokens: Option<u32>,
    ) -> Self {
        let behavior = config.behavior();
        let system_prompt = system_prompt_for(&config);
        Self {
            provider,
            membership: MembershipTracker::new(),
            config,
            behavior,
            model,
            max_tokens,
            system_prompt,
        }
    }

    pub fn membership(&self) -> &MembershipTracker {
        &self.membership
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub async fn on_ready<P: ChatPlatform + ?Sized>(
        &self,
        platform: &P,
        bot: &BotIdentity,
        communities: &[CommunityId],
    ) {
        info!(bot = %bot.name, id = %bot.id, communities = communities.len(), "logged in");
        self.membership.on_ready(platform, communities).await;
    }

    pub fn on_member_join(&self, community: CommunityId, is_bot: bool) {
        self.membership.on_member_join(community, is_bot);
    }

    pub fn on_member_leave(&self, community: CommunityId, is_bot: bool) {
        self.membership.on_member_leave(community, is_bot);
    }

    /// Handle one message-created event.
    ///
    /// Returns `Err` only when channel history could not be fetched; nothing
    /// is sent in that case. Completion and send failures are handled here.
    pub async fn handle_message<P>(
        &self,
        platform: Arc<P>,
        bot: &BotIdentity,
        msg: &RawMessage,
    ) -> Result<HandleOutcome, PlatformError>
    where
        P: ChatPlatform + ?Sized + 'static,
    {
        debug!(counts = ?self.membership.snapshot(), "membership");

        if let Some(reason) = admission_check(msg, bot.id, &self.config) {
            debug!(message = %msg.id, %reason, "message skipped");
            return Ok(HandleOutcome::Skipped(reason));
        }
        if !is_addressed(self.behavior.addressing_mode, msg, bot.id, &self.membership) {
            debug!(message = %msg.id, reason = %SkipReason::NotAddressed, "message skipped");
            return Ok(HandleOutcome::Skipped(SkipReason::NotAddressed));
        }

        let typing = TypingGuard::start(
            Arc::clone(&platform),
            msg.channel.id,
            Duration::from_secs(self.config.typing_interval_secs),
        )
        .await;

        let window = WindowBuilder {
            config: &self.config,
            behavior: self.behavior,
            bot,
            membership: &self.membership,
            system_prompt: &self.system_prompt,
        }
        .fetch_and_build(platform.as_ref(), msg.channel.id)
        .await?;

        debug!(turns = ?window.turns, "conversation");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: window.turns,
            max_tokens: self.max_tokens,
        };
        let result = self.provider.send(&request).await;
        typing.stop();

        let completion = match result {
            Ok(resp) => {
                debug!(
                    model = %resp.model,
                    tokens_in = resp.tokens_in,
                    tokens_out = resp.tokens_out,
                    content = %resp.content,
                    "completion received"
                );
                Some(resp.content)
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "completion call failed");
                None
            }
        };

        let mention_author = match self.behavior.mention_on_reply {
            MentionPolicy::Never => false,
            MentionPolicy::IfDifferentLastSpeaker => window
                .last_speaker
                .is_some_and(|speaker| speaker != msg.author.id),
        };
        let opts = DispatchOptions {
            chunk_size: self.config.chunk_size,
            reply_style: self.behavior.reply_style,
            mention_author,
        };

        let failed = completion.is_none();
        let outcome = dispatch(platform.as_ref(), msg, completion.as_deref(), opts).await;
        Ok(if failed {
            HandleOutcome::Apologized(outcome)
        } else {
            HandleOutcome::Replied(outcome)
        })
    }
}
