//! In-memory doubles for [`ChatPlatform`] and [`LlmProvider`], for tests that
//! drive the pipeline without Discord or a completion API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use banter_core::types::{ChannelId, CommunityId, Member, MessageId, RawMessage};

use crate::pipeline::platform::{ChatPlatform, PlatformError};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A message the pipeline sent through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: ChannelId,
    /// `Some` when sent as a reply.
    pub reply_to: Option<MessageId>,
    pub content: String,
}

/// Chat platform double that records everything sent through it.
///
/// History is stored oldest-first and returned newest-first, the way
/// Discord's message endpoint returns it.
#[derive(Default)]
pub struct MockPlatform {
    history: Mutex<Vec<RawMessage>>,
    rosters: Mutex<HashMap<CommunityId, Result<Vec<Member>, String>>>,
    fail_fetch: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
    fetch_limits: Mutex<Vec<usize>>,
    typing: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed channel history, oldest first.
    pub fn with_history(self, messages: Vec<RawMessage>) -> Self {
        *locked(&self.history) = messages;
        self
    }

    pub fn with_roster(self, community: CommunityId, members: Vec<Member>) -> Self {
        locked(&self.rosters).insert(community, Ok(members));
        self
    }

    pub fn with_roster_error(self, community: CommunityId, reason: &str) -> Self {
        locked(&self.rosters).insert(community, Err(reason.to_string()));
        self
    }

    pub fn failing_fetch(self) -> Self {
        self.fail_fetch.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_sends(self) -> Self {
        self.fail_sends.store(true, Ordering::SeqCst);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        locked(&self.sent).clone()
    }

    /// Limits passed to each `fetch_recent` call.
    pub fn fetch_limits(&self) -> Vec<usize> {
        locked(&self.fetch_limits).clone()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }

    fn record(&self, channel: ChannelId, reply_to: Option<MessageId>, content: &str) {
        locked(&self.sent).push(SentMessage {
            channel,
            reply_to,
            content: content.to_string(),
        });
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn fetch_recent(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        locked(&self.fetch_limits).push(limit);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(PlatformError::Fetch("mock fetch failure".to_string()));
        }
        let history = locked(&self.history);
        Ok(history
            .iter()
            .rev()
            .filter(|m| m.channel.id == channel)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn send_typing(&self, _channel: ChannelId) -> Result<(), PlatformError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), PlatformError> {
        self.record(channel, None, content);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::Send("mock send failure".to_string()));
        }
        Ok(())
    }

    async fn reply(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), PlatformError> {
        self.record(channel, Some(message), content);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::Send("mock send failure".to_string()));
        }
        Ok(())
    }

    async fn fetch_roster(&self, community: CommunityId) -> Result<Vec<Member>, PlatformError> {
        match locked(&self.rosters).get(&community) {
            Some(Ok(members)) => Ok(members.clone()),
            Some(Err(reason)) => Err(PlatformError::Roster(reason.clone())),
            None => Err(PlatformError::Roster(format!("unknown community {community}"))),
        }
    }
}

/// Provider that always answers with the same text and records requests.
pub struct StaticProvider {
    reply: String,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StaticProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        locked(&self.requests).clone()
    }
}

#[async_trait]
impl LlmProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        locked(&self.requests).push(req.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ChatResponse {
            content: self.reply.clone(),
            model: req.model.clone(),
            tokens_in: 1,
            tokens_out: 1,
            stop_reason: "stop".to_string(),
        })
    }
}

/// Provider whose every call fails.
#[derive(Default)]
pub struct FailingProvider {
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FailingProvider {
    fn name(&self) -> &str {
        "always-fail"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Unavailable("intentional failure".to_string()))
    }
}
