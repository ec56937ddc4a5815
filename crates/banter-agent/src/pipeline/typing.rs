//! Typing indicator kept alive while the completion call is in flight.
//!
//! Discord's typing status expires after ~10 seconds, so it is refreshed on a
//! fixed interval. The loop is aborted when the guard is dropped, which makes
//! every early return and error path stop it too.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use banter_core::types::ChannelId;

use super::platform::ChatPlatform;

/// Handle to a background typing indicator task. Aborts the task on drop.
pub struct TypingGuard(tokio::task::JoinHandle<()>);

impl TypingGuard {
    /// Send one ping for `channel` before returning, then keep refreshing it
    /// every `interval` in the background.
    pub async fn start<P>(platform: Arc<P>, channel: ChannelId, interval: Duration) -> Self
    where
        P: ChatPlatform + ?Sized + 'static,
    {
        ping(platform.as_ref(), channel).await;
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                ping(platform.as_ref(), channel).await;
            }
        });
        TypingGuard(handle)
    }

    /// Stop the indicator now rather than at end of scope.
    pub fn stop(self) {}
}

async fn ping<P: ChatPlatform + ?Sized>(platform: &P, channel: ChannelId) {
    if let Err(e) = platform.send_typing(channel).await {
        debug!(channel = %channel, error = %e, "typing indicator failed");
    }
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
