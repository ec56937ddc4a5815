//! Sending the model's answer back to the channel.

use tracing::{debug, warn};

use banter_core::config::ReplyStyle;
use banter_core::types::RawMessage;

use super::header::strip_echoed_headers;
use super::platform::{ChatPlatform, PlatformError};

/// Sent when the completion call produced nothing.
pub const APOLOGY: &str = "Can't produce a response. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Characters per message, including any mention prefix.
    pub chunk_size: usize,
    pub reply_style: ReplyStyle,
    /// Prefix every chunk with a mention of the originating author.
    pub mention_author: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Split `text` into consecutive pieces of at most `chunk_size` characters.
///
/// Splits on character boundaries only, so concatenating the pieces gives
/// back `text` exactly.
pub fn split_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for c in text.chars() {
        current.push(c);
        count += 1;
        if count == size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Deliver a completion result for `origin`.
///
/// `None` means the completion call failed: a single apology is sent as a
/// reply. Send failures are logged and the remaining chunks still go out.
pub async fn dispatch<P: ChatPlatform + ?Sized>(
    platform: &P,
    origin: &RawMessage,
    completion: Option<&str>,
    opts: DispatchOptions,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();

    let Some(text) = completion else {
        let result = platform.reply(origin.channel.id, origin.id, APOLOGY).await;
        record(&mut outcome, result, origin);
        return outcome;
    };

    let cleaned = strip_echoed_headers(text);
    // Discord rejects blank messages.
    if cleaned.trim().is_empty() {
        debug!(message = %origin.id, "model chose not to reply");
        return outcome;
    }

    let prefix = if opts.mention_author {
        format!("<@{}> ", origin.author.id)
    } else {
        String::new()
    };
    let budget = opts
        .chunk_size
        .saturating_sub(prefix.chars().count())
        .max(1);

    for chunk in split_chunks(&cleaned, budget) {
        let content = format!("{prefix}{chunk}");
        let result = match opts.reply_style {
            ReplyStyle::Reply => platform.reply(origin.channel.id, origin.id, &content).await,
            ReplyStyle::Send => platform.send_message(origin.channel.id, &content).await,
        };
        record(&mut outcome, result, origin);
    }

    outcome
}

fn record(outcome: &mut DispatchOutcome, result: Result<(), PlatformError>, origin: &RawMessage) {
    match result {
        Ok(()) => outcome.sent += 1,
        Err(e) => {
            outcome.failed += 1;
            warn!(
                error = %e,
                channel = %origin.channel.id,
                message = %origin.id,
                "reply send failed"
            );
        }
    }
}
