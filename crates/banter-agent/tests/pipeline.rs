use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use banter_agent::mock::{FailingProvider, MockPlatform, StaticProvider};
use banter_agent::pipeline::addressing::SkipReason;
use banter_agent::pipeline::dispatch::{DispatchOutcome, APOLOGY};
use banter_agent::pipeline::{HandleOutcome, MessageHandler, PlatformError};
use banter_agent::prompt::CLASSIC_PERSONA;
use banter_agent::provider::{PromptTurn, Role};
use banter_core::config::{AddressingMode, BotConfig, HeaderStyle, MentionPolicy, Preset};
use banter_core::types::{
    Author, BotIdentity, ChannelId, ChannelKind, ChannelRef, CommunityId, Member, MessageId,
    RawMessage, UserId,
};

const BOT: UserId = UserId(1000);
const GUILD: CommunityId = CommunityId(1);
const CHANNEL: ChannelId = ChannelId(5);

fn bot() -> BotIdentity {
    BotIdentity {
        id: BOT,
        name: "banter".to_string(),
    }
}

fn message(seq: u64, author: u64, content: &str) -> RawMessage {
    RawMessage {
        id: MessageId(seq),
        author: Author {
            id: UserId(author),
            name: format!("user{author}"),
            bot: author == BOT.get(),
        },
        content: content.to_string(),
        created_at: Utc.with_ymd_and_hms(2023, 9, 11, 9, 0, seq as u32).unwrap(),
        channel: ChannelRef {
            id: CHANNEL,
            name: Some("general".to_string()),
            kind: ChannelKind::Text,
        },
        community_id: Some(GUILD),
        mentions: Vec::new(),
    }
}

fn roster(n: u64) -> Vec<Member> {
    (0..n)
        .map(|i| Member {
            user_id: UserId(i + 1),
            bot: false,
        })
        .collect()
}

fn always_config() -> BotConfig {
    BotConfig {
        addressing_mode: Some(AddressingMode::Always),
        ..BotConfig::default()
    }
}

#[tokio::test]
async fn always_mode_hello_builds_two_turn_window() {
    let hello = message(1, 7, "hello");
    let platform = Arc::new(MockPlatform::new().with_history(vec![hello.clone()]));
    let provider = Arc::new(StaticProvider::new("hi there"));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        always_config(),
        "gpt-4".to_string(),
        None,
    );

    let outcome = handler
        .handle_message(Arc::clone(&platform), &bot(), &hello)
        .await
        .unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-4");
    assert_eq!(
        requests[0].messages,
        vec![
            PromptTurn::system(CLASSIC_PERSONA),
            PromptTurn::user(Some("user7".to_string()), "hello"),
        ]
    );
    assert_eq!(
        outcome,
        HandleOutcome::Replied(DispatchOutcome { sent: 1, failed: 0 })
    );
    let sent = platform.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "hi there");
    assert_eq!(sent[0].reply_to, Some(MessageId(1)));
}

#[tokio::test]
async fn selective_mode_direct_mention_wins_in_large_guild() {
    let mut ping = message(2, 7, "<@1000> are you there?");
    ping.mentions = vec![BOT];
    let platform = Arc::new(
        MockPlatform::new()
            .with_roster(GUILD, roster(5))
            .with_history(vec![message(1, 8, "unrelated chatter"), ping.clone()]),
    );
    let provider = Arc::new(StaticProvider::new("yes"));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        BotConfig::default(),
        "gpt-4".to_string(),
        None,
    );
    handler.on_ready(platform.as_ref(), &bot(), &[GUILD]).await;
    assert_eq!(handler.membership().count(GUILD), 5);

    let outcome = handler
        .handle_message(Arc::clone(&platform), &bot(), &ping)
        .await
        .unwrap();

    assert!(matches!(outcome, HandleOutcome::Replied(_)));
    let turns = &provider.requests()[0].messages;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, "are you there?");
}

#[tokio::test]
async fn selective_mode_without_mention_in_large_guild_is_skipped() {
    let msg = message(1, 7, "anyone around?");
    let platform = Arc::new(
        MockPlatform::new()
            .with_roster(GUILD, roster(5))
            .with_history(vec![msg.clone()]),
    );
    let provider = Arc::new(StaticProvider::new("unused"));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        BotConfig::default(),
        "gpt-4".to_string(),
        None,
    );
    handler.on_ready(platform.as_ref(), &bot(), &[GUILD]).await;

    let outcome = handler
        .handle_message(Arc::clone(&platform), &bot(), &msg)
        .await
        .unwrap();

    assert_eq!(outcome, HandleOutcome::Skipped(SkipReason::NotAddressed));
    assert!(provider.requests().is_empty());
    assert_eq!(platform.typing_count(), 0);
}

#[tokio::test]
async fn selective_mode_two_member_guild_answers_without_mention() {
    let msg = message(1, 7, "how do I reverse a list?");
    let platform = Arc::new(
        MockPlatform::new()
            .with_roster(GUILD, roster(2))
            .with_history(vec![msg.clone()]),
    );
    let provider = Arc::new(StaticProvider::new("list.reverse()"));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        BotConfig::default(),
        "gpt-4".to_string(),
        None,
    );
    handler.on_ready(platform.as_ref(), &bot(), &[GUILD]).await;

    let outcome = handler
        .handle_message(Arc::clone(&platform), &bot(), &msg)
        .await
        .unwrap();

    assert!(matches!(outcome, HandleOutcome::Replied(_)));
}

#[tokio::test]
async fn completion_failure_sends_exactly_one_apology() {
    let msg = message(1, 7, "hello");
    let platform = Arc::new(MockPlatform::new().with_history(vec![msg.clone()]));
    let provider = Arc::new(FailingProvider::new());
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        always_config(),
        "gpt-4".to_string(),
        None,
    );

    let outcome = handler
        .handle_message(Arc::clone(&platform), &bot(), &msg)
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(
        outcome,
        HandleOutcome::Apologized(DispatchOutcome { sent: 1, failed: 0 })
    );
    let sent = platform.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, APOLOGY);
    assert_eq!(sent[0].reply_to, Some(MessageId(1)));
}

#[tokio::test]
async fn long_completion_is_sent_in_three_chunks() {
    let msg = message(1, 7, "write me an essay");
    let platform = Arc::new(MockPlatform::new().with_history(vec![msg.clone()]));
    let provider = Arc::new(StaticProvider::new("e".repeat(4500)));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        always_config(),
        "gpt-4".to_string(),
        None,
    );

    handler
        .handle_message(Arc::clone(&platform), &bot(), &msg)
        .await
        .unwrap();

    let lens: Vec<_> = platform.sent().iter().map(|s| s.content.len()).collect();
    assert_eq!(lens, vec![2000, 2000, 500]);
}

#[tokio::test]
async fn history_fetch_failure_aborts_without_reply() {
    let msg = message(1, 7, "hello");
    let platform = Arc::new(MockPlatform::new().failing_fetch());
    let provider = Arc::new(StaticProvider::new("unused"));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        always_config(),
        "gpt-4".to_string(),
        None,
    );

    let err = handler
        .handle_message(Arc::clone(&platform), &bot(), &msg)
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::Fetch(_)));
    assert!(provider.requests().is_empty());
    assert!(platform.sent().is_empty());
    // The indicator goes out before history is requested.
    assert_eq!(platform.typing_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn typing_indicator_runs_only_while_completion_is_pending() {
    let msg = message(1, 7, "think hard");
    let platform = Arc::new(MockPlatform::new().with_history(vec![msg.clone()]));
    let provider = Arc::new(StaticProvider::new("done").with_delay(Duration::from_secs(12)));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        always_config(),
        "gpt-4".to_string(),
        None,
    );

    handler
        .handle_message(Arc::clone(&platform), &bot(), &msg)
        .await
        .unwrap();
    let during = platform.typing_count();
    assert_eq!(during, 3);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(platform.typing_count(), during);
}

#[tokio::test]
async fn forum_preset_sends_headers_and_plain_channel_messages() {
    let mut first = message(1, 7, "<@1000> morning");
    first.mentions = vec![BOT];
    let second = message(2, 8, "morning all");
    let platform = Arc::new(MockPlatform::new().with_history(vec![first, second.clone()]));
    let provider = Arc::new(StaticProvider::new(
        "$$HEADER_BEGIN$$ CURTIME:2023-09-11T09:00:03.000Z, FROM:banter, $$HEADER_END$$ Morning!",
    ));
    let config = BotConfig {
        preset: Preset::Forum,
        ..BotConfig::default()
    };
    let handler = MessageHandler::new(Arc::clone(&provider), config, "gpt-4".to_string(), None);
    assert_eq!(handler.behavior().header_style, HeaderStyle::FullHeader);

    handler
        .handle_message(Arc::clone(&platform), &bot(), &second)
        .await
        .unwrap();

    let turns = &provider.requests()[0].messages;
    assert_eq!(turns[0].role, Role::System);
    assert!(turns[0].content.contains("$$HEADER_BEGIN$$"));
    assert_eq!(
        turns[1].content,
        "$$HEADER_BEGIN$$ CURTIME:2023-09-11T09:00:01.000Z, FROM:user7, TO:banter, $$HEADER_END$$ morning"
    );
    assert_eq!(
        turns[2].content,
        "$$HEADER_BEGIN$$ CURTIME:2023-09-11T09:00:02.000Z, FROM:user8, $$HEADER_END$$ morning all"
    );

    let sent = platform.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "Morning!");
    assert_eq!(sent[0].reply_to, None);
}

#[tokio::test]
async fn mention_when_someone_else_spoke_last() {
    let question = message(1, 7, "what's 2+2?");
    let platform = Arc::new(
        MockPlatform::new().with_history(vec![question.clone(), message(2, 8, "lol")]),
    );
    let provider = Arc::new(StaticProvider::new("4"));
    let config = BotConfig {
        addressing_mode: Some(AddressingMode::Always),
        mention_on_reply: Some(MentionPolicy::IfDifferentLastSpeaker),
        ..BotConfig::default()
    };
    let handler = MessageHandler::new(Arc::clone(&provider), config, "gpt-4".to_string(), None);

    handler
        .handle_message(Arc::clone(&platform), &bot(), &question)
        .await
        .unwrap();

    assert_eq!(platform.sent()[0].content, "<@7> 4");
}

#[tokio::test]
async fn bot_and_unwatched_messages_never_reach_the_model() {
    let platform = Arc::new(MockPlatform::new());
    let provider = Arc::new(StaticProvider::new("unused"));
    let handler = MessageHandler::new(
        Arc::clone(&provider),
        always_config(),
        "gpt-4".to_string(),
        None,
    );

    let mut from_bot = message(1, 55, "beep");
    from_bot.author.bot = true;
    let mut elsewhere = message(2, 7, "hello");
    elsewhere.channel.name = Some("random".to_string());
    let ignored = message(3, 7, "!ping");

    for (msg, reason) in [
        (from_bot, SkipReason::AutomatedAuthor),
        (elsewhere, SkipReason::UnwatchedChannel),
        (ignored, SkipReason::IgnorePrefix),
    ] {
        let outcome = handler
            .handle_message(Arc::clone(&platform), &bot(), &msg)
            .await
            .unwrap();
        assert_eq!(outcome, HandleOutcome::Skipped(reason));
    }
    assert!(provider.requests().is_empty());
    assert!(platform.fetch_limits().is_empty());
}

#[tokio::test]
async fn automated_member_events_leave_counts_alone() {
    let provider = Arc::new(StaticProvider::new("unused"));
    let handler = MessageHandler::new(provider, BotConfig::default(), "gpt-4".to_string(), None);

    handler.on_member_join(GUILD, true);
    handler.on_member_join(GUILD, false);
    handler.on_member_leave(GUILD, true);
    handler.on_member_leave(CommunityId(2), false);

    assert_eq!(handler.membership().count(GUILD), 1);
    assert_eq!(handler.membership().count(CommunityId(2)), 0);
    assert_eq!(handler.membership().count(CommunityId(3)), 0);
}
