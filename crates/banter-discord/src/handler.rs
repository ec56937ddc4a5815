use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::Member as GuildMember;
use serenity::model::id::GuildId;
use serenity::model::user::User;
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use banter_agent::pipeline::MessageHandler;
use banter_agent::provider::LlmProvider;
use banter_core::types::{BotIdentity, CommunityId, UserId};

use crate::platform::DiscordPlatform;

/// Serenity event handler wired to the message pipeline.
pub struct DiscordHandler {
    pub pipeline: Arc<MessageHandler<dyn LlmProvider>>,
    pub bot: OnceLock<BotIdentity>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let identity = BotIdentity {
            id: UserId(ready.user.id.get()),
            name: ready.user.name.clone(),
        };
        info!(name = %identity.name, "Logged in as {}", identity.name);
        self.bot.set(identity.clone()).ok();

        let communities: Vec<CommunityId> =
            ready.guilds.iter().map(|g| CommunityId(g.id.get())).collect();
        let platform = DiscordPlatform::from_context(&ctx);
        self.pipeline
            .on_ready(&platform, &identity, &communities)
            .await;
    }

    async fn guild_member_addition(&self, _ctx: Context, member: GuildMember) {
        self.pipeline
            .on_member_join(CommunityId(member.guild_id.get()), member.user.bot);
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        user: User,
        _member: Option<GuildMember>,
    ) {
        self.pipeline
            .on_member_leave(CommunityId(guild_id.get()), user.bot);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Events can arrive before `ready` on a fresh shard.
        let Some(bot) = self.bot.get() else {
            debug!(message = %msg.id, "message before ready, ignoring");
            return;
        };

        let platform = Arc::new(DiscordPlatform::from_context(&ctx));
        let channel = match platform.channel_ref(msg.channel_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(channel = %msg.channel_id, error = %e, "channel lookup failed");
                return;
            }
        };
        let raw = platform.to_raw_message(&msg, &channel);

        if let Err(e) = self.pipeline.handle_message(platform, bot, &raw).await {
            warn!(
                channel = %msg.channel_id,
                message = %msg.id,
                error = %e,
                "message handling failed"
            );
        }
    }
}
