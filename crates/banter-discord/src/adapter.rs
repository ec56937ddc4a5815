use std::sync::{Arc, OnceLock};

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::info;

use banter_agent::pipeline::MessageHandler;
use banter_agent::provider::LlmProvider;
use banter_core::config::DiscordConfig;

use crate::error::DiscordError;
use crate::handler::DiscordHandler;

/// Discord channel adapter.
///
/// Wraps a serenity `Client` and drives the event loop. Gateway errors are
/// returned to the caller; there is no reconnect loop.
pub struct DiscordAdapter {
    pipeline: Arc<MessageHandler<dyn LlmProvider>>,
    config: DiscordConfig,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig, pipeline: Arc<MessageHandler<dyn LlmProvider>>) -> Self {
        Self {
            pipeline,
            config: config.clone(),
        }
    }

    /// Gateway intents the pipeline depends on. Member events and message
    /// content are privileged and must be enabled for the application.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    /// Connect to Discord and process events until the gateway stops.
    pub async fn run(self) -> Result<(), DiscordError> {
        let mut client = self.build_client().await?;
        info!("Discord: gateway connecting");
        client.start().await?;
        info!("Discord: gateway stopped");
        Ok(())
    }

    async fn build_client(&self) -> Result<Client, DiscordError> {
        if self.config.bot_token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        let handler = DiscordHandler {
            pipeline: Arc::clone(&self.pipeline),
            bot: OnceLock::new(),
        };

        Ok(Client::builder(&self.config.bot_token, Self::intents())
            .event_handler(handler)
            .await?)
    }
}
