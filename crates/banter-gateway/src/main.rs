use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;

use banter_agent::openai::OpenAiProvider;
use banter_agent::pipeline::MessageHandler;
use banter_agent::provider::LlmProvider;
use banter_core::config::BanterConfig;
use banter_discord::DiscordAdapter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win over it.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "banter_gateway=info,banter_agent=info,banter_discord=info".into()
            }),
        )
        .init();

    // load config: BANTER_CONFIG env > ~/.banter/banter.toml
    let config_path = std::env::var("BANTER_CONFIG").ok();
    let config = BanterConfig::load(config_path.as_deref()).context("loading configuration")?;

    let behavior = config.bot.behavior();
    info!(
        preset = ?config.bot.preset,
        addressing = ?behavior.addressing_mode,
        header = ?behavior.header_style,
        channels = ?config.bot.channels,
        model = %config.openai.model,
        "configuration loaded"
    );

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        config.openai.api_key.clone(),
        Some(config.openai.base_url.clone()),
    ));
    let pipeline: Arc<MessageHandler<dyn LlmProvider>> = Arc::new(MessageHandler::new(
        provider,
        config.bot.clone(),
        config.openai.model.clone(),
        config.openai.max_tokens,
    ));

    DiscordAdapter::new(&config.discord, pipeline)
        .run()
        .await
        .context("discord gateway")?;
    Ok(())
}
