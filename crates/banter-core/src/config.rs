use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{BanterError, Result};

/// Hard per-message character limit on Discord.
pub const PLATFORM_MESSAGE_LIMIT: usize = 2000;
/// Upper bound on fetched history, so a window never exceeds this plus the
/// system turn.
pub const MAX_HISTORY_LIMIT: usize = 10;

/// Top-level config (banter.toml + BANTER_* env overrides + credential env vars).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BanterConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Filled from `DISCORD_TOKEN` when set.
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Filled from `OPENAI_API_KEY` when set.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Left to the API default when unset.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_model(),
            max_tokens: None,
        }
    }
}

/// Which of the two shipped bot personalities to start from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Terse sarcastic assistant that only answers when addressed.
    #[default]
    Classic,
    /// Multi-user forum participant fed with metadata headers.
    Forum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    /// Persona text only.
    Character,
    /// Persona text followed by the header format contract.
    CharacterPlusFixedFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingMode {
    /// Every message in a watched channel is for the bot.
    Always,
    /// Decide per message from mentions and community size.
    Selective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderStyle {
    None,
    /// Header carrying only the timestamp.
    UtcPrefix,
    /// Header carrying timestamp, sender and (when known) recipient.
    FullHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MentionPolicy {
    Never,
    /// Mention the author when someone else spoke last in the channel.
    IfDifferentLastSpeaker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyStyle {
    /// Threaded reply referencing the originating message.
    Reply,
    /// Plain message in the channel.
    Send,
}

/// Bot behaviour knobs. Unset knobs fall back to the preset's choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub preset: Preset,
    /// Channel names the bot listens to.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Messages starting with this are ignored unless they mention the bot.
    #[serde(default = "default_ignore_prefix")]
    pub ignore_prefix: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_typing_interval_secs")]
    pub typing_interval_secs: u64,
    /// When true, direct messages are handled even though they carry no
    /// channel name to match against `channels`.
    #[serde(default)]
    pub dm_allowed: bool,
    /// Overrides the preset's persona text.
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub prompt_mode: Option<PromptMode>,
    #[serde(default)]
    pub addressing_mode: Option<AddressingMode>,
    #[serde(default)]
    pub header_style: Option<HeaderStyle>,
    #[serde(default)]
    pub mention_on_reply: Option<MentionPolicy>,
    #[serde(default)]
    pub reply_style: Option<ReplyStyle>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            channels: default_channels(),
            ignore_prefix: default_ignore_prefix(),
            history_limit: default_history_limit(),
            chunk_size: default_chunk_size(),
            typing_interval_secs: default_typing_interval_secs(),
            dm_allowed: false,
            persona: None,
            prompt_mode: None,
            addressing_mode: None,
            header_style: None,
            mention_on_reply: None,
            reply_style: None,
        }
    }
}

/// Fully resolved behaviour, after applying preset defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Behavior {
    pub prompt_mode: PromptMode,
    pub addressing_mode: AddressingMode,
    pub header_style: HeaderStyle,
    pub mention_on_reply: MentionPolicy,
    pub reply_style: ReplyStyle,
}

impl Behavior {
    pub fn for_preset(preset: Preset) -> Self {
        match preset {
            Preset::Classic => Self {
                prompt_mode: PromptMode::Character,
                addressing_mode: AddressingMode::Selective,
                header_style: HeaderStyle::None,
                mention_on_reply: MentionPolicy::Never,
                reply_style: ReplyStyle::Reply,
            },
            Preset::Forum => Self {
                prompt_mode: PromptMode::CharacterPlusFixedFormat,
                addressing_mode: AddressingMode::Always,
                header_style: HeaderStyle::FullHeader,
                mention_on_reply: MentionPolicy::Never,
                reply_style: ReplyStyle::Send,
            },
        }
    }
}

impl BotConfig {
    pub fn behavior(&self) -> Behavior {
        let base = Behavior::for_preset(self.preset);
        Behavior {
            prompt_mode: self.prompt_mode.unwrap_or(base.prompt_mode),
            addressing_mode: self.addressing_mode.unwrap_or(base.addressing_mode),
            header_style: self.header_style.unwrap_or(base.header_style),
            mention_on_reply: self.mention_on_reply.unwrap_or(base.mention_on_reply),
            reply_style: self.reply_style.unwrap_or(base.reply_style),
        }
    }

    pub fn watches(&self, channel_name: &str) -> bool {
        self.channels.iter().any(|c| c == channel_name)
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_model() -> String {
    "gpt-4".to_string()
}
fn default_channels() -> Vec<String> {
    vec!["general".to_string(), "bots".to_string()]
}
fn default_ignore_prefix() -> String {
    "!".to_string()
}
fn default_history_limit() -> usize {
    10
}
fn default_chunk_size() -> usize {
    PLATFORM_MESSAGE_LIMIT
}
fn default_typing_interval_secs() -> u64 {
    5
}

impl BanterConfig {
    /// Load config from a TOML file with BANTER_* env var overrides, then
    /// fill credentials from `DISCORD_TOKEN` / `OPENAI_API_KEY`.
    ///
    /// A missing TOML file is not an error; everything has a default except
    /// the two credentials, which [`BanterConfig::validate`] insists on.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: BanterConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("BANTER_").split("__"))
            .extract()
            .map_err(|e| BanterError::Config(e.to_string()))?;

        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            config.discord.bot_token = token;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(BanterError::Config(
                "no Discord bot token (set DISCORD_TOKEN)".to_string(),
            ));
        }
        if self.openai.api_key.trim().is_empty() {
            return Err(BanterError::Config(
                "no OpenAI API key (set OPENAI_API_KEY)".to_string(),
            ));
        }
        if self.bot.chunk_size == 0 || self.bot.chunk_size > PLATFORM_MESSAGE_LIMIT {
            return Err(BanterError::Config(format!(
                "bot.chunk_size must be in 1..={PLATFORM_MESSAGE_LIMIT}, got {}",
                self.bot.chunk_size
            )));
        }
        if self.bot.history_limit == 0 || self.bot.history_limit > MAX_HISTORY_LIMIT {
            return Err(BanterError::Config(format!(
                "bot.history_limit must be in 1..={MAX_HISTORY_LIMIT}, got {}",
                self.bot.history_limit
            )));
        }
        if self.bot.typing_interval_secs == 0 {
            return Err(BanterError::Config(
                "bot.typing_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.banter/banter.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_classic_bot() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.channels, vec!["general", "bots"]);
        assert_eq!(cfg.ignore_prefix, "!");
        assert_eq!(cfg.history_limit, 10);
        assert_eq!(cfg.chunk_size, 2000);
        assert_eq!(cfg.typing_interval_secs, 5);
        assert_eq!(cfg.behavior(), Behavior::for_preset(Preset::Classic));
        assert_eq!(OpenAiConfig::default().model, "gpt-4");
    }

    #[test]
    fn explicit_knobs_override_preset() {
        let cfg = BotConfig {
            preset: Preset::Forum,
            addressing_mode: Some(AddressingMode::Selective),
            mention_on_reply: Some(MentionPolicy::IfDifferentLastSpeaker),
            ..BotConfig::default()
        };
        let b = cfg.behavior();
        assert_eq!(b.addressing_mode, AddressingMode::Selective);
        assert_eq!(b.mention_on_reply, MentionPolicy::IfDifferentLastSpeaker);
        assert_eq!(b.header_style, HeaderStyle::FullHeader);
        assert_eq!(b.reply_style, ReplyStyle::Send);
    }

    #[test]
    fn watches_exact_names_only() {
        let cfg = BotConfig::default();
        assert!(cfg.watches("general"));
        assert!(!cfg.watches("General"));
        assert!(!cfg.watches("random"));
    }

    #[test]
    fn load_reads_toml_and_credentials_from_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "banter.toml",
                r#"
                [bot]
                preset = "forum"
                channels = ["test0", "test1"]
                header_style = "utc-prefix"

                [openai]
                model = "gpt-4o"
                "#,
            )?;
            jail.set_env("DISCORD_TOKEN", "discord-secret");
            jail.set_env("OPENAI_API_KEY", "sk-test");

            let cfg = BanterConfig::load(Some("banter.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.discord.bot_token, "discord-secret");
            assert_eq!(cfg.openai.api_key, "sk-test");
            assert_eq!(cfg.openai.model, "gpt-4o");
            assert_eq!(cfg.bot.channels, vec!["test0", "test1"]);
            let b = cfg.bot.behavior();
            assert_eq!(b.header_style, HeaderStyle::UtcPrefix);
            assert_eq!(b.addressing_mode, AddressingMode::Always);
            Ok(())
        });
    }

    #[test]
    fn prefixed_env_overrides_nested_fields() {
        Jail::expect_with(|jail| {
            jail.set_env("DISCORD_TOKEN", "t");
            jail.set_env("OPENAI_API_KEY", "k");
            jail.set_env("BANTER_BOT__IGNORE_PREFIX", "?");
            jail.set_env("BANTER_BOT__HISTORY_LIMIT", "6");

            let cfg = BanterConfig::load(Some("missing.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.bot.ignore_prefix, "?");
            assert_eq!(cfg.bot.history_limit, 6);
            Ok(())
        });
    }

    #[test]
    fn missing_credentials_fail_validation() {
        let cfg = BanterConfig::default();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, BanterError::Config(_)));
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn oversized_chunks_fail_validation() {
        let mut cfg = BanterConfig::default();
        cfg.discord.bot_token = "t".to_string();
        cfg.openai.api_key = "k".to_string();
        cfg.bot.chunk_size = 2001;
        assert!(cfg.validate().is_err());
        cfg.bot.chunk_size = 2000;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn history_limit_is_capped_at_ten() {
        let mut cfg = BanterConfig::default();
        cfg.discord.bot_token = "t".to_string();
        cfg.openai.api_key = "k".to_string();
        cfg.bot.history_limit = 11;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("history_limit"));
        cfg.bot.history_limit = 10;
        assert!(cfg.validate().is_ok());
        cfg.bot.history_limit = 0;
        assert!(cfg.validate().is_err());
    }
}
