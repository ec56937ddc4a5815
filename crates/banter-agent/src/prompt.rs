//! System prompt texts.
//!
//! The system turn is persona text, optionally followed by a format contract
//! that explains the metadata header prepended to each history message.

use banter_core::config::{BotConfig, Preset, PromptMode};

use crate::pipeline::header::{HEADER_BEGIN, HEADER_END};

pub const CLASSIC_PERSONA: &str = "You are a skillful assistant that goes straight to the point \
and with an occasional touch of sarcasm.";

pub const FORUM_PERSONA: &str = "You are a skillful highly logical assistant that goes straight \
to the point, with a tiny bit of occasional sarcasm.";

/// Default persona for a preset.
pub fn persona_for(preset: Preset) -> &'static str {
    match preset {
        Preset::Classic => CLASSIC_PERSONA,
        Preset::Forum => FORUM_PERSONA,
    }
}

/// Instructions describing the header format to the model.
pub fn format_contract() -> String {
    format!(
        "You are operating in a forum, where multiple users can interact with you. \
Most messages will include a header (metadata) at the start with the format \
{HEADER_BEGIN} CURTIME:<timestamp>, FROM:<username>, TO:<username>, {HEADER_END} \
Additional fields may be present in the header for added context. \
Never generate the header yourself. \
Given the context, you should determine if you need to reply to a message. \
You should also determine if a message should have a direct mention to a user, \
to resolve any ambiguity, like when other users are involved in the discussion. \
When mentioning a user, use its plain name, do not use metadata format outside of the header. \
If you don't wish to reply to a message, just produce empty content."
    )
}

/// Assemble the system turn content.
pub fn build_system_prompt(persona: &str, mode: PromptMode) -> String {
    match mode {
        PromptMode::Character => persona.to_string(),
        PromptMode::CharacterPlusFixedFormat => format!("{}\n{}", persona, format_contract()),
    }
}

/// System prompt for a bot config: configured persona (or the preset's),
/// shaped by the resolved prompt mode.
pub fn system_prompt_for(config: &BotConfig) -> String {
    let persona = config
        .persona
        .as_deref()
        .unwrap_or_else(|| persona_for(config.preset));
    build_system_prompt(persona, config.behavior().prompt_mode)
}
