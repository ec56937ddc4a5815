pub mod mock;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod provider;
