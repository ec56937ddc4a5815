//! Message pipeline: everything between an inbound platform event and the
//! messages the bot sends back.
//!
//! The pipeline never talks to a concrete chat platform. Adapters implement
//! [`ChatPlatform`] and feed events into a [`MessageHandler`].

pub mod addressing;
pub mod dispatch;
pub mod handler;
pub mod header;
pub mod membership;
pub mod platform;
pub mod sanitize;
pub mod typing;
pub mod window;

pub use handler::{HandleOutcome, MessageHandler};
pub use membership::MembershipTracker;
pub use platform::{ChatPlatform, PlatformError};
