//! Forum core: network-free data model, content normalization and command parsing.
mod clean;
mod command;
mod config;
mod item;
mod links;
mod normalize;
mod trust;

pub use clean::strip_quotes;
pub use command::{CommandParser, ParsedCommand, SHORT_FORM_TRIGGER};
pub use config::BotConfig;
pub use item::{CleanedPost, PostId, RawPost, RawTopic, TopicId, TopicSummary};
pub use links::{post_url, reply_url, topic_url};
pub use normalize::Normalizer;
pub use trust::{classify_trust, TrustLevel, TrustPolicy};
