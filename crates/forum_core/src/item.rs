use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::trust::TrustLevel;

pub type PostId = u64;
pub type TopicId = u64;

/// A post record as returned by the forum, before normalization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPost {
    pub id: PostId,
    pub username: String,
    pub topic_id: TopicId,
    pub topic_slug: String,
    pub post_number: u64,
    pub reply_to_post_number: Option<u64>,
    pub raw: String,
    pub trust_level: u8,
    pub admin: bool,
    pub moderator: bool,
    pub staff: bool,
    /// Every attribute the agent does not interpret, kept for consumers.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A post after trust classification, link synthesis and quote stripping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedPost {
    pub post: RawPost,
    pub url: String,
    pub reply_url: String,
    pub trust: TrustLevel,
    /// `post.raw` with quote blocks and fenced code removed.
    pub cleaned: String,
}

/// A topic record from a listing page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTopic {
    pub id: TopicId,
    pub slug: String,
    pub title: String,
    pub posts_count: u64,
    pub highest_post_number: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummary {
    pub topic: RawTopic,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::RawPost;

    #[test]
    fn unknown_post_attributes_are_preserved() {
        let json = r#"{"id":7,"username":"alice","topic_id":3,"post_number":2,"raw":"hi","yours":true}"#;
        let post: RawPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, 7);
        assert_eq!(post.reply_to_post_number, None);
        assert_eq!(post.extra.get("yours"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn null_reply_target_deserializes_as_none() {
        let json = r#"{"id":1,"reply_to_post_number":null}"#;
        let post: RawPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.reply_to_post_number, None);
    }
}
