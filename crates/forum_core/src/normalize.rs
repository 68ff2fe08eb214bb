use crate::clean::strip_quotes;
use crate::config::BotConfig;
use crate::item::{CleanedPost, RawPost, RawTopic, TopicSummary};
use crate::links::{post_url, reply_url, topic_url};
use crate::trust::{classify_trust, TrustPolicy};

/// Turns raw forum records into consumption-ready ones.
///
/// Posts go through trust classification, link synthesis and quote stripping,
/// in that order. Every derived field is recomputed from the raw record, so
/// running [`Normalizer::renormalize`] any number of times gives the same result.
#[derive(Debug, Clone)]
pub struct Normalizer {
    base_url: String,
    trust: TrustPolicy,
}

impl Normalizer {
    pub fn new(config: &BotConfig) -> Self {
        Self::with_policy(&config.base_url, TrustPolicy::from_config(config))
    }

    pub fn with_policy(base_url: &str, trust: TrustPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            trust,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn normalize_post(&self, post: RawPost) -> CleanedPost {
        let trust = classify_trust(&post, &self.trust);
        let url = post_url(&self.base_url, &post.topic_slug, post.topic_id, post.post_number);
        let reply_url = reply_url(
            &self.base_url,
            &post.topic_slug,
            post.topic_id,
            post.reply_to_post_number,
        );
        let cleaned = strip_quotes(&post.raw);
        CleanedPost {
            post,
            url,
            reply_url,
            trust,
            cleaned,
        }
    }

    /// Recomputes every derived field of an already cleaned post from its raw record.
    pub fn renormalize(&self, cleaned: &mut CleanedPost) {
        let post = std::mem::take(&mut cleaned.post);
        *cleaned = self.normalize_post(post);
    }

    pub fn normalize_topic(&self, topic: RawTopic) -> TopicSummary {
        let url = topic_url(&self.base_url, &topic.slug, topic.id);
        TopicSummary { topic, url }
    }
}
