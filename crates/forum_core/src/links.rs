use crate::item::TopicId;

fn topic_prefix(base_url: &str, slug: &str, topic_id: TopicId) -> String {
    format!("{}/t/{slug}/{topic_id}", base_url.trim_end_matches('/'))
}

/// `{base}/t/{slug}/{topic_id}`
pub fn topic_url(base_url: &str, slug: &str, topic_id: TopicId) -> String {
    topic_prefix(base_url, slug, topic_id)
}

/// `{base}/t/{slug}/{topic_id}/{post_number}`
pub fn post_url(base_url: &str, slug: &str, topic_id: TopicId, post_number: u64) -> String {
    format!("{}/{post_number}", topic_prefix(base_url, slug, topic_id))
}

/// Link to the post being replied to; the ordinal is left empty for top-level posts.
pub fn reply_url(base_url: &str, slug: &str, topic_id: TopicId, reply_to: Option<u64>) -> String {
    let target = reply_to.map(|n| n.to_string()).unwrap_or_default();
    format!("{}/{target}", topic_prefix(base_url, slug, topic_id))
}
