use std::future::Future;

use forum_core::{CleanedPost, Normalizer, PostId, RawPost, RawTopic, TopicId, TopicSummary};
use forum_logging::{forum_debug, forum_info, forum_warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{FetchError, QueueClass, Scheduler, Task};

const TIMINGS_PATH: &str = "/topics/timings";
const LATEST_PATH: &str = "/latest.json?no_definitions=true";
const POSTS_PATH: &str = "/posts";

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    /// Identifiers per request for read receipts and post details.
    pub batch_size: usize,
    /// Ceiling on pages followed by a cursor loop.
    pub max_pages: usize,
    /// Dwell time reported for each post marked read.
    pub read_time_ms: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            batch_size: 200,
            max_pages: 1_000,
            read_time_ms: 4_242,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("unexpected response: {0}")]
    Protocol(String),
    #[error("item callback failed: {0}")]
    Item(anyhow::Error),
    #[error("stopped after {0} pages without reaching the last one")]
    PageLimit(usize),
}

/// High-level forum operations over a [`Scheduler`].
///
/// The multi-page drivers only ever wait on the scheduler or on the item
/// callback; items of a batch are handed over one at a time, each callback
/// awaited before the next item, and the first callback error ends the loop.
#[derive(Clone)]
pub struct ForumClient {
    scheduler: Scheduler,
    normalizer: Normalizer,
    settings: PaginationSettings,
}

impl ForumClient {
    pub fn new(scheduler: Scheduler, normalizer: Normalizer, settings: PaginationSettings) -> Self {
        Self {
            scheduler,
            normalizer,
            settings,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn batch_size(&self) -> usize {
        self.settings.batch_size.max(1)
    }

    /// Marks posts of a topic as read, one request per batch.
    ///
    /// A failed batch does not stop the remaining ones; the first failure is
    /// returned once every batch has been submitted. Returns the batch count.
    pub async fn read_posts(
        &self,
        class: QueueClass,
        topic_id: TopicId,
        post_numbers: &[u64],
    ) -> Result<usize, ClientError> {
        let mut batches = 0;
        let mut first_error = None;
        for chunk in post_numbers.chunks(self.batch_size()) {
            let form = timings_form(topic_id, chunk, self.settings.read_time_ms);
            if let Err(err) = self.scheduler.request(class, Task::post(TIMINGS_PATH, form)).await {
                forum_warn!("Read receipt batch for topic {} failed: {}", topic_id, err);
                first_error.get_or_insert(err);
            }
            batches += 1;
        }
        forum_debug!(
            "Submitted {} read receipts for topic {} in {} batches",
            post_numbers.len(),
            topic_id,
            batches
        );
        match first_error {
            Some(err) => Err(ClientError::Transport(err)),
            None => Ok(batches),
        }
    }

    /// Fetches every post of a topic: the id stream first, then details in
    /// batches. Returns how many posts were delivered.
    pub async fn for_each_post<F, Fut>(
        &self,
        class: QueueClass,
        topic_id: TopicId,
        mut on_post: F,
    ) -> Result<usize, ClientError>
    where
        F: FnMut(CleanedPost) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let locator = format!("/t/{topic_id}.json?include_raw=1");
        let body = self.require_body(class, Task::get(locator)).await?;
        let stream: Vec<PostId> = extract(&body, "/post_stream/stream")?;

        let mut delivered = 0;
        for batch in stream.chunks(self.batch_size()) {
            let body = self
                .require_body(class, Task::get(posts_locator(topic_id, batch)))
                .await?;
            let posts: Vec<RawPost> = extract(&body, "/post_stream/posts")?;
            for post in posts {
                on_post(self.normalizer.normalize_post(post))
                    .await
                    .map_err(ClientError::Item)?;
                delivered += 1;
            }
        }
        forum_info!("Delivered {} posts of topic {}", delivered, topic_id);
        Ok(delivered)
    }

    /// Walks the latest-topics listing until the forum stops offering a next page.
    pub async fn for_each_latest_topic<F, Fut>(
        &self,
        class: QueueClass,
        on_topic: F,
    ) -> Result<usize, ClientError>
    where
        F: FnMut(TopicSummary) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.for_each_topic_from(class, LATEST_PATH, on_topic).await
    }

    /// Walks any topic listing starting at `locator`, following
    /// `topic_list.more_topics_url` until it is absent or empty.
    pub async fn for_each_topic_from<F, Fut>(
        &self,
        class: QueueClass,
        locator: &str,
        mut on_topic: F,
    ) -> Result<usize, ClientError>
    where
        F: FnMut(TopicSummary) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut next = Some(locator.to_string());
        let mut pages = 0;
        let mut delivered = 0;
        while let Some(locator) = next.take() {
            if pages >= self.settings.max_pages {
                forum_warn!("Listing still continues after {} pages; giving up", pages);
                return Err(ClientError::PageLimit(pages));
            }
            pages += 1;
            let body = self.require_body(class, Task::get(locator)).await?;
            let topics: Vec<RawTopic> = extract(&body, "/topic_list/topics")?;
            for topic in topics {
                on_topic(self.normalizer.normalize_topic(topic))
                    .await
                    .map_err(ClientError::Item)?;
                delivered += 1;
            }
            next = body
                .pointer("/topic_list/more_topics_url")
                .and_then(Value::as_str)
                .filter(|more| !more.is_empty())
                .map(json_locator);
        }
        forum_debug!("Listing exhausted after {} pages, {} topics", pages, delivered);
        Ok(delivered)
    }

    pub async fn get_post(&self, class: QueueClass, post_id: PostId) -> Result<CleanedPost, ClientError> {
        let body = self
            .require_body(class, Task::get(format!("/posts/{post_id}.json")))
            .await?;
        let post: RawPost = extract(&body, "")?;
        Ok(self.normalizer.normalize_post(post))
    }

    /// Posts `raw` into a topic, optionally as a reply to a post number.
    pub async fn create_post(
        &self,
        class: QueueClass,
        topic_id: TopicId,
        reply_to: Option<u64>,
        raw: &str,
    ) -> Result<CleanedPost, ClientError> {
        let mut form = vec![
            ("topic_id".to_string(), topic_id.to_string()),
            ("raw".to_string(), raw.to_string()),
        ];
        if let Some(number) = reply_to {
            form.push(("reply_to_post_number".to_string(), number.to_string()));
        }
        let body = self.require_body(class, Task::post(POSTS_PATH, form)).await?;
        let post: RawPost = extract(&body, "")?;
        forum_info!("Created post {} in topic {}", post.id, topic_id);
        Ok(self.normalizer.normalize_post(post))
    }

    async fn require_body(&self, class: QueueClass, task: Task) -> Result<Value, ClientError> {
        let locator = task.locator.clone();
        self.scheduler
            .request(class, task)
            .await?
            .ok_or_else(|| ClientError::Protocol(format!("no JSON body from {locator}")))
    }
}

fn extract<T: DeserializeOwned>(body: &Value, pointer: &str) -> Result<T, ClientError> {
    let value = body
        .pointer(pointer)
        .ok_or_else(|| ClientError::Protocol(format!("response has no {pointer}")))?;
    T::deserialize(value).map_err(|err| ClientError::Protocol(format!("{pointer}: {err}")))
}

fn timings_form(topic_id: TopicId, post_numbers: &[u64], read_time_ms: u64) -> Vec<(String, String)> {
    let read_time = read_time_ms.to_string();
    let mut form = Vec::with_capacity(post_numbers.len() + 2);
    form.push(("topic_id".to_string(), topic_id.to_string()));
    form.push(("topic_time".to_string(), read_time.clone()));
    form.extend(
        post_numbers
            .iter()
            .map(|number| (format!("timings[{number}]"), read_time.clone())),
    );
    form
}

fn posts_locator(topic_id: TopicId, post_ids: &[PostId]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("include_raw", "1");
    for id in post_ids {
        query.append_pair("post_ids[]", &id.to_string());
    }
    format!("/t/{topic_id}/posts.json?{}", query.finish())
}

/// Listing cursors come back as page URLs (`/latest?page=1`); the JSON
/// variant of the same page lives at `/latest.json?page=1`.
fn json_locator(more: &str) -> String {
    let (path, query) = match more.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (more, None),
    };
    let path = if path.ends_with(".json") {
        path.to_string()
    } else {
        format!("{path}.json")
    };
    match query {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}
