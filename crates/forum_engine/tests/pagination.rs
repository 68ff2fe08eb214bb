use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use forum_core::{BotConfig, Normalizer};
use forum_engine::{
    ClientError, FailureKind, ForumClient, PaginationSettings, QueueClass, ReqwestTransport,
    Scheduler, SchedulerSettings, TransportSettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(forum_logging::initialize_for_tests);
}

fn client(server: &MockServer, settings: PaginationSettings) -> ForumClient {
    let transport = Arc::new(ReqwestTransport::new(TransportSettings::default()).unwrap());
    let scheduler = Scheduler::new(SchedulerSettings::with_base_url(server.uri()), transport);
    let config = BotConfig {
        base_url: server.uri(),
        ..BotConfig::default()
    };
    ForumClient::new(scheduler, Normalizer::new(&config), settings)
}

/// Answers a post-details request with one post per requested id.
struct PostsById;

impl Respond for PostsById {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let posts: Vec<_> = request
            .url
            .query_pairs()
            .filter(|(key, _)| key == "post_ids[]")
            .map(|(_, value)| {
                let id: u64 = value.parse().unwrap();
                json!({
                    "id": id,
                    "username": "alice",
                    "topic_id": 12,
                    "topic_slug": "long-thread",
                    "post_number": id,
                    "raw": format!("[quote]old[/quote]post {id}"),
                    "trust_level": 1,
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "post_stream": { "posts": posts } }))
    }
}

async fn mount_topic(server: &MockServer, post_count: u64, expected_detail_calls: u64) {
    let stream: Vec<u64> = (1..=post_count).collect();
    Mock::given(method("GET"))
        .and(path("/t/12.json"))
        .and(query_param("include_raw", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "post_stream": { "stream": stream } })),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/t/12/posts.json"))
        .respond_with(PostsById)
        .expect(expected_detail_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn read_receipts_are_split_into_batches_of_200() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/topics/timings"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, PaginationSettings::default());
    let post_numbers: Vec<u64> = (1..=450).collect();
    let batches = client
        .read_posts(QueueClass::Core, 7, &post_numbers)
        .await
        .expect("all batches ok");
    assert_eq!(batches, 3);

    let requests = server.received_requests().await.unwrap();
    let sizes: Vec<usize> = requests
        .iter()
        .map(|request| {
            String::from_utf8_lossy(&request.body)
                .matches("timings%5B")
                .count()
        })
        .collect();
    assert_eq!(sizes, vec![200, 200, 50]);
    assert!(String::from_utf8_lossy(&requests[2].body).contains("timings%5B450%5D=4242"));
}

#[tokio::test]
async fn read_receipt_failure_is_reported_after_all_batches() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/topics/timings"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server, PaginationSettings::default());
    let post_numbers: Vec<u64> = (1..=201).collect();
    let err = client
        .read_posts(QueueClass::Core, 7, &post_numbers)
        .await
        .unwrap_err();
    match err {
        ClientError::Transport(fetch) => assert_eq!(fetch.kind, FailureKind::HttpStatus(429)),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn all_posts_arrive_cleaned_and_in_order() {
    init_logging();
    let server = MockServer::start().await;
    mount_topic(&server, 250, 2).await;

    let client = client(&server, PaginationSettings::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let delivered = client
        .for_each_post(QueueClass::Core, 12, |post| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push((post.post.id, post.cleaned, post.url));
                anyhow::Ok(())
            }
        })
        .await
        .expect("driver ok");

    assert_eq!(delivered, 250);
    let seen = seen.lock().unwrap();
    let ids: Vec<u64> = seen.iter().map(|(id, _, _)| *id).collect();
    assert_eq!(ids, (1..=250).collect::<Vec<_>>());
    assert_eq!(seen[0].1, "post 1");
    assert_eq!(seen[0].2, format!("{}/t/long-thread/12/1", server.uri()));
}

#[tokio::test]
async fn item_callbacks_are_awaited_one_at_a_time() {
    init_logging();
    let server = MockServer::start().await;
    mount_topic(&server, 5, 1).await;

    let client = client(&server, PaginationSettings::default());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    client
        .for_each_post(QueueClass::Core, 12, |_post| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        })
        .await
        .unwrap();

    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn item_callback_error_aborts_remaining_batches() {
    init_logging();
    let server = MockServer::start().await;
    // 250 ids in batches of 200: the abort happens inside the first batch.
    mount_topic(&server, 250, 1).await;

    let client = client(&server, PaginationSettings::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let err = client
        .for_each_post(QueueClass::Core, 12, |post| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if post.post.id == 3 {
                    anyhow::bail!("cannot handle post {}", post.post.id);
                }
                anyhow::Ok(())
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Item(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn topic_without_stream_is_a_protocol_error() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/t/12.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login required</html>"))
        .mount(&server)
        .await;

    let client = client(&server, PaginationSettings::default());
    let err = client
        .for_each_post(QueueClass::Core, 12, |_post| async { anyhow::Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)));
}

fn topic_page(ids: &[u64], more: Option<&str>) -> serde_json::Value {
    let topics: Vec<_> = ids
        .iter()
        .map(|id| json!({ "id": id, "slug": format!("topic-{id}"), "title": "t" }))
        .collect();
    json!({ "topic_list": { "topics": topics, "more_topics_url": more } })
}

#[tokio::test]
async fn latest_listing_follows_cursor_until_it_ends() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(topic_page(&[3], Some(""))))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(topic_page(&[1, 2], Some("/latest?no_definitions=true&page=1"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, PaginationSettings::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let delivered = client
        .for_each_latest_topic(QueueClass::Core, |topic| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push((topic.topic.id, topic.url));
                anyhow::Ok(())
            }
        })
        .await
        .unwrap();

    assert_eq!(delivered, 3);
    let seen = seen.lock().unwrap();
    let ids: Vec<u64> = seen.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(seen[0].1, format!("{}/t/topic-1/1", server.uri()));
}

#[tokio::test]
async fn circular_cursor_stops_at_page_limit() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(topic_page(&[1], Some("/latest?page=1"))),
        )
        .expect(3)
        .mount(&server)
        .await;

    let settings = PaginationSettings {
        max_pages: 3,
        ..PaginationSettings::default()
    };
    let client = client(&server, settings);
    let err = client
        .for_each_latest_topic(QueueClass::Core, |_topic| async { anyhow::Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::PageLimit(3)));
}

#[tokio::test]
async fn single_post_is_fetched_and_normalized() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts/40.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 40,
            "username": "mod",
            "topic_id": 12,
            "topic_slug": "dice",
            "post_number": 4,
            "reply_to_post_number": 2,
            "raw": "!roll 1d20",
            "moderator": true,
        })))
        .mount(&server)
        .await;

    let client = client(&server, PaginationSettings::default());
    let post = client.get_post(QueueClass::Core, 40).await.unwrap();

    assert_eq!(post.trust, forum_core::TrustLevel::Moderator);
    assert_eq!(post.reply_url, format!("{}/t/dice/12/2", server.uri()));
    assert_eq!(post.cleaned, "!roll 1d20");
}

#[tokio::test]
async fn reply_is_posted_as_form() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(wiremock::matchers::body_string_contains("reply_to_post_number=4"))
        .and(wiremock::matchers::body_string_contains("raw=rolled+17"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 41,
            "topic_id": 12,
            "topic_slug": "dice",
            "post_number": 5,
            "reply_to_post_number": 4,
            "raw": "rolled 17",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, PaginationSettings::default());
    let post = client
        .create_post(QueueClass::Core, 12, Some(4), "rolled 17")
        .await
        .unwrap();
    assert_eq!(post.post.id, 41);
    assert_eq!(post.url, format!("{}/t/dice/12/5", server.uri()));
}
