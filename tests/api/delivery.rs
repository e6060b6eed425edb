use chrono::{Duration, Utc};
use std::sync::Arc;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{get_links, listings_body, ReadOnlyStore, TestApp};
use job_alerts_bot::delivery::{DeliveryOutcome, DeliveryPipeline};
use job_alerts_bot::domain::frequency::Frequency;

fn has_query_key(request: &wiremock::Request, key: &str) -> bool {
    request.url.query_pairs().any(|(k, _)| k == key)
}

#[tokio::test]
async fn subscription_within_its_window_is_skipped() {
    let test_app = TestApp::spawn_app().await;
    let now = Utc::now();
    let subscription = test_app
        .add_subscription(1, "python", Frequency::Daily, Some(now - Duration::hours(1)))
        .await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(listings_body(3)))
        .expect(0)
        .mount(&test_app.listings_server)
        .await;

    let outcome = test_app.pipeline.deliver(&subscription, now).await;

    assert_eq!(outcome, DeliveryOutcome::Skipped);
    assert_eq!(
        test_app.last_sent(&subscription.id).await,
        subscription.last_sent
    );
}

#[tokio::test]
async fn every_listing_is_sent_and_the_subscription_is_marked_as_sent() {
    let test_app = TestApp::spawn_app().await;
    let now = Utc::now();
    let subscription = test_app
        .add_subscription(42, "python", Frequency::Weekly, None)
        .await;
    test_app.mock_telegram().await;

    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .and(query_param("text", "python"))
        .and(query_param("per_page", "5"))
        .and(query_param("order_by", "publication_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listings_body(3)))
        .expect(1)
        .mount(&test_app.listings_server)
        .await;

    let outcome = test_app.pipeline.deliver(&subscription, now).await;

    assert_eq!(outcome, DeliveryOutcome::Sent(3));
    assert_eq!(test_app.last_sent(&subscription.id).await, Some(now));

    let messages = test_app.sent_messages().await;
    assert_eq!(messages.len(), 3);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message["chat_id"], 42);
        let links = get_links(message["text"].as_str().unwrap());
        assert_eq!(links, vec![format!("https://hh.ru/vacancy/{}", i)]);
    }
}

#[tokio::test]
async fn no_results_leave_last_sent_untouched() {
    let test_app = TestApp::spawn_app().await;
    let now = Utc::now();
    let last_sent = now - Duration::days(2);
    let subscription = test_app
        .add_subscription(1, "cobol", Frequency::Daily, Some(last_sent))
        .await;
    test_app.mock_listings(0).await;

    let outcome = test_app.pipeline.deliver(&subscription, now).await;

    assert_eq!(outcome, DeliveryOutcome::NoResults);
    assert_eq!(test_app.last_sent(&subscription.id).await, Some(last_sent));
    assert!(test_app.sent_messages().await.is_empty());
}

#[tokio::test]
async fn listings_failure_fails_the_delivery() {
    let test_app = TestApp::spawn_app().await;
    let subscription = test_app
        .add_subscription(1, "python", Frequency::Daily, None)
        .await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&test_app.listings_server)
        .await;

    let outcome = test_app.pipeline.deliver(&subscription, Utc::now()).await;

    assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
    assert_eq!(test_app.last_sent(&subscription.id).await, None);
    assert!(test_app.sent_messages().await.is_empty());
}

#[tokio::test]
async fn a_failed_send_does_not_stop_the_other_listings() {
    let test_app = TestApp::spawn_app().await;
    let now = Utc::now();
    let subscription = test_app
        .add_subscription(1, "python", Frequency::Daily, None)
        .await;
    test_app.mock_listings(2).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "ok": false,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .expect(2)
        .mount(&test_app.telegram_server)
        .await;

    let outcome = test_app.pipeline.deliver(&subscription, now).await;

    assert_eq!(outcome, DeliveryOutcome::Sent(2));
    assert_eq!(test_app.last_sent(&subscription.id).await, Some(now));
}

#[tokio::test]
async fn delivering_twice_at_the_same_instant_sends_once() {
    let test_app = TestApp::spawn_app().await;
    let now = Utc::now();
    let subscription = test_app
        .add_subscription(1, "python", Frequency::Daily, None)
        .await;
    test_app.mock_telegram().await;

    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listings_body(1)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&test_app.listings_server)
        .await;

    let first = test_app.pipeline.deliver(&subscription, now).await;
    let stored = test_app
        .store
        .get_subscription(&subscription.id)
        .await
        .unwrap();
    let second = test_app.pipeline.deliver(&stored, now).await;

    assert_eq!(first, DeliveryOutcome::Sent(1));
    assert_eq!(second, DeliveryOutcome::Skipped);
    assert_eq!(test_app.sent_messages().await.len(), 1);
}

#[tokio::test]
async fn unknown_frequency_is_delivered_without_a_recency_filter() {
    let test_app = TestApp::spawn_app().await;
    let now = Utc::now();
    let subscription = test_app
        .add_subscription(
            1,
            "python",
            Frequency::Unrecognized(String::from("monthly")),
            Some(now - Duration::minutes(1)),
        )
        .await;
    test_app.mock_listings(1).await;
    test_app.mock_telegram().await;

    let outcome = test_app.pipeline.deliver(&subscription, now).await;

    assert_eq!(outcome, DeliveryOutcome::Sent(1));
    let requests = test_app.listings_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!has_query_key(&requests[0], "date_from"));
    assert!(!has_query_key(&requests[0], "order_by"));
}

#[tokio::test]
async fn failing_to_mark_as_sent_fails_the_delivery() {
    let test_app = TestApp::spawn_app().await;
    let subscription = test_app
        .add_subscription(1, "python", Frequency::Daily, None)
        .await;
    test_app.mock_listings(1).await;
    test_app.mock_telegram().await;

    let pipeline = DeliveryPipeline::new(
        Arc::new(ReadOnlyStore {
            inner: test_app.store.clone(),
        }),
        test_app.listings_client.clone(),
        test_app.telegram_client.clone(),
    );

    let outcome = pipeline.deliver(&subscription, Utc::now()).await;

    assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
    // Messages already went out, the next pass will send them again
    assert_eq!(test_app.sent_messages().await.len(), 1);
    assert_eq!(test_app.last_sent(&subscription.id).await, None);
}
