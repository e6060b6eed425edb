use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{listings_body, PanickingStore, TestApp, UnreachableStore};
use job_alerts_bot::delivery::DeliveryPipeline;
use job_alerts_bot::domain::frequency::Frequency;
use job_alerts_bot::scheduler::{PassReport, SchedulerLoop};

#[tokio::test]
async fn a_failing_subscription_does_not_stop_the_pass() {
    let test_app = TestApp::spawn_app().await;
    let first = test_app
        .add_subscription(1, "alpha", Frequency::Daily, None)
        .await;
    let second = test_app
        .add_subscription(2, "beta", Frequency::Daily, None)
        .await;
    let third = test_app
        .add_subscription(3, "gamma", Frequency::Daily, None)
        .await;
    test_app.mock_telegram().await;

    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .and(query_param("text", "beta"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&test_app.listings_server)
        .await;
    test_app.mock_listings(1).await;

    let report = test_app
        .scheduler(time::Duration::from_secs(3600))
        .run_pass()
        .await
        .unwrap();

    assert_eq!(
        report,
        PassReport {
            processed: 3,
            skipped: 0,
            sent: 2,
            no_results: 0,
            failed: 1,
        }
    );
    assert!(test_app.last_sent(&first.id).await.is_some());
    assert_eq!(test_app.last_sent(&second.id).await, None);
    assert!(test_app.last_sent(&third.id).await.is_some());

    let recipients: Vec<i64> = test_app
        .sent_messages()
        .await
        .iter()
        .map(|message| message["chat_id"].as_i64().unwrap())
        .collect();
    assert_eq!(recipients, vec![1, 3]);
}

#[tokio::test]
async fn a_panicking_subscription_does_not_stop_the_pass() {
    let test_app = TestApp::spawn_app().await;
    let first = test_app
        .add_subscription(1, "alpha", Frequency::Daily, None)
        .await;
    let second = test_app
        .add_subscription(2, "beta", Frequency::Daily, None)
        .await;
    let third = test_app
        .add_subscription(3, "gamma", Frequency::Daily, None)
        .await;
    test_app.mock_listings(1).await;
    test_app.mock_telegram().await;

    let store = Arc::new(PanickingStore {
        inner: test_app.store.clone(),
        panic_on: second.id,
    });
    let pipeline = Arc::new(DeliveryPipeline::new(
        store.clone(),
        test_app.listings_client.clone(),
        test_app.telegram_client.clone(),
    ));
    let scheduler = SchedulerLoop::new(store, pipeline, time::Duration::from_secs(3600));

    let report = scheduler.run_pass().await.unwrap();

    assert_eq!(
        report,
        PassReport {
            processed: 3,
            skipped: 0,
            sent: 2,
            no_results: 0,
            failed: 1,
        }
    );
    assert!(test_app.last_sent(&first.id).await.is_some());
    assert_eq!(test_app.last_sent(&second.id).await, None);
    assert!(test_app.last_sent(&third.id).await.is_some());
}

#[tokio::test]
async fn subscriptions_are_processed_in_snapshot_order() {
    let test_app = TestApp::spawn_app().await;
    let now = Utc::now();
    test_app
        .add_subscription(10, "first", Frequency::Weekly, None)
        .await;
    test_app
        .add_subscription(20, "recent", Frequency::Weekly, Some(now - Duration::days(1)))
        .await;
    test_app
        .add_subscription(30, "last", Frequency::Daily, Some(now - Duration::days(3)))
        .await;
    test_app.mock_listings(1).await;
    test_app.mock_telegram().await;

    let report = test_app
        .scheduler(time::Duration::from_secs(3600))
        .run_pass()
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.sent, 2);

    let searched: Vec<String> = test_app
        .listings_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|request| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == "text")
                .map(|(_, value)| value.to_string())
        })
        .collect();
    assert_eq!(searched, vec!["first", "last"]);
}

#[tokio::test]
async fn pass_fails_when_subscriptions_cannot_be_loaded() {
    let test_app = TestApp::spawn_app().await;
    let scheduler = SchedulerLoop::new(
        Arc::new(UnreachableStore),
        test_app.pipeline.clone(),
        time::Duration::from_secs(3600),
    );

    assert!(scheduler.run_pass().await.is_err());
}

#[tokio::test]
async fn loop_keeps_running_passes() {
    let test_app = TestApp::spawn_app().await;
    test_app
        .add_subscription(1, "python", Frequency::Daily, None)
        .await;
    test_app.mock_listings(0).await;

    let scheduler = test_app.scheduler(time::Duration::from_millis(50));
    let handle = tokio::spawn(scheduler.run_until_stopped());

    tokio::time::sleep(time::Duration::from_millis(400)).await;
    handle.abort();

    // Empty results never mark the subscription, so every pass searches again
    let searches = test_app
        .listings_server
        .received_requests()
        .await
        .unwrap()
        .len();
    assert!(searches >= 2, "Only {} passes ran", searches);
}
