use chrono::{Duration, Utc};
use std::sync::Arc;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{listings_body, ReadOnlyStore, TestApp};
use job_alerts_bot::dialogue::{DialogueState, DialogueStorage};
use job_alerts_bot::domain::frequency::Frequency;
use job_alerts_bot::domain::level::Level;
use job_alerts_bot::store::{SettingsStore, SubscriptionStore};

const USER: i64 = 7;

#[tokio::test]
async fn start_lists_the_commands() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    test_app.send_text(USER, "/start").await;

    let text = test_app.last_sent_text().await;
    assert!(text.contains("/subscribe"));
    assert!(text.contains("/vacancies"));
}

#[tokio::test]
async fn subscription_wizard_stores_the_confirmed_subscription() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    for text in ["/subscribe", "python django", "Senior", "/skip", "weekly"] {
        test_app.send_text(USER, text).await;
    }

    let preview = test_app.last_sent_text().await;
    assert!(preview.contains("Keywords: python django"));
    assert!(preview.contains("Level: Senior"));
    assert!(preview.contains("Area: not set"));
    assert!(preview.contains("/confirm"));
    assert!(test_app.store.find_all().await.unwrap().is_empty());

    test_app.send_text(USER, "/confirm").await;

    let subscriptions = test_app.store.find_by_subscriber(USER).await.unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].keywords.as_deref(), Some("python django"));
    assert_eq!(subscriptions[0].level, Some(Level::Senior));
    assert_eq!(subscriptions[0].area, None);
    assert_eq!(subscriptions[0].frequency, Frequency::Weekly);
    assert_eq!(subscriptions[0].last_sent, None);
    assert_eq!(test_app.dialogues.get(USER).await.unwrap(), None);
}

#[tokio::test]
async fn city_names_are_accepted_as_area() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    for text in ["/subscribe", "rust", "/skip", "moscow", "daily", "/confirm"] {
        test_app.send_text(USER, text).await;
    }

    let subscriptions = test_app.store.find_by_subscriber(USER).await.unwrap();
    assert_eq!(subscriptions[0].area.as_deref(), Some("1"));
    assert_eq!(subscriptions[0].frequency, Frequency::Daily);
}

#[tokio::test]
async fn invalid_answers_are_asked_again() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    for text in ["/subscribe", "python", "lead"] {
        test_app.send_text(USER, text).await;
    }

    assert!(matches!(
        test_app.dialogues.get(USER).await.unwrap(),
        Some(DialogueState::AwaitingLevel { .. })
    ));

    for text in ["middle", "/skip", "monthly"] {
        test_app.send_text(USER, text).await;
    }

    assert!(matches!(
        test_app.dialogues.get(USER).await.unwrap(),
        Some(DialogueState::AwaitingFrequency { .. })
    ));
    assert!(test_app.last_sent_text().await.contains("daily or weekly"));
}

#[tokio::test]
async fn user_gets_an_apology_when_the_subscription_cannot_be_saved() {
    let mut test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;
    test_app.dispatcher.subscriptions = Arc::new(ReadOnlyStore {
        inner: test_app.store.clone(),
    });

    for text in ["/subscribe", "python", "/skip", "/skip", "daily", "/confirm"] {
        test_app.send_text(USER, text).await;
    }

    assert!(test_app.last_sent_text().await.starts_with("Sorry"));
    assert!(test_app.store.find_all().await.unwrap().is_empty());
    // The answers are kept so the user can send /confirm again
    assert!(matches!(
        test_app.dialogues.get(USER).await.unwrap(),
        Some(DialogueState::AwaitingConfirmation { .. })
    ));
}

#[tokio::test]
async fn cancel_drops_the_wizard() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    for text in ["/subscribe", "python", "junior", "/cancel"] {
        test_app.send_text(USER, text).await;
    }

    assert_eq!(test_app.dialogues.get(USER).await.unwrap(), None);
    assert!(test_app.store.find_all().await.unwrap().is_empty());
    assert_eq!(test_app.last_sent_text().await, "Cancelled.");
}

#[tokio::test]
async fn another_command_abandons_the_wizard() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    for text in ["/subscribe", "python", "/tip"] {
        test_app.send_text(USER, text).await;
    }

    assert_eq!(test_app.dialogues.get(USER).await.unwrap(), None);
    assert!(test_app.last_sent_text().await.starts_with("Tip for Junior"));
}

#[tokio::test]
async fn show_subscriptions_lists_every_subscription() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;
    test_app
        .add_subscription(USER, "python", Frequency::Daily, None)
        .await;
    test_app
        .add_subscription(USER, "<rust>", Frequency::Weekly, Some(Utc::now()))
        .await;

    test_app.send_text(USER, "/show_subscriptions").await;

    let text = test_app.last_sent_text().await;
    assert!(text.contains("1.\nKeywords: python"));
    assert!(text.contains("2.\nKeywords: &lt;rust&gt;"));
    assert!(text.contains("Level: not set"));
    assert!(text.contains("Frequency: weekly"));
}

#[tokio::test]
async fn unsubscribe_removes_all_subscriptions_of_the_user() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;
    test_app
        .add_subscription(USER, "python", Frequency::Daily, None)
        .await;
    test_app
        .add_subscription(USER, "rust", Frequency::Weekly, None)
        .await;
    test_app
        .add_subscription(USER + 1, "go", Frequency::Weekly, None)
        .await;

    test_app.send_text(USER, "/unsubscribe").await;

    assert!(test_app.last_sent_text().await.contains("Removed 2"));
    assert!(test_app.store.find_by_subscriber(USER).await.unwrap().is_empty());
    assert_eq!(test_app.store.find_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn settings_buttons_update_the_user_settings() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    test_app.send_text(USER, "/settings").await;
    let menu = test_app.sent_messages().await.pop().unwrap();
    assert_eq!(
        menu["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
        "settings:city"
    );

    test_app.press_button(USER, "set_city:2").await;
    test_app.press_button(USER, "set_level:middle").await;

    let settings = test_app.store.get(USER).await.unwrap();
    assert_eq!(settings.city_id.as_deref(), Some("2"));
    assert_eq!(settings.level, Some(Level::Middle));

    test_app.press_button(USER, "settings:show").await;
    let text = test_app.last_sent_text().await;
    assert!(text.contains("City: Saint Petersburg"));
    assert!(text.contains("Level: Middle"));

    let answered = test_app
        .telegram_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path().ends_with("/answerCallbackQuery"))
        .count();
    assert_eq!(answered, 3);
}

#[tokio::test]
async fn unknown_cities_are_ignored() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    test_app.press_button(USER, "set_city:999999").await;

    assert_eq!(test_app.store.get(USER).await.unwrap().city_id, None);
    assert!(test_app.sent_messages().await.is_empty());
}

#[tokio::test]
async fn vacancies_use_the_user_settings() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;
    test_app.store.set_level(USER, Level::Junior).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .and(query_param("text", "junior python"))
        .and(query_param("area", "1"))
        .and(query_param("per_page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listings_body(2)))
        .expect(1)
        .mount(&test_app.listings_server)
        .await;

    test_app.send_text(USER, "/vacancies").await;

    let texts = test_app.sent_texts().await;
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("https://hh.ru/vacancy/0"));
}

#[tokio::test]
async fn vacancies_apologise_when_the_search_fails() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&test_app.listings_server)
        .await;

    test_app.send_text(USER, "/vacancies rust").await;

    assert!(test_app.last_sent_text().await.starts_with("Sorry"));
}

#[tokio::test]
async fn vacancies_without_results_say_so() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;
    test_app.mock_listings(0).await;

    test_app.send_text(USER, "/vacancies fortran").await;

    assert_eq!(test_app.sent_texts().await, vec!["No vacancies found."]);
}

#[tokio::test]
async fn news_sends_the_newest_entries_first() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;
    let now = Utc::now();
    let items: String = (1..=7)
        .map(|day| {
            format!(
                "<item><title>Post {}</title><link>https://news.example.com/{}</link><pubDate>{}</pubDate></item>",
                day,
                day,
                (now - Duration::days(day)).to_rfc2822()
            )
        })
        .collect();
    let feed = format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>News</title><link>https://news.example.com</link><description>News</description>{}</channel></rss>"#,
        items
    );

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .expect(1)
        .mount(&test_app.feeds_server)
        .await;

    test_app.send_text(USER, "/news").await;

    let texts = test_app.sent_texts().await;
    assert_eq!(texts.len(), 5);
    assert!(texts[0].starts_with("<b>Post 1</b>"));
    assert!(texts[4].starts_with("<b>Post 5</b>"));
}

#[tokio::test]
async fn news_without_reachable_feeds_says_so() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    test_app.send_text(USER, "/news").await;

    assert_eq!(test_app.sent_texts().await, vec!["No news yet."]);
}

#[tokio::test]
async fn learn_lists_the_resources_of_the_user_level() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;
    test_app.store.set_level(USER, Level::Senior).await.unwrap();

    test_app.send_text(USER, "/learn").await;

    let text = test_app.last_sent_text().await;
    assert!(text.starts_with("Resources for Senior"));
    assert!(text.contains("• "));
}

#[cfg(unix)]
#[tokio::test]
async fn pylint_reports_the_linter_output() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    test_app.send_text(USER, "/pylint").await;
    assert_eq!(
        test_app.dialogues.get(USER).await.unwrap(),
        Some(DialogueState::AwaitingCode)
    );

    test_app
        .send_text(USER, "```python\nprint('hello')\n```")
        .await;

    // The test configuration lints with `echo`, which prints its arguments
    let text = test_app.last_sent_text().await;
    assert!(text.starts_with("<pre>"));
    assert!(text.contains(".py --disable=all"));
    assert_eq!(test_app.dialogues.get(USER).await.unwrap(), None);
}

#[tokio::test]
async fn unknown_commands_get_a_hint() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_telegram().await;

    test_app.send_text(USER, "/dance").await;

    assert!(test_app.last_sent_text().await.contains("/start"));
}
