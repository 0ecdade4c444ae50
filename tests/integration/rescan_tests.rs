use crate::support::{listing_page, mount_listing, start_app, start_app_with};
use price_watch::storage::SubscriptionStore;
use price_watch::Subscription;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn subscribe_verified(app: &crate::support::TestApp, email: &str, url: &str, price: i64) {
    app.service
        .storage()
        .save(&Subscription::new(email, url, price, true))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_price_change_notifies_each_subscriber_once() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 120).await;
    let app = start_app();
    subscribe_verified(&app, "alice@example.com", &url, 100).await;
    subscribe_verified(&app, "bob@example.com", &url, 100).await;

    let stats = app.service.run_single_pass().await;

    assert_eq!(stats.tasks, 1);
    assert_eq!(stats.changed, 1);
    assert_eq!(stats.notified, 2);

    let alerts = app.mailer.price_alerts();
    let mut recipients: Vec<_> = alerts.iter().map(|m| m.to.as_str()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["alice@example.com", "bob@example.com"]);
    assert!(alerts[0].body.contains("Old price: 100"));
    assert!(alerts[0].body.contains("New price: 120"));

    let subs = app.service.storage().subscribers_of(&url).await.unwrap();
    assert!(subs.iter().all(|s| s.price == 120));

    // Nothing moved since, so the next pass is silent
    let stats = app.service.run_single_pass().await;
    assert_eq!(stats.unchanged, 1);
    assert_eq!(app.mailer.price_alerts().len(), 2);
}

#[tokio::test]
async fn test_subscribers_at_different_prices_notified_once() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 150).await;
    let app = start_app();
    // Two distinct (url, price) pairs for the same listing
    subscribe_verified(&app, "alice@example.com", &url, 100).await;
    subscribe_verified(&app, "bob@example.com", &url, 120).await;

    let stats = app.service.run_single_pass().await;

    assert_eq!(stats.tasks, 2);
    assert_eq!(app.mailer.price_alerts().len(), 2);
    let subs = app.service.storage().subscribers_of(&url).await.unwrap();
    assert!(subs.iter().all(|s| s.price == 150));
}

#[tokio::test]
async fn test_unverified_subscribers_are_not_alerted() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 100).await;
    let app = start_app();
    app.service.admit("carol@example.com", &url).await.unwrap();

    server.reset().await;
    mount_listing(&server, "/item/1", 90).await;

    let stats = app.service.run_single_pass().await;

    assert_eq!(stats.tasks, 0);
    assert!(app.mailer.price_alerts().is_empty());
}

#[tokio::test]
async fn test_confirmed_subscriber_follows_price_changes() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 100).await;
    let app = start_app();
    app.service.admit("carol@example.com", &url).await.unwrap();
    let hash = app.mailer.last_hash_for("carol@example.com").unwrap();
    app.service.confirm_by_hash(&hash).await.unwrap();

    for price in [90, 95] {
        server.reset().await;
        mount_listing(&server, "/item/1", price).await;
        app.service.run_single_pass().await;
    }

    let alerts = app.mailer.price_alerts();
    assert_eq!(alerts.len(), 2);
    assert!(alerts[1].body.contains("Old price: 90"));
    assert!(alerts[1].body.contains("New price: 95"));
}

#[tokio::test]
async fn test_slow_listing_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(1))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let slow = format!("{}/item/slow", server.uri());
    let fast = mount_listing(&server, "/item/fast", 50).await;

    let app = start_app_with(|config| {
        config.tracker.worker_count = 1;
        config.tracker.task_timeout = 300;
    });
    subscribe_verified(&app, "alice@example.com", &slow, 10).await;
    subscribe_verified(&app, "bob@example.com", &fast, 10).await;

    let start = Instant::now();
    let stats = app.service.run_single_pass().await;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(stats.tasks, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.changed, 1);

    let alerts = app.mailer.price_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].to, "bob@example.com");

    // The timed-out listing keeps its last known price
    let slow_subs = app.service.storage().subscribers_of(&slow).await.unwrap();
    assert_eq!(slow_subs[0].price, 10);
}

#[tokio::test]
async fn test_failed_poll_leaves_price_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let url = format!("{}/item/1", server.uri());
    let app = start_app();
    subscribe_verified(&app, "alice@example.com", &url, 100).await;

    let stats = app.service.run_single_pass().await;

    assert_eq!(stats.skipped, 1);
    assert!(app.mailer.sent().is_empty());
    let subs = app.service.storage().subscribers_of(&url).await.unwrap();
    assert_eq!(subs[0].price, 100);
}

#[tokio::test]
async fn test_rescan_loop_keeps_running() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 70).await;
    let app = start_app();
    subscribe_verified(&app, "alice@example.com", &url, 60).await;

    let handle = app.service.start_rescan_loop();
    let deadline = Instant::now() + Duration::from_secs(5);
    while app.mailer.price_alerts().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(!handle.is_finished());
    handle.abort();
    assert_eq!(app.mailer.price_alerts().len(), 1);
}
