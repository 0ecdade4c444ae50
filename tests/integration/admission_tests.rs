use crate::support::{mount_listing, start_app};
use price_watch::storage::SubscriptionStore;
use price_watch::Rejection;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_unverified_subscriber_gets_one_confirmation() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 8792009).await;
    let app = start_app();

    let sub = app.service.admit("alice@example.com", &url).await.unwrap();

    assert_eq!(sub.price, 8792009);
    assert!(!sub.verified);

    let stats = app.service.storage().stats().unwrap();
    assert_eq!(stats.subscriptions, 1);
    assert_eq!(stats.pending_confirmations, 1);

    let mails = app.mailer.confirmations();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "alice@example.com");
    assert!(mails[0].body.contains("http://127.0.0.1:8080/confirm?hash="));
}

#[tokio::test]
async fn test_verified_subscriber_gets_no_confirmation() {
    let server = MockServer::start().await;
    let first = mount_listing(&server, "/item/1", 100).await;
    let second = mount_listing(&server, "/item/2", 200).await;
    let app = start_app();

    app.service.admit("alice@example.com", &first).await.unwrap();
    let hash = app.mailer.last_hash_for("alice@example.com").unwrap();
    app.service.confirm_by_hash(&hash).await.unwrap();

    let sub = app.service.admit("alice@example.com", &second).await.unwrap();

    assert!(sub.verified);
    assert_eq!(sub.price, 200);
    assert_eq!(app.mailer.confirmations().len(), 1);
    assert_eq!(app.service.storage().stats().unwrap().pending_confirmations, 0);
}

#[tokio::test]
async fn test_unreachable_listing_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let url = format!("{}/item/missing", server.uri());
    let app = start_app();

    let err = app.service.admit("alice@example.com", &url).await.unwrap_err();

    assert_eq!(err.rejection(), Some(&Rejection::UnreachableListing(url.clone())));
    let stats = app.service.storage().stats().unwrap();
    assert_eq!(stats.subscriptions, 0);
    assert_eq!(stats.pending_confirmations, 0);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_page_without_price_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/blank"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>sold out</html>"))
        .mount(&server)
        .await;
    let url = format!("{}/item/blank", server.uri());
    let app = start_app();

    let err = app.service.admit("alice@example.com", &url).await.unwrap_err();

    assert!(matches!(err.rejection(), Some(Rejection::UnreachableListing(_))));
    assert!(!app
        .service
        .storage()
        .find_duplicate("alice@example.com", &url)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_duplicate_subscription_rejected() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 100).await;
    let app = start_app();

    app.service.admit("alice@example.com", &url).await.unwrap();
    let err = app.service.admit("alice@example.com", &url).await.unwrap_err();

    assert_eq!(err.rejection(), Some(&Rejection::AlreadySubscribed));
    assert_eq!(app.service.storage().stats().unwrap().subscriptions, 1);
    assert_eq!(app.mailer.confirmations().len(), 1);
}

#[tokio::test]
async fn test_same_listing_different_subscribers() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 100).await;
    let app = start_app();

    app.service.admit("alice@example.com", &url).await.unwrap();
    app.service.admit("bob@example.com", &url).await.unwrap();

    let stats = app.service.storage().stats().unwrap();
    assert_eq!(stats.subscriptions, 2);
    assert_eq!(stats.tracked_urls, 1);
    assert_eq!(stats.pending_confirmations, 2);
}

#[tokio::test]
async fn test_malformed_request_never_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"dynx_price\":1,"))
        .expect(0)
        .mount(&server)
        .await;
    let app = start_app();

    let err = app
        .service
        .admit("alice", &format!("{}/item/1", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.rejection(), Some(&Rejection::InvalidEmail("alice".to_string())));
    server.verify().await;
}
