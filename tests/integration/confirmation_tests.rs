use crate::support::{mount_listing, start_app};
use chrono::{Duration, Utc};
use price_watch::storage::{ConfirmationStore, SubscriptionStore};
use price_watch::{ConfirmOutcome, ConfirmationError};
use wiremock::MockServer;

#[tokio::test]
async fn test_confirm_then_replay() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 100).await;
    let app = start_app();
    app.service.admit("alice@example.com", &url).await.unwrap();
    let hash = app.mailer.last_hash_for("alice@example.com").unwrap();

    let outcome = app.service.confirm_by_hash(&hash).await.unwrap();

    assert_eq!(
        outcome,
        ConfirmOutcome::Confirmed {
            email: "alice@example.com".to_string()
        }
    );
    assert!(app.service.storage().is_verified("alice@example.com").await.unwrap());

    let replay = app.service.confirm_by_hash(&hash).await;
    assert!(matches!(replay, Err(ConfirmationError::NotFound)));
}

#[tokio::test]
async fn test_confirm_verifies_every_subscription_of_email() {
    let server = MockServer::start().await;
    let first = mount_listing(&server, "/item/1", 100).await;
    let second = mount_listing(&server, "/item/2", 200).await;
    let app = start_app();

    app.service.admit("alice@example.com", &first).await.unwrap();
    // Still unverified, so a second link replaces the first
    app.service.admit("alice@example.com", &second).await.unwrap();
    let hash = app.mailer.last_hash_for("alice@example.com").unwrap();

    app.service.confirm_by_hash(&hash).await.unwrap();

    let subs = app
        .service
        .storage()
        .subscriptions_of_email("alice@example.com")
        .unwrap();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|s| s.verified));
}

#[tokio::test]
async fn test_expired_link_is_reissued() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 100).await;
    let app = start_app();
    app.service.admit("alice@example.com", &url).await.unwrap();
    let stale_hash = app.mailer.last_hash_for("alice@example.com").unwrap();

    app.service
        .storage()
        .update_hash_and_deadline("alice@example.com", &stale_hash, Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    let outcome = app.service.confirm_by_hash(&stale_hash).await.unwrap();

    assert_eq!(
        outcome,
        ConfirmOutcome::Reissued {
            email: "alice@example.com".to_string()
        }
    );
    assert!(!app.service.storage().is_verified("alice@example.com").await.unwrap());

    let fresh_hash = app.mailer.last_hash_for("alice@example.com").unwrap();
    assert_ne!(fresh_hash, stale_hash);
    assert_eq!(app.mailer.confirmations().len(), 2);

    let record = app
        .service
        .storage()
        .confirmation_for("alice@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(record.hash, fresh_hash);
    assert!(record.deadline > Utc::now());

    assert!(matches!(
        app.service.confirm_by_hash(&stale_hash).await,
        Err(ConfirmationError::NotFound)
    ));
    assert!(matches!(
        app.service.confirm_by_hash(&fresh_hash).await,
        Ok(ConfirmOutcome::Confirmed { .. })
    ));
}

#[tokio::test]
async fn test_unknown_hash() {
    let app = start_app();

    let err = app.service.confirm_by_hash("0123abcd").await.unwrap_err();

    assert!(matches!(err, ConfirmationError::NotFound));
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_resend_after_lost_mail() {
    let server = MockServer::start().await;
    let url = mount_listing(&server, "/item/1", 100).await;
    let app = start_app();
    app.service.admit("alice@example.com", &url).await.unwrap();
    let lost = app.mailer.last_hash_for("alice@example.com").unwrap();

    let record = app.service.resend_confirmation("alice@example.com").await.unwrap();

    assert_ne!(record.hash, lost);
    assert_eq!(app.mailer.last_hash_for("alice@example.com"), Some(record.hash.clone()));
    assert!(app.service.confirm_by_hash(&lost).await.is_err());
    assert!(app.service.confirm_by_hash(&record.hash).await.is_ok());
}
