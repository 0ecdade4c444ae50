use async_trait::async_trait;
use price_watch::config::{
    Config, ConfirmationConfig, ListingConfig, MailConfig, StorageConfig, TrackerConfig,
};
use price_watch::notify::{MailError, MailSender, PRICE_CHANGE_SUBJECT};
use price_watch::PriceWatch;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport keeping every message in memory
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn price_alerts(&self) -> Vec<SentMail> {
        self.sent()
            .into_iter()
            .filter(|m| m.subject == PRICE_CHANGE_SUBJECT)
            .collect()
    }

    pub fn confirmations(&self) -> Vec<SentMail> {
        self.sent()
            .into_iter()
            .filter(|m| m.subject != PRICE_CHANGE_SUBJECT)
            .collect()
    }

    /// Hash carried by the most recent confirmation link sent to `to`
    pub fn last_hash_for(&self, to: &str) -> Option<String> {
        self.confirmations()
            .into_iter()
            .rev()
            .find(|m| m.to == to)
            .and_then(|m| {
                let start = m.body.find("hash=")? + "hash=".len();
                let hash: String = m.body[start..]
                    .chars()
                    .take_while(|c| c.is_ascii_hexdigit())
                    .collect();
                Some(hash)
            })
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A running service backed by a temporary database
pub struct TestApp {
    pub service: PriceWatch,
    pub mailer: Arc<RecordingMailer>,
    _dir: TempDir,
}

/// Creates a test configuration pointing at `db_path`
pub fn create_test_config(db_path: &str) -> Config {
    Config {
        tracker: TrackerConfig {
            worker_count: 4,
            rescan_interval: 1,
            page_timeout: 5000,
            task_timeout: 3000,
            queue_capacity: 8,
            max_tls_version: "1.2".to_string(),
        },
        listing: ListingConfig::default(),
        storage: StorageConfig {
            database_path: db_path.to_string(),
        },
        mail: MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: "robot".to_string(),
            password: Some("secret".to_string()),
            password_env: None,
            from: "robot@example.com".to_string(),
        },
        confirmation: ConfirmationConfig {
            link_base: "http://127.0.0.1:8080/confirm".to_string(),
            validity_hours: 24,
            secret: "pepper".to_string(),
        },
    }
}

pub fn start_app() -> TestApp {
    start_app_with(|_| {})
}

pub fn start_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("prices.db");
    let mut config = create_test_config(db_path.to_str().unwrap());
    tweak(&mut config);

    let mailer = Arc::new(RecordingMailer::default());
    let service = PriceWatch::new(&config, mailer.clone()).unwrap();
    TestApp {
        service,
        mailer,
        _dir: dir,
    }
}

/// Listing markup carrying `price` the way the tracked shop renders it
pub fn listing_page(price: i64) -> String {
    format!(
        r#"<html><script>window.item = {{"id":1,"dynx_price":{},"currency":"EUR"}};</script></html>"#,
        price
    )
}

/// Serves a listing page at `route` and returns its absolute URL
pub async fn mount_listing(server: &MockServer, route: &str, price: i64) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(price)))
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}
