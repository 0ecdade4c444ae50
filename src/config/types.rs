use serde::Deserialize;

/// Main configuration structure for Price-Watch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub confirmation: ConfirmationConfig,
}

/// Rescan worker pool and HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Number of rescan workers spawned per pass
    #[serde(rename = "worker-count")]
    pub worker_count: u32,

    /// Pause between two rescan passes (minutes)
    #[serde(rename = "rescan-interval")]
    pub rescan_interval: u64,

    /// Transport-level page download timeout (milliseconds)
    #[serde(rename = "page-timeout")]
    pub page_timeout: u64,

    /// Hard bound on a single rescan task's fetch (milliseconds)
    #[serde(rename = "task-timeout", default = "default_task_timeout")]
    pub task_timeout: u64,

    /// Capacity of the per-pass task queue
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Highest TLS protocol version the client may negotiate ("1.2" or "1.3")
    #[serde(rename = "max-tls-version", default = "default_max_tls_version")]
    pub max_tls_version: String,
}

/// Markers delimiting the price inside a listing page
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    #[serde(rename = "price-prefix", default = "default_price_prefix")]
    pub price_prefix: String,

    #[serde(rename = "price-terminator", default = "default_price_terminator")]
    pub price_terminator: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            price_prefix: default_price_prefix(),
            price_terminator: default_price_terminator(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Outgoing mail configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(rename = "smtp-host")]
    pub smtp_host: String,

    #[serde(rename = "smtp-port", default = "default_smtp_port")]
    pub smtp_port: u16,

    pub username: String,

    /// Inline SMTP password. Takes precedence over `password-env`.
    #[serde(default)]
    pub password: Option<String>,

    /// Name of an environment variable holding the SMTP password
    #[serde(rename = "password-env", default)]
    pub password_env: Option<String>,

    /// Sender address for every outgoing message
    pub from: String,
}

/// Email confirmation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    /// Base of the confirmation link; the hash is appended as `?hash=`
    #[serde(rename = "link-base")]
    pub link_base: String,

    /// How long an issued confirmation hash stays valid (hours)
    #[serde(rename = "validity-hours", default = "default_validity_hours")]
    pub validity_hours: u32,

    /// Secret salt mixed into every confirmation hash
    pub secret: String,
}

fn default_task_timeout() -> u64 {
    3000
}

fn default_queue_capacity() -> usize {
    512
}

fn default_max_tls_version() -> String {
    "1.2".to_string()
}

fn default_price_prefix() -> String {
    "\"dynx_price\":".to_string()
}

fn default_price_terminator() -> String {
    ",".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_validity_hours() -> u32 {
    24
}
