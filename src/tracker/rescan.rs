//! Recurring rescan of every tracked listing
//!
//! Each pass owns a freshly allocated bounded queue. The store streams the
//! distinct `(url, price)` pairs of verified subscriptions into it while a
//! fixed pool of workers drains it. A pass ends only when the queue is closed
//! and every worker has returned; the scheduler then sleeps before the next
//! pass, so passes never overlap.

use crate::config::TrackerConfig;
use crate::notify::Notifier;
use crate::storage::{PricePollTask, Subscription, SubscriptionStore};
use crate::tracker::PriceFetcher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// Shared receiving end of a pass's task queue
type TaskQueue = Arc<Mutex<mpsc::Receiver<PricePollTask>>>;

/// Timing and sizing of rescan passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescanSettings {
    pub worker_count: usize,
    pub queue_capacity: usize,
    /// Hard bound on one task's fetch, independent of the transport timeout
    pub task_timeout: Duration,
    /// Pause between the end of one pass and the start of the next
    pub interval: Duration,
}

impl From<&TrackerConfig> for RescanSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            worker_count: config.worker_count as usize,
            queue_capacity: config.queue_capacity,
            task_timeout: Duration::from_millis(config.task_timeout),
            interval: Duration::from_secs(config.rescan_interval.saturating_mul(60)),
        }
    }
}

/// What happened to a single poll task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Fetched price equals the last known price
    Unchanged,
    /// Price moved; subscribers still at the old price were notified and
    /// their rows updated (possibly none)
    Changed {
        notified: usize,
        update_failures: usize,
    },
    /// Fetch failed, timed out, or subscribers could not be loaded
    Skipped,
}

/// Per-pass counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub tasks: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub skipped: usize,
    pub notified: usize,
    pub update_failures: usize,
}

impl PassStats {
    fn record(&mut self, outcome: TaskOutcome) {
        self.tasks += 1;
        match outcome {
            TaskOutcome::Unchanged => self.unchanged += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Changed {
                notified,
                update_failures,
            } => {
                self.changed += 1;
                self.notified += notified;
                self.update_failures += update_failures;
            }
        }
    }

    fn merge(&mut self, other: &PassStats) {
        self.tasks += other.tasks;
        self.unchanged += other.unchanged;
        self.changed += other.changed;
        self.skipped += other.skipped;
        self.notified += other.notified;
        self.update_failures += other.update_failures;
    }
}

/// Recurring worker pool re-polling every tracked listing
#[derive(Clone)]
pub struct RescanScheduler {
    subscriptions: Arc<dyn SubscriptionStore>,
    fetcher: Arc<dyn PriceFetcher>,
    notifier: Arc<dyn Notifier>,
    settings: RescanSettings,
}

impl RescanScheduler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        fetcher: Arc<dyn PriceFetcher>,
        notifier: Arc<dyn Notifier>,
        settings: RescanSettings,
    ) -> Self {
        Self {
            subscriptions,
            fetcher,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &RescanSettings {
        &self.settings
    }

    /// Runs passes forever, sleeping `interval` between them
    pub async fn run_forever(&self) {
        let mut pass_number: u64 = 0;
        loop {
            pass_number += 1;
            let start = Instant::now();
            let stats = self.run_pass().await;

            tracing::info!(
                "Pass {} finished in {:?}: {} listings, {} changed, {} unchanged, {} skipped, {} notified",
                pass_number,
                start.elapsed(),
                stats.tasks,
                stats.changed,
                stats.unchanged,
                stats.skipped,
                stats.notified
            );
            if stats.update_failures > 0 {
                tracing::warn!(
                    "Pass {}: {} subscription updates failed",
                    pass_number,
                    stats.update_failures
                );
            }

            tokio::time::sleep(self.settings.interval).await;
        }
    }

    /// Runs one complete pass and returns its counters
    ///
    /// The queue created here is dropped when the pass returns.
    pub async fn run_pass(&self) -> PassStats {
        let (tx, rx) = mpsc::channel(self.settings.queue_capacity.max(1));
        let queue: TaskQueue = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.worker_count.max(1) {
            let scheduler = self.clone();
            let queue = queue.clone();
            workers.spawn(async move { scheduler.run_worker(worker_id, queue).await });
        }
        drop(queue);

        // The sender moves into the store call; the queue closes when it returns
        match self.subscriptions.stream_url_price_pairs(tx).await {
            Ok(count) => tracing::debug!("Queued {} listings for rescan", count),
            Err(e) => tracing::error!("Couldn't get tracked listings: {}", e),
        }

        let mut stats = PassStats::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_stats) => stats.merge(&worker_stats),
                Err(e) => tracing::error!("Rescan worker failed: {}", e),
            }
        }
        stats
    }

    async fn run_worker(self, worker_id: usize, queue: TaskQueue) -> PassStats {
        let mut stats = PassStats::default();
        loop {
            let next = {
                let mut rx = queue.lock().await;
                rx.recv().await
            };
            let Some(task) = next else {
                break;
            };
            stats.record(self.process_task(&task).await);
        }
        tracing::trace!("Worker {} drained the queue after {} tasks", worker_id, stats.tasks);
        stats
    }

    /// Re-polls one listing and fans out the change, if any
    pub async fn process_task(&self, task: &PricePollTask) -> TaskOutcome {
        // Dropping the fetch future on timeout cancels the in-flight request
        let fetched =
            tokio::time::timeout(self.settings.task_timeout, self.fetcher.fetch(&task.url)).await;

        let price = match fetched {
            Err(_) => {
                tracing::warn!(
                    "Link {} is not available: no price within {:?}",
                    task.url,
                    self.settings.task_timeout
                );
                return TaskOutcome::Skipped;
            }
            Ok(Err(e)) => {
                tracing::warn!("Skipping {}: {}", task.url, e);
                return TaskOutcome::Skipped;
            }
            Ok(Ok(price)) => price,
        };

        if price == task.last_known_price {
            tracing::debug!("{}: price unchanged at {}", task.url, price);
            return TaskOutcome::Unchanged;
        }

        let subscribers = match self.subscriptions.subscribers_of(&task.url).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!("Couldn't load subscribers of {}: {}", task.url, e);
                return TaskOutcome::Skipped;
            }
        };

        // Each (url, price) pair is its own task; only this pair's subscribers belong here
        let stale: Vec<Subscription> = subscribers
            .into_iter()
            .filter(|sub| sub.price == task.last_known_price)
            .collect();
        if stale.is_empty() {
            // The price moved but every subscriber of this pair was already repriced
            tracing::debug!(
                "{}: price changed {} -> {}, no subscribers left at {}",
                task.url,
                task.last_known_price,
                price,
                task.last_known_price
            );
            return TaskOutcome::Changed {
                notified: 0,
                update_failures: 0,
            };
        }

        tracing::info!(
            "{}: price changed {} -> {}, notifying {} subscribers",
            task.url,
            task.last_known_price,
            price,
            stale.len()
        );

        if let Err(e) = self.notifier.notify_price_change(&stale, price).await {
            tracing::warn!("Price alerts for {} incomplete: {}", task.url, e);
        }

        let mut update_failures = 0;
        for sub in &stale {
            if let Err(e) = self.subscriptions.update(&sub.with_price(price)).await {
                tracing::error!("Couldn't update price for {} on {}: {}", sub.email, sub.url, e);
                update_failures += 1;
            }
        }

        TaskOutcome::Changed {
            notified: stale.len(),
            update_failures,
        }
    }
}
