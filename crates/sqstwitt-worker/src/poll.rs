//! The receive/dispatch loop.
//!
//! One loop receives a batch, spawns a handler task per message (or one task
//! per batch in batch-classify mode), and sleeps a fixed interval. Spawning is
//! gated by a semaphore so at most `max_in_flight` messages are being handled
//! at once; when the gate is full the loop waits before receiving more.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::handler::{MessageHandler, MessageOutcome};
use crate::ports::{MessageQueue, SentimentClassifier, TweetRepository};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub batch_size: i32,
    pub wait_secs: i32,
    pub interval: Duration,
    pub max_in_flight: usize,
    pub batch_classify: bool,
}

impl PollSettings {
    #[must_use]
    pub fn from_app_config(config: &sqstwitt_core::AppConfig) -> Self {
        Self {
            batch_size: config.receive_batch_size,
            wait_secs: config.receive_wait_secs,
            interval: Duration::from_secs(config.poll_interval_secs),
            max_in_flight: config.max_in_flight,
            batch_classify: config.batch_classify,
        }
    }
}

/// Running totals over the life of a loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub batches: u64,
    pub received: u64,
    pub receive_errors: u64,
    pub persisted: u64,
    pub acknowledged: u64,
    /// Left on the queue for redelivery, including dead-letter forwards
    /// whose delete failed.
    pub retried: u64,
    pub rejected: u64,
    pub dead_lettered: u64,
    /// Handler tasks that panicked.
    pub crashed: u64,
}

impl PollStats {
    fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Persisted { acknowledged, .. } => {
                self.persisted += 1;
                if *acknowledged {
                    self.acknowledged += 1;
                }
            }
            MessageOutcome::Retry
            | MessageOutcome::DeadLettered { removed: false } => self.retried += 1,
            MessageOutcome::Rejected => self.rejected += 1,
            MessageOutcome::DeadLettered { removed: true } => self.dead_lettered += 1,
        }
    }

    fn absorb(&mut self, joined: Result<Vec<MessageOutcome>, JoinError>) {
        match joined {
            Ok(outcomes) => outcomes.iter().for_each(|o| self.record(o)),
            Err(e) => {
                self.crashed += 1;
                tracing::error!(error = %e, "message handler task failed");
            }
        }
    }
}

pub struct PollLoop<Q, C, R> {
    queue: Arc<Q>,
    handler: MessageHandler<Q, C, R>,
    settings: PollSettings,
    permits: Arc<Semaphore>,
}

impl<Q, C, R> PollLoop<Q, C, R>
where
    Q: MessageQueue,
    C: SentimentClassifier,
    R: TweetRepository,
{
    #[must_use]
    pub fn new(queue: Arc<Q>, handler: MessageHandler<Q, C, R>, settings: PollSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_in_flight.max(1)));
        Self {
            queue,
            handler,
            settings,
            permits,
        }
    }

    /// Polls until `shutdown` resolves, then waits for in-flight handlers.
    ///
    /// Receive errors are logged and retried after the poll interval; they
    /// never end the loop.
    pub async fn run<S>(&self, shutdown: S) -> PollStats
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = PollStats::default();
        let mut tasks = JoinSet::new();

        tracing::info!(
            batch_size = self.settings.batch_size,
            wait_secs = self.settings.wait_secs,
            interval_secs = self.settings.interval.as_secs(),
            max_in_flight = self.settings.max_in_flight,
            batch_classify = self.settings.batch_classify,
            "poll loop started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                () = self.poll_once(&mut tasks, &mut stats) => {}
            }

            while let Some(joined) = tasks.try_join_next() {
                stats.absorb(joined);
            }

            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        tracing::info!(
            in_flight = tasks.len(),
            "shutdown requested; waiting for in-flight handlers"
        );
        drain(&mut tasks, &mut stats).await;
        log_stats(&stats, "poll loop stopped");
        stats
    }

    /// Receives and handles exactly one batch, waiting for every handler.
    pub async fn run_once(&self) -> PollStats {
        let mut stats = PollStats::default();
        let mut tasks = JoinSet::new();
        self.poll_once(&mut tasks, &mut stats).await;
        drain(&mut tasks, &mut stats).await;
        log_stats(&stats, "single batch complete");
        stats
    }

    async fn poll_once(
        &self,
        tasks: &mut JoinSet<Vec<MessageOutcome>>,
        stats: &mut PollStats,
    ) {
        let messages = match self
            .queue
            .receive(self.settings.batch_size, self.settings.wait_secs)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                stats.receive_errors += 1;
                tracing::error!(error = %e, "failed to receive messages; retrying after poll interval");
                return;
            }
        };

        stats.batches += 1;
        stats.received += u64::try_from(messages.len()).unwrap_or(u64::MAX);
        tracing::info!(
            count = messages.len(),
            in_flight = tasks.len(),
            "got messages"
        );

        if messages.is_empty() {
            return;
        }

        if self.settings.batch_classify {
            self.dispatch_batch(tasks, messages).await;
        } else {
            for message in messages {
                self.dispatch(tasks, message).await;
            }
        }
    }

    async fn dispatch(
        &self,
        tasks: &mut JoinSet<Vec<MessageOutcome>>,
        message: sqstwitt_core::RawMessage,
    ) {
        // The semaphore is never closed, so acquire cannot fail.
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return;
        };
        let handler = self.handler.clone();
        tasks.spawn(async move {
            let outcome = handler.handle(message).await;
            drop(permit);
            vec![outcome]
        });
    }

    async fn dispatch_batch(
        &self,
        tasks: &mut JoinSet<Vec<MessageOutcome>>,
        messages: Vec<sqstwitt_core::RawMessage>,
    ) {
        // A batch never asks for more than the gate holds, or it could wait forever.
        let wanted = messages.len().clamp(1, self.settings.max_in_flight.max(1));
        let Ok(permits) = Arc::clone(&self.permits)
            .acquire_many_owned(u32::try_from(wanted).unwrap_or(u32::MAX))
            .await
        else {
            return;
        };
        let handler = self.handler.clone();
        tasks.spawn(async move {
            let outcomes = handler.handle_batch(messages, wanted).await;
            drop(permits);
            outcomes
        });
    }
}

async fn drain(tasks: &mut JoinSet<Vec<MessageOutcome>>, stats: &mut PollStats) {
    while let Some(joined) = tasks.join_next().await {
        stats.absorb(joined);
    }
}

fn log_stats(stats: &PollStats, message: &str) {
    tracing::info!(
        batches = stats.batches,
        received = stats.received,
        receive_errors = stats.receive_errors,
        persisted = stats.persisted,
        acknowledged = stats.acknowledged,
        retried = stats.retried,
        rejected = stats.rejected,
        dead_lettered = stats.dead_lettered,
        crashed = stats.crashed,
        "{message}"
    );
}
