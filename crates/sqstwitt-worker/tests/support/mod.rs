//! In-memory stand-ins for the queue, classifier, and document store.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use sqstwitt_core::{EnrichedRecord, RawMessage};
use sqstwitt_worker::{
    HandlerSettings, MessageHandler, MessageQueue, SentimentClassifier, TweetRepository,
};
use tokio::sync::Semaphore;

pub fn positive() -> Value {
    json!({"results":[{"label":"positive","score":0.9}]})
}

pub fn settings() -> HandlerSettings {
    HandlerSettings {
        call_timeout: Duration::from_secs(5),
        ack_enabled: true,
        max_receive_count: 5,
    }
}

pub fn handler(
    queue: &Arc<MemoryQueue>,
    classifier: &Arc<FakeClassifier>,
    repository: &Arc<MemoryRepository>,
    settings: HandlerSettings,
) -> MessageHandler<MemoryQueue, FakeClassifier, MemoryRepository> {
    MessageHandler::new(
        Arc::clone(queue),
        Arc::clone(classifier),
        Arc::clone(repository),
        settings,
    )
}

/// Polls `condition` every 10ms, giving up after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

struct Stored {
    message_id: String,
    body: String,
    receive_count: u32,
    /// Receipt of the current delivery; `None` while visible.
    receipt: Option<String>,
}

#[derive(Default)]
struct QueueState {
    messages: Vec<Stored>,
    next_id: usize,
    deleted: Vec<String>,
    dead_letters: Vec<String>,
    receive_calls: usize,
    failing_receives: usize,
    failing_deletes: bool,
}

/// A queue with SQS-style visibility: received messages stay hidden until
/// deleted or until [`MemoryQueue::expire_visibility`] is called.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    dead_letter_enabled: bool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dead_letter_queue() -> Self {
        Self {
            dead_letter_enabled: true,
            ..Self::default()
        }
    }

    pub fn push(&self, body: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let message_id = format!("m{}", state.next_id);
        state.messages.push(Stored {
            message_id: message_id.clone(),
            body: body.to_string(),
            receive_count: 0,
            receipt: None,
        });
        message_id
    }

    /// The next `n` receive calls fail.
    pub fn fail_receives(&self, n: usize) {
        self.state.lock().unwrap().failing_receives = n;
    }

    /// Every delete fails from now on.
    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().failing_deletes = true;
    }

    /// Makes every in-flight message visible again, as a lapsed visibility
    /// timeout would.
    pub fn expire_visibility(&self) {
        for stored in &mut self.state.lock().unwrap().messages {
            stored.receipt = None;
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn dead_letters(&self) -> Vec<String> {
        self.state.lock().unwrap().dead_letters.clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.state.lock().unwrap().receive_calls
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    /// Receives one message synchronously, for handler-level tests.
    pub fn take_one(&self) -> RawMessage {
        let mut messages = self.receive_now(1).unwrap();
        assert_eq!(messages.len(), 1, "queue had no visible message");
        messages.remove(0)
    }

    fn receive_now(&self, max_messages: i32) -> Result<Vec<RawMessage>, String> {
        let mut state = self.state.lock().unwrap();
        state.receive_calls += 1;
        if state.failing_receives > 0 {
            state.failing_receives -= 1;
            return Err("queue unavailable".to_string());
        }

        let limit = usize::try_from(max_messages).unwrap_or(0);
        let mut received = Vec::new();
        for stored in state.messages.iter_mut().filter(|s| s.receipt.is_none()) {
            if received.len() == limit {
                break;
            }
            stored.receive_count += 1;
            let receipt = format!("{}-r{}", stored.message_id, stored.receive_count);
            stored.receipt = Some(receipt.clone());
            received.push(RawMessage {
                message_id: stored.message_id.clone(),
                receipt_handle: receipt,
                body: stored.body.clone(),
                receive_count: stored.receive_count,
            });
        }
        Ok(received)
    }
}

impl MessageQueue for MemoryQueue {
    type Error = String;

    async fn receive(&self, max_messages: i32, _wait_secs: i32) -> Result<Vec<RawMessage>, String> {
        self.receive_now(max_messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes {
            return Err("delete rejected".to_string());
        }
        let position = state
            .messages
            .iter()
            .position(|s| s.receipt.as_deref() == Some(receipt_handle))
            .ok_or_else(|| format!("unknown receipt handle {receipt_handle}"))?;
        let stored = state.messages.remove(position);
        state.deleted.push(stored.message_id);
        Ok(())
    }

    async fn dead_letter(&self, message: &RawMessage) -> Result<bool, String> {
        if !self.dead_letter_enabled {
            return Ok(false);
        }
        self.state
            .lock()
            .unwrap()
            .dead_letters
            .push(message.body.clone());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub enum Mode {
    Fixed(Value),
    Fail,
    /// Returns `{"echo": <text>}` so results can be traced to their input.
    EchoText,
}

pub struct FakeClassifier {
    mode: Mode,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            delay: None,
            gate: None,
            calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Each call holds until a permit is added to `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn result_for(&self, text: &str) -> Result<Value, String> {
        match &self.mode {
            Mode::Fixed(value) => Ok(value.clone()),
            Mode::Fail => Err("classifier returned HTTP 503".to_string()),
            Mode::EchoText => Ok(json!({ "echo": text })),
        }
    }
}

impl SentimentClassifier for FakeClassifier {
    type Error = String;

    async fn classify(&self, text: &str) -> Result<Value, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        self.result_for(text)
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<Value>, String> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        texts.iter().map(|text| self.result_for(text)).collect()
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Stores records in insertion order under keys `key1`, `key2`, ...
#[derive(Default)]
pub struct MemoryRepository {
    records: Mutex<Vec<(String, Value)>>,
    failing: AtomicBool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of inserts that were running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<(String, Value)> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl TweetRepository for MemoryRepository {
    type Error = String;

    async fn insert(&self, record: &EnrichedRecord) -> Result<String, String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err("document store unavailable".to_string());
        }
        let mut records = self.records.lock().unwrap();
        let key = format!("key{}", records.len() + 1);
        records.push((key.clone(), record.clone().into_value()));
        Ok(key)
    }
}
