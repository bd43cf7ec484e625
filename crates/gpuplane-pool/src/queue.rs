//! Keyed reconcile queue.
//!
//! A bounded pool of workers drains the queue concurrently across unrelated
//! keys, while every operation on a single key is serialized: a key is never
//! handed to two workers at once, and events arriving for an in-flight key
//! are collapsed into one follow-up pass. Errors requeue with exponential
//! backoff and jitter.

use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const BACKOFF_BASE: Duration = Duration::from_millis(10);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Identity of one reconcile target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReconcileKey {
    pub kind: String,
    /// Empty for cluster-scoped objects.
    pub namespace: String,
    pub name: String,
}

impl ReconcileKey {
    pub fn namespaced(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn cluster(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: String::new(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Aggregated outcome of a reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Run again immediately.
    pub requeue: bool,
    /// Run again after a delay; merged as min-nonzero.
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn requeue() -> Self {
        Self {
            requeue: true,
            requeue_after: None,
        }
    }

    pub fn after(delay: Duration) -> Self {
        Self {
            requeue: false,
            requeue_after: Some(delay),
        }
    }

    /// Merge per-handler outcomes: `requeue` is any-true, `requeue_after`
    /// the smallest nonzero delay.
    pub fn merge(self, other: Self) -> Self {
        let requeue_after = match (self.requeue_after, other.requeue_after) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            requeue: self.requeue || other.requeue,
            requeue_after,
        }
    }
}

struct QueueState {
    tx: mpsc::UnboundedSender<ReconcileKey>,
    rx: Mutex<mpsc::UnboundedReceiver<ReconcileKey>>,
    /// Keys queued and not yet picked up.
    pending: Mutex<HashSet<ReconcileKey>>,
    /// Keys currently held by a worker.
    in_flight: Mutex<HashSet<ReconcileKey>>,
    /// Keys that arrived while in flight; re-queued when the pass finishes.
    dirty: Mutex<HashSet<ReconcileKey>>,
    /// Consecutive failures per key.
    failures: Mutex<HashMap<ReconcileKey, u32>>,
}

/// The work queue feeding the reconcile workers.
#[derive(Clone)]
pub struct ReconcileQueue {
    state: Arc<QueueState>,
}

impl Default for ReconcileQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcileQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(QueueState {
                tx,
                rx: Mutex::new(rx),
                pending: Mutex::new(HashSet::new()),
                in_flight: Mutex::new(HashSet::new()),
                dirty: Mutex::new(HashSet::new()),
                failures: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Enqueue a key; duplicates of pending or in-flight keys collapse.
    pub async fn add(&self, key: ReconcileKey) {
        if self.state.in_flight.lock().await.contains(&key) {
            self.state.dirty.lock().await.insert(key);
            return;
        }
        if self.state.pending.lock().await.insert(key.clone()) {
            let _ = self.state.tx.send(key);
        }
    }

    /// Number of keys waiting to be picked up.
    pub async fn pending_len(&self) -> usize {
        self.state.pending.lock().await.len()
    }

    /// Enqueue a key after a delay.
    pub fn add_after(&self, key: ReconcileKey, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key).await;
        });
    }

    /// Run `workers` reconcile workers forever.
    pub async fn run<F, Fut>(&self, workers: usize, handler: F)
    where
        F: Fn(ReconcileKey) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<ReconcileOutcome, anyhow::Error>> + Send + 'static,
    {
        let mut tasks = Vec::new();
        for _ in 0..workers.max(1) {
            let queue = self.clone();
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    let key = {
                        let mut rx = queue.state.rx.lock().await;
                        match rx.recv().await {
                            Some(key) => key,
                            None => return,
                        }
                    };
                    queue.state.pending.lock().await.remove(&key);
                    queue.state.in_flight.lock().await.insert(key.clone());

                    let outcome = handler(key.clone()).await;

                    queue.state.in_flight.lock().await.remove(&key);
                    queue.finish(key, outcome).await;
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    async fn finish(&self, key: ReconcileKey, outcome: Result<ReconcileOutcome, anyhow::Error>) {
        match outcome {
            Ok(outcome) => {
                self.state.failures.lock().await.remove(&key);
                if outcome.requeue {
                    self.add(key.clone()).await;
                } else if let Some(delay) = outcome.requeue_after {
                    debug!(key = %key, ?delay, "requeue after");
                    self.add_after(key.clone(), delay);
                }
            }
            Err(error) => {
                let attempts = {
                    let mut failures = self.state.failures.lock().await;
                    let attempts = failures.entry(key.clone()).or_insert(0);
                    *attempts += 1;
                    *attempts
                };
                let delay = backoff_delay(attempts);
                warn!(key = %key, attempts, ?delay, %error, "reconcile failed, backing off");
                self.add_after(key.clone(), delay);
            }
        }

        // A key that got events mid-pass gets one more pass.
        if self.state.dirty.lock().await.remove(&key) {
            self.add(key).await;
        }
    }
}

fn backoff_delay(attempts: u32) -> Duration {
    let exp = attempts.saturating_sub(1).min(16);
    let base = BACKOFF_BASE.saturating_mul(1u32 << exp).min(BACKOFF_CAP);
    let jitter = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(jitter)
}
