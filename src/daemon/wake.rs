//! Scheduled wakes.
//!
//! A wake is a named one-shot alarm at an absolute wall-clock instant. At
//! most one wake is pending per key; arming a key again replaces the old
//! one. Firing is reported on a channel as a [`WakeFired`] tagged with the
//! generation it was armed under, and [`WakeScheduler::consume`] accepts a
//! given generation only once. Fires from a cancelled or replaced wake are
//! therefore rejected even if they were already queued.
//!
//! Deadline tasks sleep in bounded slices and re-read the wall clock after
//! each one, so a host that was suspended past the deadline fires as soon as
//! it resumes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use super::timekeeping::Clock;

/// Longest single sleep before the wall clock is checked again.
const MAX_SLEEP_SLICE_MS: i64 = 1_000;

// ============================================================================
// WakeKey / WakeFired
// ============================================================================

/// Modes that own a wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeKey {
    Timer,
    Pomodoro,
}

impl WakeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeKey::Timer => "timer",
            WakeKey::Pomodoro => "pomodoro",
        }
    }
}

/// A wake reached its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeFired {
    pub key: WakeKey,
    pub generation: u64,
    pub at_ms: i64,
}

// ============================================================================
// WakeScheduler
// ============================================================================

struct PendingWake {
    at_ms: i64,
    generation: u64,
    task: JoinHandle<()>,
}

/// Owns the pending wakes and their deadline tasks.
///
/// Must be used from within a tokio runtime.
pub struct WakeScheduler {
    clock: Arc<dyn Clock>,
    fired_tx: mpsc::UnboundedSender<WakeFired>,
    pending: HashMap<WakeKey, PendingWake>,
    next_generation: u64,
}

impl WakeScheduler {
    /// Creates a scheduler that reports fires on `fired_tx`.
    pub fn new(clock: Arc<dyn Clock>, fired_tx: mpsc::UnboundedSender<WakeFired>) -> Self {
        Self {
            clock,
            fired_tx,
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Arms `key` to fire at `at_ms`, replacing any pending wake for it.
    ///
    /// Returns the generation of the new wake.
    pub fn arm(&mut self, key: WakeKey, at_ms: i64) -> u64 {
        self.cancel(key);

        self.next_generation += 1;
        let generation = self.next_generation;
        let clock = Arc::clone(&self.clock);
        let fired_tx = self.fired_tx.clone();

        let task = tokio::spawn(async move {
            loop {
                let now = clock.now_ms();
                if now >= at_ms {
                    break;
                }
                let slice = (at_ms - now).min(MAX_SLEEP_SLICE_MS) as u64;
                sleep(Duration::from_millis(slice)).await;
            }

            let fired = WakeFired {
                key,
                generation,
                at_ms,
            };
            if fired_tx.send(fired).is_err() {
                tracing::debug!("wake '{}' fired after the receiver closed", key.as_str());
            }
        });

        tracing::debug!("wake '{}' armed for {} (gen {})", key.as_str(), at_ms, generation);
        self.pending.insert(
            key,
            PendingWake {
                at_ms,
                generation,
                task,
            },
        );
        generation
    }

    /// Clears the wake for `key`. Returns false if none was pending.
    pub fn cancel(&mut self, key: WakeKey) -> bool {
        match self.pending.remove(&key) {
            Some(wake) => {
                wake.task.abort();
                tracing::debug!("wake '{}' cancelled (gen {})", key.as_str(), wake.generation);
                true
            }
            None => false,
        }
    }

    /// Accepts a fire event if it belongs to the currently pending wake.
    ///
    /// The wake is removed on acceptance, so each arm is consumed at most
    /// once. Stale events (cancelled or re-armed since) return false.
    pub fn consume(&mut self, fired: &WakeFired) -> bool {
        match self.pending.get(&fired.key) {
            Some(wake) if wake.generation == fired.generation => {
                self.pending.remove(&fired.key);
                true
            }
            _ => false,
        }
    }

    /// Deadline of the pending wake for `key`.
    pub fn deadline(&self, key: WakeKey) -> Option<i64> {
        self.pending.get(&key).map(|wake| wake.at_ms)
    }

    /// All pending deadlines, for persistence.
    pub fn deadlines(&self) -> BTreeMap<WakeKey, i64> {
        self.pending
            .iter()
            .map(|(key, wake)| (*key, wake.at_ms))
            .collect()
    }

    /// Re-arms persisted wakes. Overdue ones fire right away.
    pub fn restore(&mut self, deadlines: &BTreeMap<WakeKey, i64>) {
        for (key, at_ms) in deadlines {
            self.arm(*key, *at_ms);
        }
    }
}

impl Drop for WakeScheduler {
    fn drop(&mut self) {
        for wake in self.pending.values() {
            wake.task.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
