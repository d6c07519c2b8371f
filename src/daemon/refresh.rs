//! Periodic recompute tasks.
//!
//! Each running mode owns at most one task that re-derives its displayed
//! value from the stored timestamps on a fixed period. The registry is
//! reconciled after every state change; a task also ends on its own once its
//! tick reports there is nothing left to refresh.

use std::collections::HashMap;
use std::future::Future;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::types::Mode;

/// Registry of refresh tasks, one per mode.
#[derive(Debug, Default)]
pub struct RefreshTasks {
    tasks: HashMap<Mode, JoinHandle<()>>,
}

impl RefreshTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the refresh task for `mode`, replacing any existing one.
    ///
    /// `tick` runs every `period` until it returns false.
    pub fn start<F, Fut>(&mut self, mode: Mode, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.stop(mode);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !tick().await {
                    break;
                }
            }
            tracing::debug!("refresh task for {} finished", mode);
        });

        tracing::debug!("refresh task for {} started ({:?})", mode, period);
        self.tasks.insert(mode, task);
    }

    /// Aborts the task for `mode`. Returns false if there was none.
    pub fn stop(&mut self, mode: Mode) -> bool {
        match self.tasks.remove(&mode) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Returns true if a task for `mode` exists and has not finished.
    pub fn is_active(&self, mode: Mode) -> bool {
        self.tasks
            .get(&mode)
            .is_some_and(|task| !task.is_finished())
    }

    pub fn stop_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

impl Drop for RefreshTasks {
    fn drop(&mut self) {
        self.stop_all();
    }
}
