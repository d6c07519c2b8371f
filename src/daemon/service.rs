//! Shared handle to the engine and its refresh tasks.
//!
//! Every entry point locks the engine, runs one operation to completion and
//! then reconciles the refresh tasks while still holding the lock, so the
//! task set always matches the state that was just written.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::time::Duration;

use crate::config::{POMODORO_REFRESH_PERIOD, STOPWATCH_REFRESH_PERIOD, TIMER_REFRESH_PERIOD};
use crate::types::{DaemonEvent, Mode, Snapshot};

use super::engine::Engine;
use super::refresh::RefreshTasks;
use super::wake::WakeFired;

/// Cloneable handle used by the IPC handler and the daemon loop.
#[derive(Clone)]
pub struct TimerService {
    engine: Arc<Mutex<Engine>>,
    refresh: Arc<Mutex<RefreshTasks>>,
}

impl TimerService {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            refresh: Arc::new(Mutex::new(RefreshTasks::new())),
        }
    }

    /// Fills in missing records, restores wakes and restarts the
    /// refresh tasks of every running mode.
    pub async fn recover(&self) {
        let mut engine = self.engine.lock().await;
        engine.install_defaults();
        engine.recover();
        self.sync_refresh(&engine).await;
    }

    /// Runs `op` against the engine and reconciles refresh tasks afterwards.
    pub async fn execute<R>(&self, op: impl FnOnce(&mut Engine) -> R) -> R {
        let mut engine = self.engine.lock().await;
        let result = op(&mut engine);
        self.sync_refresh(&engine).await;
        result
    }

    /// Passes a fired wake to the engine. Returns true if state changed.
    pub async fn handle_wake(&self, fired: WakeFired) -> bool {
        self.execute(|engine| engine.handle_wake(&fired)).await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.engine.lock().await.snapshot()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.engine.lock().await.subscribe()
    }

    /// Returns true if a refresh task for `mode` is alive.
    pub async fn is_refreshing(&self, mode: Mode) -> bool {
        self.refresh.lock().await.is_active(mode)
    }

    /// Stops every refresh task.
    pub async fn shutdown(&self) {
        self.refresh.lock().await.stop_all();
    }

    async fn sync_refresh(&self, engine: &Engine) {
        let mut refresh = self.refresh.lock().await;

        for mode in Mode::ALL {
            if !engine.is_running(mode) {
                refresh.stop(mode);
                continue;
            }
            if refresh.is_active(mode) || !engine.needs_refresh(mode) {
                continue;
            }

            let handle = Arc::clone(&self.engine);
            refresh.start(mode, refresh_period(mode), move || {
                let handle = Arc::clone(&handle);
                async move { handle.lock().await.refresh(mode) }
            });
        }
    }
}

fn refresh_period(mode: Mode) -> Duration {
    match mode {
        Mode::Timer => TIMER_REFRESH_PERIOD,
        Mode::Stopwatch => STOPWATCH_REFRESH_PERIOD,
        Mode::Pomodoro => POMODORO_REFRESH_PERIOD,
    }
}
