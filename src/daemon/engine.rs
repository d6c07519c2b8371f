//! Core orchestration.
//!
//! The engine owns the state store, the wake scheduler and the notifier.
//! Every command reads the current record from the store, lets the mode's
//! state machine compute the new record, writes it back together with the
//! pending wakes, and arms or cancels the mode's wake. Callers serialize
//! access by holding the engine behind a mutex.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::notification::{
    create_session_change_content, create_timer_complete_content, Notifier,
};
use crate::types::{DaemonEvent, Mode, Snapshot};

use super::error::EngineError;
use super::pomodoro::{PomodoroSettings, PomodoroState};
use super::stopwatch::StopwatchState;
use super::store::{keys, StateStore, StoreError};
use super::timekeeping::Clock;
use super::timer::TimerState;
use super::wake::{WakeFired, WakeKey, WakeScheduler};

/// Capacity of the event channel. Slow subscribers skip older events.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Timekeeping engine for all three modes.
pub struct Engine {
    store: StateStore,
    clock: Arc<dyn Clock>,
    wakes: WakeScheduler,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<DaemonEvent>,
}

impl Engine {
    /// Creates an engine. Wake fires are reported on `fired_tx` and must be
    /// passed back through [`Engine::handle_wake`].
    pub fn new(
        store: StateStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        fired_tx: mpsc::UnboundedSender<WakeFired>,
    ) -> Self {
        let wakes = WakeScheduler::new(Arc::clone(&clock), fired_tx);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            clock,
            wakes,
            notifier,
            events,
        }
    }

    // ------------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------------

    /// Writes the default record for every key the store does not hold yet.
    ///
    /// Existing records are left untouched. Returns true if anything was
    /// written.
    pub fn install_defaults(&mut self) -> bool {
        match self.try_install_defaults() {
            Ok(0) => false,
            Ok(count) => {
                tracing::info!("初期状態を書き込みました ({}件)", count);
                true
            }
            Err(e) => {
                tracing::error!("初期状態の書き込みに失敗しました: {}", e);
                false
            }
        }
    }

    fn try_install_defaults(&mut self) -> Result<usize, StoreError> {
        let defaults = Snapshot::default();
        let records = [
            (keys::TIMER_STATE, serde_json::to_value(&defaults.timer_state)?),
            (
                keys::STOPWATCH_STATE,
                serde_json::to_value(&defaults.stopwatch_state)?,
            ),
            (
                keys::POMODORO_STATE,
                serde_json::to_value(&defaults.pomodoro_state)?,
            ),
            (
                keys::POMODORO_SETTINGS,
                serde_json::to_value(defaults.pomodoro_settings)?,
            ),
            (keys::SCHEDULED_WAKES, Value::Object(Default::default())),
            (
                keys::PINNED_TIMER_TYPE,
                serde_json::to_value(defaults.pinned_timer_type)?,
            ),
        ];

        let missing: Vec<(&str, Value)> = records
            .into_iter()
            .filter(|(key, _)| !self.store.contains(key))
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let count = missing.len();
        self.store.set_many(missing)?;
        Ok(count)
    }

    /// Restores wakes and repairs records left behind by a previous run.
    ///
    /// Persisted wakes are re-armed (overdue ones fire immediately). A
    /// running countdown without a persisted wake is re-armed from its end
    /// time. Wakes for modes that are no longer running are dropped.
    pub fn recover(&mut self) {
        let now = self.clock.now_ms();
        let persisted: BTreeMap<WakeKey, i64> = self.store.get(keys::SCHEDULED_WAKES);

        let mut timer: TimerState = self.store.get(keys::TIMER_STATE);
        if timer.is_running && timer.end_time.is_none() {
            tracing::warn!("終了時刻のないタイマーを一時停止状態に戻します");
            timer.pause(now);
            self.save(keys::TIMER_STATE, &timer);
        }

        let mut pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
        if pomodoro.is_running && pomodoro.end_time.is_none() {
            tracing::warn!("終了時刻のないポモドーロを一時停止状態に戻します");
            pomodoro.pause(now);
            self.save(keys::POMODORO_STATE, &pomodoro);
        }

        let mut stopwatch: StopwatchState = self.store.get(keys::STOPWATCH_STATE);
        if stopwatch.is_running && stopwatch.start_time.is_none() {
            tracing::warn!("開始時刻のないストップウォッチを一時停止状態に戻します");
            stopwatch.is_running = false;
            stopwatch.paused_elapsed = stopwatch.elapsed_ms;
            self.save(keys::STOPWATCH_STATE, &stopwatch);
        }

        let running = [
            (WakeKey::Timer, timer.is_running, timer.end_time),
            (WakeKey::Pomodoro, pomodoro.is_running, pomodoro.end_time),
        ];

        let mut wakes = BTreeMap::new();
        for (key, is_running, end_time) in running {
            if !is_running {
                if persisted.contains_key(&key) {
                    tracing::debug!("停止中のモードのwake '{}' を破棄します", key.as_str());
                }
                continue;
            }
            if let Some(at_ms) = persisted.get(&key).copied().or(end_time) {
                wakes.insert(key, at_ms);
            }
        }

        self.wakes.restore(&wakes);
        self.save_wakes();
        tracing::info!("{}件のwakeを復元しました", wakes.len());
    }

    // ------------------------------------------------------------------------
    // Timer
    // ------------------------------------------------------------------------

    /// Starts (or restarts) the countdown timer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDuration` for a zero duration. Nothing is written.
    pub fn start_timer(&mut self, duration_secs: u64) -> Result<(), EngineError> {
        let now = self.clock.now_ms();
        let mut timer: TimerState = self.store.get(keys::TIMER_STATE);
        let end_time = timer.start(duration_secs, now)?;

        self.wakes.arm(WakeKey::Timer, end_time);
        self.save_with_wakes(keys::TIMER_STATE, &timer);
        tracing::info!("タイマー開始: {}秒", duration_secs);
        Ok(())
    }

    /// Pauses the timer. Returns false if it was not running.
    pub fn pause_timer(&mut self) -> bool {
        let now = self.clock.now_ms();
        let mut timer: TimerState = self.store.get(keys::TIMER_STATE);
        if !timer.pause(now) {
            return false;
        }

        self.wakes.cancel(WakeKey::Timer);
        self.save_with_wakes(keys::TIMER_STATE, &timer);
        tracing::info!("タイマー一時停止: 残り{}秒", timer.remaining_seconds);
        true
    }

    pub fn reset_timer(&mut self) {
        let mut timer: TimerState = self.store.get(keys::TIMER_STATE);
        timer.reset();

        self.wakes.cancel(WakeKey::Timer);
        self.save_with_wakes(keys::TIMER_STATE, &timer);
        tracing::info!("タイマーリセット");
    }

    fn complete_timer(&mut self) -> bool {
        let mut timer: TimerState = self.store.get(keys::TIMER_STATE);
        if !timer.is_running {
            self.save_wakes();
            return false;
        }

        timer.complete();
        self.save_with_wakes(keys::TIMER_STATE, &timer);
        tracing::info!("タイマー完了");

        self.notifier.notify(&create_timer_complete_content());
        self.emit(DaemonEvent::TimerComplete);
        true
    }

    // ------------------------------------------------------------------------
    // Stopwatch
    // ------------------------------------------------------------------------

    /// Starts or resumes the stopwatch. Returns false if already running.
    pub fn start_stopwatch(&mut self) -> bool {
        let now = self.clock.now_ms();
        let mut stopwatch: StopwatchState = self.store.get(keys::STOPWATCH_STATE);
        if !stopwatch.start(now) {
            return false;
        }

        self.save(keys::STOPWATCH_STATE, &stopwatch);
        tracing::info!("ストップウォッチ開始: {}ms から", stopwatch.paused_elapsed);
        true
    }

    /// Pauses the stopwatch. Returns false if it was not running.
    pub fn pause_stopwatch(&mut self) -> bool {
        let now = self.clock.now_ms();
        let mut stopwatch: StopwatchState = self.store.get(keys::STOPWATCH_STATE);
        if !stopwatch.pause(now) {
            return false;
        }

        self.save(keys::STOPWATCH_STATE, &stopwatch);
        tracing::info!("ストップウォッチ一時停止: {}ms", stopwatch.elapsed_ms);
        true
    }

    pub fn reset_stopwatch(&mut self) {
        let mut stopwatch: StopwatchState = self.store.get(keys::STOPWATCH_STATE);
        stopwatch.reset();
        self.save(keys::STOPWATCH_STATE, &stopwatch);
        tracing::info!("ストップウォッチリセット");
    }

    // ------------------------------------------------------------------------
    // Pomodoro
    // ------------------------------------------------------------------------

    /// Starts or resumes the current session. Returns false if already running.
    pub fn start_pomodoro(&mut self) -> bool {
        let now = self.clock.now_ms();
        let settings: PomodoroSettings = self.store.get(keys::POMODORO_SETTINGS);
        let mut pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
        let Some(end_time) = pomodoro.start(now, &settings) else {
            return false;
        };

        self.wakes.arm(WakeKey::Pomodoro, end_time);
        self.save_with_wakes(keys::POMODORO_STATE, &pomodoro);
        tracing::info!(
            "ポモドーロ開始: {} (サイクル{}), 残り{}秒",
            pomodoro.session_type,
            pomodoro.cycle,
            pomodoro.remaining_seconds
        );
        true
    }

    /// Pauses the current session. Returns false if it was not running.
    pub fn pause_pomodoro(&mut self) -> bool {
        let now = self.clock.now_ms();
        let mut pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
        if !pomodoro.pause(now) {
            return false;
        }

        self.wakes.cancel(WakeKey::Pomodoro);
        self.save_with_wakes(keys::POMODORO_STATE, &pomodoro);
        tracing::info!("ポモドーロ一時停止: 残り{}秒", pomodoro.remaining_seconds);
        true
    }

    /// Back to an idle first work session sized from the current settings.
    pub fn reset_pomodoro(&mut self) {
        let settings: PomodoroSettings = self.store.get(keys::POMODORO_SETTINGS);
        let mut pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
        pomodoro.reset(&settings);

        self.wakes.cancel(WakeKey::Pomodoro);
        self.save_with_wakes(keys::POMODORO_STATE, &pomodoro);
        tracing::info!("ポモドーロリセット");
    }

    /// Stores new durations. An idle session is reset to pick them up; a
    /// running session keeps its current countdown.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if a duration is out of range. Nothing is
    /// written.
    pub fn update_pomodoro_settings(
        &mut self,
        settings: PomodoroSettings,
    ) -> Result<(), EngineError> {
        settings.validate()?;

        self.save(keys::POMODORO_SETTINGS, &settings);
        tracing::info!(
            "ポモドーロ設定更新: 作業{}分 / 短い休憩{}分 / 長い休憩{}分",
            settings.work_duration,
            settings.short_break_duration,
            settings.long_break_duration
        );

        let pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
        if !pomodoro.is_running {
            self.reset_pomodoro();
        }
        Ok(())
    }

    fn advance_pomodoro(&mut self) -> bool {
        let now = self.clock.now_ms();
        let mut pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
        if !pomodoro.is_running {
            self.save_wakes();
            return false;
        }

        let settings: PomodoroSettings = self.store.get(keys::POMODORO_SETTINGS);
        let end_time = pomodoro.advance(now, &settings);

        self.wakes.arm(WakeKey::Pomodoro, end_time);
        self.save_with_wakes(keys::POMODORO_STATE, &pomodoro);
        tracing::info!(
            "ポモドーロ切り替え: {} (サイクル{})",
            pomodoro.session_type,
            pomodoro.cycle
        );

        self.notifier
            .notify(&create_session_change_content(pomodoro.session_type));
        self.emit(DaemonEvent::PomodoroSessionChange {
            session_type: pomodoro.session_type,
            cycle: pomodoro.cycle,
        });
        true
    }

    // ------------------------------------------------------------------------
    // Wakes
    // ------------------------------------------------------------------------

    /// Handles a fired wake.
    ///
    /// Stale fires (cancelled or re-armed since) and fires for a mode that is
    /// no longer running are dropped. Returns true if state changed.
    pub fn handle_wake(&mut self, fired: &WakeFired) -> bool {
        if !self.wakes.consume(fired) {
            tracing::debug!(
                "古いwake '{}' (gen {}) を無視します",
                fired.key.as_str(),
                fired.generation
            );
            return false;
        }

        match fired.key {
            WakeKey::Timer => self.complete_timer(),
            WakeKey::Pomodoro => self.advance_pomodoro(),
        }
    }

    /// Deadline of the pending wake for `key`.
    pub fn wake_deadline(&self, key: WakeKey) -> Option<i64> {
        self.wakes.deadline(key)
    }

    // ------------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------------

    /// Recomputes the displayed value of `mode` and writes it if it changed.
    ///
    /// Returns true while the mode still needs refreshing.
    pub fn refresh(&mut self, mode: Mode) -> bool {
        let now = self.clock.now_ms();
        match mode {
            Mode::Timer => {
                let mut timer: TimerState = self.store.get(keys::TIMER_STATE);
                let before = timer.remaining_seconds;
                let more = timer.refresh(now);
                if timer.is_running && timer.remaining_seconds != before {
                    self.save(keys::TIMER_STATE, &timer);
                }
                more
            }
            Mode::Stopwatch => {
                let mut stopwatch: StopwatchState = self.store.get(keys::STOPWATCH_STATE);
                let more = stopwatch.refresh(now);
                if more {
                    self.save(keys::STOPWATCH_STATE, &stopwatch);
                }
                more
            }
            Mode::Pomodoro => {
                let mut pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
                let before = pomodoro.remaining_seconds;
                let more = pomodoro.refresh(now);
                if pomodoro.is_running && pomodoro.remaining_seconds != before {
                    self.save(keys::POMODORO_STATE, &pomodoro);
                }
                more
            }
        }
    }

    /// Returns true if `mode` is counting.
    pub fn is_running(&self, mode: Mode) -> bool {
        match mode {
            Mode::Timer => self.store.get::<TimerState>(keys::TIMER_STATE).is_running,
            Mode::Stopwatch => {
                self.store
                    .get::<StopwatchState>(keys::STOPWATCH_STATE)
                    .is_running
            }
            Mode::Pomodoro => {
                self.store
                    .get::<PomodoroState>(keys::POMODORO_STATE)
                    .is_running
            }
        }
    }

    /// Returns true if a refresh task for `mode` has work to do.
    ///
    /// A countdown that has already reached zero is left for its wake.
    pub fn needs_refresh(&self, mode: Mode) -> bool {
        let now = self.clock.now_ms();
        match mode {
            Mode::Timer => {
                let timer: TimerState = self.store.get(keys::TIMER_STATE);
                timer.is_running && timer.current_remaining(now) > 0
            }
            Mode::Stopwatch => self.is_running(Mode::Stopwatch),
            Mode::Pomodoro => {
                let pomodoro: PomodoroState = self.store.get(keys::POMODORO_STATE);
                pomodoro.is_running && pomodoro.current_remaining(now) > 0
            }
        }
    }

    // ------------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------------

    /// Chooses the mode shown by the compact display.
    pub fn set_pinned_mode(&mut self, mode: Mode) {
        self.save(keys::PINNED_TIMER_TYPE, &mode);
        tracing::info!("表示モードを {} に設定しました", mode);
    }

    /// Every record as currently stored.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_document(self.store.document())
    }

    /// Subscribes to timer and session events.
    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: DaemonEvent) {
        // No subscribers is the normal case.
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn save<T: Serialize>(&mut self, key: &str, record: &T) {
        if let Err(e) = self.store.set(key, record) {
            tracing::error!("'{}' の保存に失敗しました: {}", key, e);
        }
    }

    fn save_with_wakes<T: Serialize>(&mut self, key: &str, record: &T) {
        if let Err(e) = self.try_save_with_wakes(key, record) {
            tracing::error!("'{}' の保存に失敗しました: {}", key, e);
        }
    }

    fn try_save_with_wakes<T: Serialize>(&mut self, key: &str, record: &T) -> Result<(), StoreError> {
        let record = serde_json::to_value(record)?;
        let wakes = serde_json::to_value(self.wakes.deadlines())?;
        self.store
            .set_many(vec![(key, record), (keys::SCHEDULED_WAKES, wakes)])
    }

    fn save_wakes(&mut self) {
        let deadlines = self.wakes.deadlines();
        self.save(keys::SCHEDULED_WAKES, &deadlines);
    }
}

// ============================================================================
// Tests
// ============================================================================
