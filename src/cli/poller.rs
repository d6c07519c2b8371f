//! Display poller.
//!
//! Re-reads the daemon's state file on a fixed period and redraws a single
//! line. The poller never writes; it renders against the current wall clock
//! so the value stays exact between the daemon's own refreshes.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::{Config, POLL_PERIOD};
use crate::daemon::store::{StateStore, StoreError};
use crate::daemon::timekeeping::{Clock, SystemClock};
use crate::types::{Mode, Snapshot};

use super::display::Display;

/// Periodic reader of the state file.
pub struct DisplayPoller {
    state_path: PathBuf,
    mode: Option<Mode>,
    period: Duration,
    clock: Arc<dyn Clock>,
}

impl DisplayPoller {
    /// Creates a poller for `mode`, or for the pinned mode when `None`.
    pub fn new(config: &Config, mode: Option<Mode>) -> Self {
        Self {
            state_path: config.state_path(),
            mode,
            period: POLL_PERIOD,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for rendering.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reads the committed state. A missing or corrupt file reads as
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_snapshot(&self) -> Result<Snapshot> {
        match StateStore::read_document(&self.state_path) {
            Ok(Some(document)) => Ok(Snapshot::from_document(&document)),
            Ok(None) => Ok(Snapshot::default()),
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!("状態ファイルを読み込めません: {}", reason);
                Ok(Snapshot::default())
            }
            Err(e) => Err(e).context("状態ファイルの読み込みに失敗しました"),
        }
    }

    /// Renders the current line.
    pub fn render(&self, snapshot: &Snapshot) -> String {
        let mode = self.mode.unwrap_or(snapshot.pinned_timer_type);
        Display::compact_line(snapshot, mode, self.clock.now_ms())
    }

    /// Reads and renders once.
    pub fn poll(&self) -> Result<String> {
        let snapshot = self.read_snapshot()?;
        Ok(self.render(&snapshot))
    }

    /// Prints one line to `out`.
    pub fn print_once(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "{}", self.poll()?)?;
        Ok(())
    }

    /// Redraws the line in place until Ctrl-C.
    pub async fn run(&self, out: &mut impl Write) -> Result<()> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = String::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let line = self.poll()?;
                    if line != last {
                        write!(out, "\r\x1b[2K{}", line)?;
                        out.flush()?;
                        last = line;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    writeln!(out)?;
                    return Ok(());
                }
            }
        }
    }
}
