//! Daemon module for timekeeper.
//!
//! This module contains the background process:
//! - `timekeeping`: Remaining/elapsed arithmetic and the wall clock
//! - `timer`, `stopwatch`, `pomodoro`: Per-mode state machines
//! - `store`: Atomic JSON state file
//! - `wake`: One-shot absolute-time alarms
//! - `refresh`: Periodic recompute tasks
//! - `engine`: Command handlers, wake handling and recovery
//! - `service`: Locking and refresh reconciliation around the engine
//! - `ipc`: Unix socket server

pub mod engine;
pub mod error;
pub mod ipc;
pub mod pomodoro;
pub mod refresh;
pub mod service;
pub mod stopwatch;
pub mod store;
pub mod timekeeping;
pub mod timer;
pub mod wake;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::notification::Notifier;

pub use engine::Engine;
pub use error::EngineError;
pub use ipc::{IpcError, IpcServer, RequestHandler};
pub use service::TimerService;
pub use store::{StateStore, StoreError};
pub use timekeeping::{Clock, ManualClock, SystemClock};
pub use wake::{WakeFired, WakeKey, WakeScheduler};

/// Runs the daemon until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if another daemon is already listening, or if the state
/// file or socket cannot be opened.
pub async fn run(config: &Config, notifier: Arc<dyn Notifier>) -> Result<()> {
    let socket_path = config.socket_path();
    if UnixStream::connect(&socket_path).await.is_ok() {
        anyhow::bail!("Daemonは既に起動しています ({:?})", socket_path);
    }

    let store = StateStore::open(&config.state_path())
        .with_context(|| format!("状態ファイルを開けません: {:?}", config.state_path()))?;

    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
    let engine = Engine::new(store, Arc::new(SystemClock), notifier, fired_tx);
    let service = TimerService::new(engine);
    service.recover().await;

    let server = IpcServer::new(&socket_path)?;
    let handler = RequestHandler::new(service.clone());
    tracing::info!("Daemonを起動しました: {:?}", server.socket_path());

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("SIGTERMハンドラの登録に失敗しました")?;

    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handler.serve(stream).await {
                            tracing::warn!("リクエスト処理に失敗しました: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::warn!("{:#}", e),
            },
            Some(fired) = fired_rx.recv() => {
                service.handle_wake(fired).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINTを受信しました。終了します");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("SIGTERMを受信しました。終了します");
                break;
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
