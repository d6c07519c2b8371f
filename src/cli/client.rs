//! IPC Client for communicating with the timekeeper daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Event subscription

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::Config;
use crate::daemon::pomodoro::PomodoroSettings;
use crate::types::{DaemonEvent, IpcRequest, IpcResponse, Mode};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: u64 = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a client for the daemon of `config`.
    pub fn new(config: &Config) -> Self {
        Self::with_socket_path(config.socket_path())
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn start_timer(&self, seconds: u64) -> Result<IpcResponse> {
        if seconds == 0 {
            anyhow::bail!("タイマーの時間は1秒以上を指定してください");
        }
        self.send(&IpcRequest::StartTimer { duration: seconds })
            .await
    }

    pub async fn pause_timer(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::PauseTimer).await
    }

    pub async fn reset_timer(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::ResetTimer).await
    }

    pub async fn start_stopwatch(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::StartStopwatch).await
    }

    pub async fn pause_stopwatch(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::PauseStopwatch).await
    }

    pub async fn reset_stopwatch(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::ResetStopwatch).await
    }

    pub async fn start_pomodoro(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::StartPomodoro).await
    }

    pub async fn pause_pomodoro(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::PausePomodoro).await
    }

    pub async fn reset_pomodoro(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::ResetPomodoro).await
    }

    /// Sends new Pomodoro durations after validating them locally.
    pub async fn update_pomodoro_settings(
        &self,
        settings: PomodoroSettings,
    ) -> Result<IpcResponse> {
        settings.validate()?;
        self.send(&IpcRequest::UpdatePomodoroSettings { settings })
            .await
    }

    pub async fn set_pinned_mode(&self, mode: Mode) -> Result<IpcResponse> {
        self.send(&IpcRequest::SetPinnedMode { mode }).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Status).await
    }

    /// Opens an event stream.
    pub async fn subscribe(&self) -> Result<EventStream> {
        let stream = self.send_request_bytes(&IpcRequest::Subscribe).await?;
        let mut lines = BufReader::new(stream).lines();

        let ack = lines
            .next_line()
            .await
            .context("レスポンスの受信に失敗しました")?
            .context("Daemonからの応答がありませんでした")?;
        let ack: IpcResponse =
            serde_json::from_str(&ack).context("レスポンスのパースに失敗しました")?;
        if !ack.is_success() {
            anyhow::bail!("{}", ack.message);
        }

        Ok(EventStream { lines })
    }

    /// Sends a request and fails on an error response.
    ///
    /// Transport failures are retried; error responses are not.
    pub async fn send(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let response = self.send_request_with_retry(request).await?;
        if !response.is_success() {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }

    /// Sends a request to the daemon with retry logic.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut attempt = 1;
        loop {
            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("リクエスト失敗 (試行 {}/{}): {}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let stream = self.send_request_bytes(request).await?;

        let mut buffer = Vec::new();
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.take(MAX_RESPONSE_SIZE).read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        let response: IpcResponse =
            serde_json::from_slice(&buffer).context("レスポンスのパースに失敗しました")?;

        Ok(response)
    }

    /// Connects, writes `request` and shuts down the write half.
    async fn send_request_bytes(&self, request: &IpcRequest) -> Result<UnixStream> {
        let mut stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'timekeeper daemon' を起動してください")?;

        let request_json =
            serde_json::to_string(request).context("リクエストのシリアライズに失敗しました")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(request_json.as_bytes()),
        )
        .await
        .context("書き込みがタイムアウトしました")?
        .context("リクエストの送信に失敗しました")?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("シャットダウンに失敗しました")?;

        Ok(stream)
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Events pushed by the daemon on a `subscribe` connection.
pub struct EventStream {
    lines: Lines<BufReader<UnixStream>>,
}

impl EventStream {
    /// Waits for the next event. Returns `None` when the daemon goes away.
    pub async fn next_event(&mut self) -> Result<Option<DaemonEvent>> {
        let Some(line) = self
            .lines
            .next_line()
            .await
            .context("イベントの受信に失敗しました")?
        else {
            return Ok(None);
        };

        let event = serde_json::from_str(&line).context("イベントのパースに失敗しました")?;
        Ok(Some(event))
    }
}

// ============================================================================
// Tests
// ============================================================================
