//! IPC Server for the timekeeper daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer, stopwatch and Pomodoro commands
//! - Event streaming for `subscribe` connections
//!
//! Framing: the client writes one JSON request and shuts down its write
//! half. The daemon answers with one JSON line. A `subscribe` connection
//! then stays open and receives one JSON line per event.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout, Duration};

use crate::types::{IpcRequest, IpcResponse};

use super::service::TimerService;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Write error
    #[error("Failed to write response: {0}")]
    WriteError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,

    /// Client closed the connection without sending anything
    #[error("Connection closed by client")]
    EmptyRequest,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client shuts down its write half, with a timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(256);
        let limit = (MAX_REQUEST_SIZE + 1) as u64;

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            (&mut *stream).take(limit).read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        }

        if buffer.is_empty() {
            return Err(IpcError::EmptyRequest.into());
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest =
            serde_json::from_slice(&buffer).with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes `message` and writes it as one line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_line<T: serde::Serialize>(stream: &mut UnixStream, message: &T) -> Result<()> {
        let mut json = serde_json::to_vec(message).context("Failed to serialize IPC message")?;
        json.push(b'\n');

        stream
            .write_all(&json)
            .await
            .map_err(|e| IpcError::WriteError(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| IpcError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        Self::send_line(stream, response).await
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the timer service.
#[derive(Clone)]
pub struct RequestHandler {
    service: TimerService,
}

impl RequestHandler {
    pub fn new(service: TimerService) -> Self {
        Self { service }
    }

    /// Serves one connection: a single request/response, or an event
    /// stream for `subscribe`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be read or the reply cannot
    /// be written.
    pub async fn serve(&self, mut stream: UnixStream) -> Result<()> {
        let request = match IpcServer::receive_request(&mut stream).await {
            Ok(request) => request,
            Err(e) => {
                let response = IpcResponse::error(format!("不正なリクエストです: {}", e));
                let _ = IpcServer::send_response(&mut stream, &response).await;
                return Err(e);
            }
        };

        tracing::debug!("request: {:?}", request);

        if request == IpcRequest::Subscribe {
            return self.stream_events(stream).await;
        }

        let response = self.handle(request).await;
        IpcServer::send_response(&mut stream, &response).await
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        let service = &self.service;
        let message = match request {
            IpcRequest::StartTimer { duration } => {
                match service.execute(|e| e.start_timer(duration)).await {
                    Ok(()) => "タイマーを開始しました",
                    Err(e) => return IpcResponse::error(e.to_string()),
                }
            }
            IpcRequest::PauseTimer => {
                if service.execute(|e| e.pause_timer()).await {
                    "タイマーを一時停止しました"
                } else {
                    "タイマーは実行されていません"
                }
            }
            IpcRequest::ResetTimer => {
                service.execute(|e| e.reset_timer()).await;
                "タイマーをリセットしました"
            }
            IpcRequest::StartStopwatch => {
                if service.execute(|e| e.start_stopwatch()).await {
                    "ストップウォッチを開始しました"
                } else {
                    "ストップウォッチは既に実行中です"
                }
            }
            IpcRequest::PauseStopwatch => {
                if service.execute(|e| e.pause_stopwatch()).await {
                    "ストップウォッチを一時停止しました"
                } else {
                    "ストップウォッチは実行されていません"
                }
            }
            IpcRequest::ResetStopwatch => {
                service.execute(|e| e.reset_stopwatch()).await;
                "ストップウォッチをリセットしました"
            }
            IpcRequest::StartPomodoro => {
                if service.execute(|e| e.start_pomodoro()).await {
                    "ポモドーロを開始しました"
                } else {
                    "ポモドーロは既に実行中です"
                }
            }
            IpcRequest::PausePomodoro => {
                if service.execute(|e| e.pause_pomodoro()).await {
                    "ポモドーロを一時停止しました"
                } else {
                    "ポモドーロは実行されていません"
                }
            }
            IpcRequest::ResetPomodoro => {
                service.execute(|e| e.reset_pomodoro()).await;
                "ポモドーロをリセットしました"
            }
            IpcRequest::UpdatePomodoroSettings { settings } => {
                match service
                    .execute(|e| e.update_pomodoro_settings(settings))
                    .await
                {
                    Ok(()) => "ポモドーロ設定を更新しました",
                    Err(e) => return IpcResponse::error(e.to_string()),
                }
            }
            IpcRequest::SetPinnedMode { mode } => {
                service.execute(|e| e.set_pinned_mode(mode)).await;
                "表示モードを設定しました"
            }
            IpcRequest::Status => "",
            IpcRequest::Subscribe => {
                return IpcResponse::error("subscribeはストリーム接続でのみ利用できます");
            }
        };

        IpcResponse::success(message, Some(service.snapshot().await))
    }

    /// Acknowledges a `subscribe` request and forwards events until the
    /// client goes away.
    async fn stream_events(&self, mut stream: UnixStream) -> Result<()> {
        let mut events = self.service.subscribe().await;
        let ack = IpcResponse::success("購読を開始しました", Some(self.service.snapshot().await));
        IpcServer::send_response(&mut stream, &ack).await?;

        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = IpcServer::send_line(&mut stream, &event).await {
                        tracing::debug!("subscriber disconnected: {}", e);
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("購読者が遅れているため{}件のイベントを破棄しました", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
