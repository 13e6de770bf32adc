//! STDIO transport: line-delimited JSON over any async byte stream.
//!
//! Bridges an `AsyncRead`/`AsyncWrite` pair onto the same endpoint types the
//! in-process channel uses, so both processes run unchanged over pipes.
//! A closed or unreadable stream ends the bridge, which the other side
//! observes as its inbound channel closing.

use std::path::Path;
use std::process::Stdio;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::api::types::ApiError;
use crate::protocols::channel::{UiEndpoint, WorkerEndpoint};
use crate::protocols::messages::{Request, WorkerMessage};

/// Bridge the UI side onto the worker's stdout (reader) and stdin (writer).
pub fn bridge_ui<R, W>(reader: R, writer: W) -> UiEndpoint
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::unbounded_channel::<Request>();
    let (message_tx, message_rx) = mpsc::unbounded_channel::<WorkerMessage>();

    tokio::spawn(write_lines(writer, request_rx, "ui"));
    tokio::spawn(read_lines(reader, message_tx, "ui"));

    UiEndpoint {
        outbound: request_tx,
        inbound: message_rx,
    }
}

/// Bridge the worker side onto its own stdin (reader) and stdout (writer).
pub fn bridge_worker<R, W>(reader: R, writer: W) -> WorkerEndpoint
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::unbounded_channel::<Request>();
    let (message_tx, message_rx) = mpsc::unbounded_channel::<WorkerMessage>();

    tokio::spawn(read_lines(reader, request_tx, "worker"));
    tokio::spawn(write_lines(writer, message_rx, "worker"));

    WorkerEndpoint {
        inbound: request_rx,
        outbound: message_tx,
    }
}

/// Spawn the privileged worker process and connect to it over STDIO.
///
/// The child's stderr is relayed into the log. The child is killed when the
/// returned `Child` is dropped.
///
/// # Errors
///
/// `IoError` if the process cannot be spawned, `ProtocolError` if a pipe is
/// missing or the process exits immediately.
pub async fn spawn_worker(program: &Path, args: &[String]) -> Result<(Child, UiEndpoint), ApiError> {
    log::info!("Spawning worker process: bin={}", program.display());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ApiError::IoError {
            message: format!("Failed to spawn worker process: {e}"),
        })?;

    log::debug!("Worker process spawned: pid={:?}", child.id());

    if let Ok(Some(status)) = child.try_wait() {
        log::error!("Worker process exited immediately: exit_status={status:?}");
        return Err(ApiError::ProtocolError {
            message: format!(
                "Worker process exited immediately with status: {:?}",
                status.code()
            ),
        });
    }

    let stdin = child.stdin.take().ok_or_else(|| ApiError::ProtocolError {
        message: "Failed to get stdin handle".to_string(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| ApiError::ProtocolError {
        message: "Failed to get stdout handle".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| ApiError::ProtocolError {
        message: "Failed to get stderr handle".to_string(),
    })?;

    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log::debug!("[worker stderr] {line}");
        }
        log::debug!("Worker stderr closed");
    });

    Ok((child, bridge_ui(stdout, stdin)))
}

async fn write_lines<W, T>(writer: W, mut rx: mpsc::UnboundedReceiver<T>, side: &'static str)
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut writer = writer;
    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                log::error!("[{side}] Failed to serialize outbound message: {e}");
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            log::warn!("[{side}] Outbound stream write failed: {e}");
            break;
        }
        if let Err(e) = writer.flush().await {
            log::warn!("[{side}] Outbound stream flush failed: {e}");
            break;
        }
    }
    log::debug!("[{side}] Outbound stream closed");
}

async fn read_lines<R, T>(reader: R, tx: mpsc::UnboundedSender<T>, side: &'static str)
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<T>(&line) {
                    Ok(message) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("[{side}] Dropping malformed inbound line: {e}"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("[{side}] Inbound stream read failed: {e}");
                break;
            }
        }
    }
    log::debug!("[{side}] Inbound stream closed");
}
