//! stdio transport for MCP

use emcp_core::{ErrorObject, LogMessage, McpLogger, ProtocolError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::log_notification;
use crate::protocol::{McpMessage, RequestHandler};

/// Outbound messages waiting for the writer
const OUTBOUND_CAPACITY: usize = 64;

/// stdio transport for MCP protocol
pub struct StdioTransport {
    handler: Arc<RequestHandler>,
    logger: McpLogger,
}

impl StdioTransport {
    /// Create a new stdio transport
    pub fn new(handler: Arc<RequestHandler>, logger: McpLogger) -> Self {
        Self { handler, logger }
    }

    /// Serve on the process's stdin/stdout until EOF or shutdown
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!("Starting MCP server on stdio");
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout(), shutdown).await
    }

    /// Serve newline-delimited JSON-RPC over any reader/writer pair.
    ///
    /// Every request runs on its own task; a single writer task owns the
    /// output so responses and log notifications never interleave mid-line.
    /// On EOF or shutdown, in-flight requests finish and their log
    /// notifications are written before this returns.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        writer: W,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<McpMessage>(OUTBOUND_CAPACITY);
        let writer_task = tokio::spawn(write_messages(writer, rx));
        let (stop_forwarding, stop) = oneshot::channel();
        let forwarder = tokio::spawn(forward_logs(self.logger.subscribe(), tx.clone(), stop));
        let mut in_flight = JoinSet::new();

        let mut lines = reader.lines();
        loop {
            let line = tokio::select! {
                Ok(_) = shutdown.wait_for(|stopped| *stopped) => {
                    info!("Shutdown requested");
                    break;
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                info!("EOF received, shutting down");
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let message: McpMessage = match serde_json::from_str(line) {
                Ok(msg) => msg,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    let _ = tx
                        .send(McpMessage::error_response(None, ErrorObject::parse_error()))
                        .await;
                    continue;
                }
            };

            let handler = self.handler.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                if let Some(response) = answer(&handler, message).await {
                    let _ = tx.send(response).await;
                }
            });

            // Reap finished requests so the set only holds live ones.
            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        debug!("In-flight requests drained");

        let _ = stop_forwarding.send(());
        forwarder.await?;
        drop(tx);
        writer_task.await??;
        Ok(())
    }
}

/// Run one message through the handler; a panic becomes an internal error reply
async fn answer(handler: &RequestHandler, message: McpMessage) -> Option<McpMessage> {
    let id = message.id.clone();
    match AssertUnwindSafe(handler.handle(message, None)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            error!("Request handler panicked");
            id.map(|id| {
                McpMessage::error_response(
                    Some(id),
                    ProtocolError::internal("Request handler panicked").into(),
                )
            })
        }
    }
}

async fn write_messages<W>(mut writer: W, mut rx: mpsc::Receiver<McpMessage>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let line = serde_json::to_string(&message)?;
        debug!("Sending: {}", line);
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Forward log messages until `stop` fires, then flush what was already published
async fn forward_logs(
    mut logs: broadcast::Receiver<LogMessage>,
    tx: mpsc::Sender<McpMessage>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            received = logs.recv() => match received {
                Ok(message) => {
                    if tx.send(log_notification(&message)).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Dropped {} log notifications", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            _ = &mut stop => break,
        }
    }

    loop {
        match logs.try_recv() {
            Ok(message) => {
                if tx.send(log_notification(&message)).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!("Dropped {} log notifications", skipped);
            }
            Err(_) => return,
        }
    }
}
