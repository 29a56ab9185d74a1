//! Per-socket state and I/O tasks.
//!
//! Each accepted socket gets one read task (owning the frame accumulator and
//! the connection context) and one writer task draining a bounded outbound
//! frame queue. Responses are produced in receipt order because the read task
//! awaits each dispatch before decoding the next frame; pipelined frames wait
//! in the accumulator.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::protocol::{decode_payload, encode_frame, FrameDecoder, RemoteFault, Request, Response};

use super::dispatcher::Dispatcher;

pub type ConnectionId = u64;

/// Bounded read per readiness pass.
const READ_CHUNK: usize = 8 * 1024;

/// Outbound frames buffered before the read side stops accepting new work.
const OUTBOUND_QUEUE: usize = 64;

/// Mutable server-side state for one accepted socket. Owned exclusively by
/// that socket's read task; the dispatcher mutates it only through the
/// `&mut` it is handed per request.
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub authenticated: bool,
    pub login: Option<String>,
    /// Command/argument preserved while a follow-up vehicle submission is
    /// outstanding.
    pub pending_command: Option<String>,
    pub pending_argument: Option<String>,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl ConnectionContext {
    pub(crate) fn new(id: ConnectionId, peer: SocketAddr, outbound: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            id,
            peer,
            authenticated: false,
            login: None,
            pending_command: None,
            pending_argument: None,
            outbound,
        }
    }

    /// Queue an encoded frame for the writer task. Returns `false` when the
    /// writer is gone (socket dead) and the connection should be torn down.
    pub async fn enqueue(&self, frame: Vec<u8>) -> bool {
        self.outbound.send(frame).await.is_ok()
    }
}

/// Drive one connection to completion. Fatal framing errors and transport
/// errors end the loop; malformed payloads only produce an error response.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    dispatcher: Arc<Dispatcher>,
) {
    let (mut read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let writer = tokio::spawn(write_outbound(write_half, outbound_rx, peer));

    let mut ctx = ConnectionContext::new(id, peer, outbound_tx);
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; READ_CHUNK];

    tracing::info!(%peer, id, "client connected");

    'conn: loop {
        let n = match read_half.read(&mut chunk).await {
            Ok(0) => {
                tracing::info!(%peer, id, "client disconnected");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%peer, id, error = %e, "read error, closing connection");
                break;
            }
        };
        decoder.extend(&chunk[..n]);

        loop {
            match decoder.try_decode() {
                Ok(Some(payload)) => {
                    let response = match decode_payload::<Request>(&payload) {
                        Ok(request) => {
                            tracing::debug!(%peer, id, command = %request.command, "request received");
                            dispatcher.dispatch(request, &mut ctx).await
                        }
                        Err(e) => {
                            tracing::warn!(%peer, id, error = %e, "undecodable payload");
                            Response::fault(RemoteFault::BadRequest(format!(
                                "malformed request: {}",
                                e
                            )))
                        }
                    };
                    let frame = match encode_frame(&response) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::error!(%peer, id, error = %e, "response not encodable");
                            break 'conn;
                        }
                    };
                    if !ctx.enqueue(frame).await {
                        break 'conn;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // Garbage or oversized length prefix. No response: the
                    // stream can no longer be trusted to be frame-aligned.
                    tracing::warn!(%peer, id, error = %e, "framing violation, closing connection");
                    break 'conn;
                }
            }
        }
    }

    dispatcher.release(&ctx);
    drop(ctx);
    let _ = writer.await;
}

/// Flush queued frames in order. A write failure drops the remaining queue;
/// the dispatch side notices when its next `enqueue` fails.
async fn write_outbound(
    mut half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Vec<u8>>,
    peer: SocketAddr,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = half.write_all(&frame).await {
            tracing::debug!(%peer, error = %e, "write failed, dropping queued responses");
            return;
        }
    }
    let _ = half.shutdown().await;
}
