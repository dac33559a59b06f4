//! Per-connection tasks
//!
//! Each accepted socket gets a receive loop (this task) and a writer task
//! draining the connection's outbox. The receive loop handles one frame at
//! a time, in arrival order.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::hub::{Hub, Session};
use crate::protocol::{OutboundEnvelope, OutboundMessage};
use crate::registry::Outbox;

use super::handshake::{parse_handshake, reject};

/// Upgrade, register, and serve one peer until it goes away
pub(crate) async fn serve_connection(
    hub: Arc<Hub>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    outbound_queue_size: usize,
) -> Result<()> {
    let mut handshake = None;
    let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        if hub.at_capacity() {
            warn!(remote_addr = %remote_addr, "Hub at capacity, refusing upgrade");
            return Err(reject(StatusCode::SERVICE_UNAVAILABLE, "hub is at capacity"));
        }
        match parse_handshake(request.uri()) {
            Ok(parsed) => {
                handshake = Some(parsed);
                Ok(response)
            }
            Err(e) => {
                warn!(remote_addr = %remote_addr, error = %e, "Rejected handshake");
                Err(reject(StatusCode::BAD_REQUEST, e.to_string()))
            }
        }
    };

    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let handshake = handshake.ok_or_else(|| Error::handshake("no handshake metadata"))?;

    let (outbox, outbound_rx) = Outbox::channel(outbound_queue_size);
    let session = match hub.connect(handshake, outbox, Some(remote_addr)) {
        Ok(session) => session,
        Err(e) => {
            let frame = CloseFrame {
                code: CloseCode::Again,
                reason: e.to_string().into(),
            };
            let _ = ws.close(Some(frame)).await;
            return Err(e);
        }
    };

    let (write, mut read) = ws.split();
    let writer = tokio::spawn(write_loop(session.clone(), write, outbound_rx));

    let mut lost = None;
    while let Some(frame) = read.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => report(&session, hub.handle_text(&session, &text)),
            Ok(WsMessage::Binary(data)) => report(&session, hub.handle_bytes(&session, &data)),
            Ok(WsMessage::Close(frame)) => {
                debug!(conn_id = %session.id, frame = ?frame, "Received close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id = %session.id, error = %e, "WebSocket read failed");
                lost = Some(Error::connection_lost(e));
                break;
            }
        }
    }

    hub.disconnect(&session);
    writer.abort();
    match lost {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Drain the outbox onto the socket
async fn write_loop<S>(session: Session, mut write: S, mut outbound_rx: mpsc::Receiver<OutboundMessage>)
where
    S: SinkExt<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(msg) = outbound_rx.recv().await {
        let msg_type = msg.type_name();
        let json = match OutboundEnvelope::new(msg).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(conn_id = %session.id, msg_type, error = %e, "Failed to encode message");
                continue;
            }
        };

        if let Err(e) = write.send(WsMessage::Text(json)).await {
            debug!(conn_id = %session.id, msg_type, error = %e, "WebSocket write failed");
            break;
        }
    }
}

fn report(session: &Session, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_message_local() => warn!(
            conn_id = %session.id,
            role = %session.role,
            error = %e.format_for_log(),
            "Dropped inbound message"
        ),
        Err(e) => error!(
            conn_id = %session.id,
            role = %session.role,
            error = %e.format_for_log(),
            "Failed to handle inbound message"
        ),
    }
}
