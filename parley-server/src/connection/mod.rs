//! Per-client connection handler.
//!
//! Each accepted socket gets one handler task that walks the client
//! through the handshake and then relays room traffic, plus one
//! delivery task that drains the connection's outbound queue. All
//! writes to a client go through that queue, so broadcast pushes and
//! direct command replies never interleave mid-line on the wire.
//!
//! The handler is split into submodules:
//! - [`auth`] — reconnect, menu, registration, login, room selection
//! - [`commands`] — steady-state command dispatch and chat relay

mod auth;
mod commands;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::room::{Outbound, Room};
use crate::server::SharedState;
use crate::text::{self, BOLD, CYAN, RESET};

/// How long teardown waits for the delivery task to drain the queue.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// State carried by one authenticated connection.
pub(crate) struct Client {
    pub username: String,
    pub token: String,
    pub room: Option<Arc<Room>>,
    pub outbound: Outbound,
}

impl Client {
    /// Queue a line for this client. A closed queue means the delivery
    /// task is gone; the read loop notices on its own.
    pub fn send(&self, line: impl Into<String>) {
        let _ = self.outbound.send(line.into());
    }
}

pub(crate) fn send(outbound: &Outbound, line: impl Into<String>) {
    let _ = outbound.send(line.into());
}

/// Handle a plain TCP connection.
pub async fn handle(stream: TcpStream, state: Arc<SharedState>) -> Result<()> {
    let peer = stream.peer_addr()?;
    tracing::info!(%peer, "new connection (plain)");
    handle_stream(stream, state, peer.to_string()).await
}

/// Handle any bidirectional byte stream: plain TCP, TLS, or an
/// in-memory transport in tests.
pub async fn handle_stream<S>(stream: S, state: Arc<SharedState>, conn_id: String) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let delivery = spawn_delivery(writer, rx, conn_id.clone());

    let result = serve(&mut lines, tx.clone(), &state, &conn_id).await;

    // Drop our senders so the delivery task sees the queue close, then
    // give it a bounded window to flush terminal messages.
    drop(tx);
    let _ = tokio::time::timeout(FLUSH_TIMEOUT, delivery).await;
    tracing::info!(%conn_id, "connection closed");
    result
}

fn spawn_delivery<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
    conn_id: String,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                tracing::warn!(%conn_id, "write error: {e}");
                break;
            }
            if let Err(e) = writer.write_all(b"\n").await {
                tracing::warn!(%conn_id, "write error: {e}");
                break;
            }
            if let Err(e) = writer.flush().await {
                tracing::warn!(%conn_id, "flush error: {e}");
                break;
            }
        }
    })
}

async fn serve<R>(
    lines: &mut Lines<R>,
    outbound: Outbound,
    state: &Arc<SharedState>,
    conn_id: &str,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    send(&outbound, text::boxed("CHAT SERVER", '=', 50));
    send(&outbound, format!("{BOLD}{CYAN}WELCOME TO THE CHAT SERVER!{RESET}"));

    let Some(first) = lines.next_line().await? else {
        return Ok(());
    };

    let Some(mut client) =
        auth::establish(lines, &outbound, state, conn_id, first.trim()).await?
    else {
        // Handshake ended without a session: EOF mid-dialog or a
        // terminal authentication failure.
        return Ok(());
    };

    let result = commands::run(lines, &mut client, state).await;

    // Cleanup obligation on every exit path, not only `exit`: remove
    // the member handle and announce the departure. The session keeps
    // its room name so a reconnect lands back in the room.
    if let Some(room) = client.room.take() {
        room.remove_member(&client.username);
        room.broadcast(&format!(">> {} has left {}", client.username, room.name));
        tracing::info!(%conn_id, username = %client.username, room = %room.name, "disconnected from room");
    }
    result
}

/// Join `name`, creating it on first use, and record it on the session.
pub(crate) fn join_room(client: &mut Client, state: &Arc<SharedState>, name: &str) {
    let room = state.rooms.get_or_create(name);
    room.add_member(&client.username, client.outbound.clone());
    room.broadcast(&format!(">> {} joined the room {}", client.username, name));
    state.sessions.set_room(&client.token, Some(name.to_string()));
    client.room = Some(room);
}

/// Leave the current room, announcing the departure. Returns false when
/// the client was not in a room.
pub(crate) fn leave_room(client: &mut Client, state: &Arc<SharedState>) -> bool {
    let Some(room) = client.room.take() else {
        return false;
    };
    room.remove_member(&client.username);
    room.broadcast(&format!(">> {} has left {}", client.username, room.name));
    state.sessions.set_room(&client.token, None);
    true
}
