//! Handshake dialogs: reconnect, menu choice, registration, login, and
//! room selection.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, Lines};

use crate::credentials::CredentialError;
use crate::room::Outbound;
use crate::server::SharedState;
use crate::session::Session;
use crate::text::{self, RESET, YELLOW};

use super::{join_room, send, Client};

/// Drive the handshake to a live [`Client`], or `None` when the dialog
/// ends without one (peer gone mid-dialog, or authentication failed).
pub(super) async fn establish<R>(
    lines: &mut Lines<R>,
    outbound: &Outbound,
    state: &Arc<SharedState>,
    conn_id: &str,
    first_line: &str,
) -> Result<Option<Client>>
where
    R: AsyncBufRead + Unpin,
{
    // A first line matching a live token short-circuits authentication.
    // An expired token was evicted by the lookup and falls through to
    // the fresh-login path like any unknown first line.
    if let Some(session) = state.sessions.lookup(first_line) {
        state.sessions.touch(first_line);
        return Ok(Some(resume(outbound, state, conn_id, session)));
    }

    authenticate(lines, outbound, state, conn_id, first_line).await
}

/// Reconnect: pick the session back up and re-join its last room.
fn resume(
    outbound: &Outbound,
    state: &Arc<SharedState>,
    conn_id: &str,
    session: Session,
) -> Client {
    let mut client = Client {
        username: session.username,
        token: session.token,
        room: None,
        outbound: outbound.clone(),
    };
    match session.room.as_deref() {
        Some(name) => {
            send(outbound, format!("Reconnected in room: {name}"));
            let room = state.rooms.get_or_create(name);
            room.add_member(&client.username, outbound.clone());
            room.broadcast(&format!(">> {} reconnected to {}", client.username, name));
            client.room = Some(room);
        }
        None => send(outbound, "Reconnected."),
    }
    tracing::info!(%conn_id, username = %client.username, "session reconnected");
    client
}

async fn authenticate<R>(
    lines: &mut Lines<R>,
    outbound: &Outbound,
    state: &Arc<SharedState>,
    conn_id: &str,
    first_line: &str,
) -> Result<Option<Client>>
where
    R: AsyncBufRead + Unpin,
{
    let mut choice = first_line.to_string();
    if choice != "1" && choice != "2" {
        send(outbound, format!("{YELLOW}Please select an option:{RESET}"));
        send(outbound, "1-Login  2-Register:");
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        choice = line.trim().to_string();
    }

    if choice == "2" {
        if !register(lines, outbound, state).await? {
            return Ok(None);
        }
        send(outbound, "Login");
    }

    send(outbound, "Username:");
    let Some(username) = lines.next_line().await? else {
        return Ok(None);
    };
    send(outbound, "Password:");
    let Some(password) = lines.next_line().await? else {
        return Ok(None);
    };
    let username = username.trim().to_string();

    if !state.credentials.authenticate(&username, password.trim()) {
        // Terminal: the caller closes the connection.
        send(outbound, "Authentication failed.");
        tracing::info!(%conn_id, %username, "authentication failed");
        return Ok(None);
    }

    let token = state.sessions.create(&username);
    send(outbound, format!("Authentication successful. Your token: {token}"));
    tracing::info!(%conn_id, %username, "authenticated");

    let mut client = Client {
        username,
        token,
        room: None,
        outbound: outbound.clone(),
    };
    if !select_room(lines, state, &mut client).await? {
        return Ok(None);
    }
    Ok(Some(client))
}

/// Registration sub-dialog. Loops until a free username is persisted;
/// returns false when the peer goes away mid-dialog.
async fn register<R>(
    lines: &mut Lines<R>,
    outbound: &Outbound,
    state: &Arc<SharedState>,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        send(outbound, "Choose username:");
        let Some(username) = lines.next_line().await? else {
            return Ok(false);
        };
        let username = username.trim().to_string();
        if username.is_empty() || username.contains(':') {
            send(outbound, "Invalid username. Please choose another.");
            continue;
        }
        if state.credentials.contains(&username) {
            send(outbound, "Username already exists. Please choose another.");
            continue;
        }
        send(outbound, "Choose password:");
        let Some(password) = lines.next_line().await? else {
            return Ok(false);
        };
        match state.credentials.register(&username, password.trim()) {
            Ok(()) => {
                send(outbound, "Registration successful.");
                return Ok(true);
            }
            // Lost a race with a concurrent registration for the name.
            Err(CredentialError::UsernameTaken) => {
                send(outbound, "Username already exists. Please choose another.");
            }
            Err(CredentialError::Io(e)) => return Err(e.into()),
        }
    }
}

/// Prompt for a room name until a non-blank one arrives, then join it.
async fn select_room<R>(
    lines: &mut Lines<R>,
    state: &Arc<SharedState>,
    client: &mut Client,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    for line in text::room_listing(&state.rooms.list()) {
        client.send(line);
    }
    client.send(format!("{YELLOW}Enter room name to join or create:{RESET}"));
    loop {
        let Some(name) = lines.next_line().await? else {
            return Ok(false);
        };
        let name = name.trim();
        if name.is_empty() {
            client.send("Room name cannot be empty.");
            continue;
        }
        join_room(client, state, name);
        return Ok(true);
    }
}
