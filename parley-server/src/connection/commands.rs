//! Steady-state command dispatch and chat relay.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, Lines};

use crate::room::BOT_PREFIX;
use crate::server::SharedState;
use crate::text;

use super::{join_room, leave_room, Client};

/// Read lines until the peer goes away or sends `exit`. Returning after
/// EOF or a read error leaves `client.room` set; the caller runs the
/// departure cleanup.
pub(super) async fn run<R>(
    lines: &mut Lines<R>,
    client: &mut Client,
    state: &Arc<SharedState>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        if message.eq_ignore_ascii_case("/rooms") {
            for line in text::room_listing(&state.rooms.list()) {
                client.send(line);
            }
        } else if message.eq_ignore_ascii_case("/help") {
            for line in text::help_menu() {
                client.send(line);
            }
        } else if let Some(arg) = join_arg(message) {
            if arg.is_empty() {
                client.send("Usage: /join <roomName>");
            } else {
                leave_room(client, state);
                join_room(client, state, arg);
            }
        } else if message.eq_ignore_ascii_case("/leave") {
            if leave_room(client, state) {
                client.send("You have left the room. Use /join <room> to join (or create) another.");
            } else {
                client.send("You are not in any room.");
            }
        } else if message.eq_ignore_ascii_case("exit") {
            leave_room(client, state);
            return Ok(());
        } else {
            relay_chat(client, state, message).await;
        }
    }
    Ok(())
}

/// `/join <name>` argument, case-insensitive on the command word.
/// A bare `/join` yields an empty argument.
fn join_arg(message: &str) -> Option<&str> {
    let lower = message.to_ascii_lowercase();
    if lower == "/join" {
        Some("")
    } else if lower.starts_with("/join ") {
        Some(message["/join ".len()..].trim())
    } else {
        None
    }
}

/// Broadcast a chat line; in an AI room, follow it with exactly one
/// engine reply. The engine call stalls only this client's read loop.
async fn relay_chat(client: &Client, state: &Arc<SharedState>, message: &str) {
    let Some(room) = client.room.as_ref() else {
        client.send("You are not in a room. Use /join <room> first.");
        return;
    };

    let user_line = format!("{}: {}", client.username, message);

    // Snapshot history before broadcasting so the bridge appends the
    // new message itself and the engine sees it exactly once.
    let history = room.is_ai().then(|| room.history());
    room.broadcast(&user_line);

    // Replies are broadcast with BOT_PREFIX and never pass through this
    // dispatch, so a reply cannot trigger another engine call.
    if let Some(history) = history {
        if user_line.starts_with(BOT_PREFIX) {
            return;
        }
        let reply = state.ai.reply(message, &history, room.ai_prompt()).await;
        room.broadcast(&format!("{BOT_PREFIX} {reply}"));
    }
}

#[cfg(test)]
mod tests {
    use super::join_arg;

    #[test]
    fn join_arg_parses_command_forms() {
        assert_eq!(join_arg("/join general"), Some("general"));
        assert_eq!(join_arg("/JOIN  AI tutor "), Some("AI tutor"));
        assert_eq!(join_arg("/join"), Some(""));
        assert_eq!(join_arg("/joinx"), None);
        assert_eq!(join_arg("hello /join"), None);
    }
}
