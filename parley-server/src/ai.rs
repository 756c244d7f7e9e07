//! Bridge to the external text-generation engine.
//!
//! Each conversation turn spawns the engine command fresh, writes a
//! role-tagged transcript to its stdin, and reads stdout until the
//! process exits. There is no persistent engine session.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::room::BOT_PREFIX;

/// Reply broadcast in place of a real answer when the engine cannot be
/// reached. Counts as the turn's one bot reply.
pub const AI_ERROR_REPLY: &str = "[Error talking to AI]";

/// Hard cap on a single engine invocation.
const ENGINE_TIMEOUT: Duration = Duration::from_secs(120);

static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^`{3,}").unwrap());
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`{3,}$").unwrap());

pub struct AiBridge {
    command: Vec<String>,
}

impl AiBridge {
    /// `command` is the engine invocation, program first.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// One conversation turn. Never fails from the caller's point of
    /// view: any engine problem collapses into [`AI_ERROR_REPLY`] so
    /// the room stays usable.
    pub async fn reply(
        &self,
        user_message: &str,
        history: &[String],
        prompt: Option<&str>,
    ) -> String {
        match self.invoke(user_message, history, prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("engine call failed: {e:#}");
                AI_ERROR_REPLY.to_string()
            }
        }
    }

    async fn invoke(
        &self,
        user_message: &str,
        history: &[String],
        prompt: Option<&str>,
    ) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .context("engine command is empty")?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn engine `{program}`"))?;

        let transcript = build_transcript(user_message, history, prompt);
        let mut stdin = child.stdin.take().context("engine stdin unavailable")?;
        stdin
            .write_all(transcript.as_bytes())
            .await
            .context("failed to write transcript to engine")?;
        // Close stdin: the engine reads to EOF before answering.
        drop(stdin);

        let output = tokio::time::timeout(ENGINE_TIMEOUT, child.wait_with_output())
            .await
            .context("engine timed out")?
            .context("failed to read engine output")?;

        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(strip_fences(&raw))
    }
}

/// Replay `history` as role-tagged turns, then the new user message.
/// The prompt, when present, leads the transcript as a `System:` line.
/// History lines are `name: text` (or `Bot: text`); the name is dropped
/// so the engine sees roles, not usernames.
fn build_transcript(user_message: &str, history: &[String], prompt: Option<&str>) -> String {
    let mut transcript = String::new();
    if let Some(prompt) = prompt.filter(|p| !p.is_empty()) {
        transcript.push_str("System: ");
        transcript.push_str(prompt);
        transcript.push('\n');
    }
    for line in history {
        let text = line
            .split_once(':')
            .map(|(_, rest)| rest.trim())
            .unwrap_or(line);
        let role = if line.starts_with(BOT_PREFIX) { "Bot" } else { "User" };
        transcript.push_str(role);
        transcript.push_str(": ");
        transcript.push_str(text);
        transcript.push('\n');
    }
    transcript.push_str("User: ");
    transcript.push_str(user_message);
    transcript.push('\n');
    transcript
}

/// Trim the reply and strip leading/trailing fenced-code markers.
fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let opened = FENCE_OPEN.replace(trimmed, "");
    let closed = FENCE_CLOSE.replace(&opened, "");
    closed.trim().to_string()
}
