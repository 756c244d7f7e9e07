//! AI bridge against stub engines.
//!
//! The engine contract is "transcript on stdin, reply on stdout", so a
//! shell one-liner stands in for the real model runner.

#![cfg(unix)]

use parley_server::ai::{AiBridge, AI_ERROR_REPLY};

fn sh(script: &str) -> AiBridge {
    AiBridge::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn reply_returns_engine_stdout_trimmed() {
    let bridge = sh("cat >/dev/null; echo '  canned reply  '");
    assert_eq!(bridge.reply("hi", &[], None).await, "canned reply");
}

#[tokio::test]
async fn reply_strips_code_fences() {
    let bridge = sh(r"cat >/dev/null; printf '```\nfenced answer\n```\n'");
    assert_eq!(bridge.reply("hi", &[], None).await, "fenced answer");
}

#[tokio::test]
async fn engine_receives_the_role_tagged_transcript() {
    // `cat` echoes the transcript back, exposing exactly what the
    // engine was given.
    let bridge = sh("cat");
    let history = vec!["alice: hi".to_string(), "Bot: hello".to_string()];
    let echoed = bridge.reply("ping", &history, Some("be brief")).await;
    assert_eq!(echoed, "System: be brief\nUser: hi\nBot: hello\nUser: ping");
}

#[tokio::test]
async fn missing_engine_yields_the_sentinel_reply() {
    let bridge = AiBridge::new(vec!["/nonexistent/parley-engine".to_string()]);
    assert_eq!(bridge.reply("hi", &[], None).await, AI_ERROR_REPLY);
}

#[tokio::test]
async fn empty_command_yields_the_sentinel_reply() {
    let bridge = AiBridge::new(Vec::new());
    assert_eq!(bridge.reply("hi", &[], None).await, AI_ERROR_REPLY);
}

#[tokio::test]
async fn engine_failure_after_output_still_returns_stdout() {
    // A nonzero exit after producing output is not a failure of the
    // turn; the text that did arrive is the reply.
    let bridge = sh("cat >/dev/null; echo partial; exit 3");
    assert_eq!(bridge.reply("hi", &[], None).await, "partial");
}
