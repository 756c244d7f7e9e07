//! Interactive line client for the parley chat server.
//!
//! Prints server lines as they arrive and forwards stdin lines. The
//! reconnect token from a successful login is cached on disk and
//! replayed as the first line of the next connection while still fresh,
//! so a restarted client lands back in its room without logging in.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Tokens older than this are discarded client-side; the server's
/// session TTL would reject them anyway.
const TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Marker on the server line that discloses a fresh token.
const TOKEN_LINE: &str = "Authentication successful. Your token:";

#[derive(Parser, Debug)]
#[command(name = "parley-client", about = "Line client for the parley chat server")]
struct Args {
    /// Server host or IP.
    address: String,
    /// Server port.
    port: u16,
}

fn token_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
        .join("token")
}

fn load_cached_token() -> Option<String> {
    let path = token_path();
    let meta = std::fs::metadata(&path).ok()?;
    let age = meta.modified().ok()?.elapsed().ok()?;
    if age > TOKEN_TTL {
        let _ = std::fs::remove_file(&path);
        return None;
    }
    let token = std::fs::read_to_string(&path).ok()?;
    let token = token.trim().to_string();
    (!token.is_empty()).then_some(token)
}

fn save_token(token: &str) {
    let path = token_path();
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    if let Err(e) = std::fs::write(&path, token) {
        eprintln!("Warning: can't cache token: {e}");
    }
}

fn delete_token() {
    let _ = std::fs::remove_file(token_path());
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let stream = TcpStream::connect((args.address.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.address, args.port))?;
    let (reader, mut writer) = stream.into_split();
    let mut server_lines = BufReader::new(reader).lines();
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(token) = load_cached_token() {
        println!("Reconnecting automatically...");
        writer.write_all(token.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    loop {
        tokio::select! {
            line = server_lines.next_line() => match line {
                Ok(Some(line)) => {
                    println!("{line}");
                    // Refresh the cache whenever the server issues a token.
                    if let Some(idx) = line.find(TOKEN_LINE) {
                        let token = line[idx + TOKEN_LINE.len()..].trim();
                        if !token.is_empty() {
                            save_token(token);
                        }
                    }
                }
                _ => {
                    println!("Server closed the connection.");
                    break;
                }
            },
            line = stdin_lines.next_line() => match line? {
                Some(msg) => {
                    if msg.trim().eq_ignore_ascii_case("exit") {
                        delete_token();
                        writer.write_all(b"exit\n").await?;
                        println!("{GREEN}{BOLD}Bye!{RESET}");
                        break;
                    }
                    writer.write_all(msg.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                }
                // stdin closed: disconnect cleanly.
                None => break,
            },
        }
    }
    Ok(())
}
