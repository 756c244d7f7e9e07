//! Server configuration (CLI flags and environment).

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "parley-server", about = "Multi-room chat server")]
pub struct ServerConfig {
    /// Listen port; shorthand for `--listen-addr 0.0.0.0:<port>`.
    pub port: Option<u16>,

    /// Address for the plain TCP listener.
    #[arg(long, default_value = "0.0.0.0:7000")]
    pub listen_addr: String,

    /// Address for the TLS listener (used when --tls-cert/--tls-key are set).
    #[arg(long, default_value = "0.0.0.0:7697")]
    pub tls_listen_addr: String,

    /// PEM certificate chain for TLS.
    #[arg(long)]
    pub tls_cert: Option<String>,

    /// PEM private key for TLS.
    #[arg(long)]
    pub tls_key: Option<String>,

    /// Path of the username:password registry file.
    #[arg(long, default_value = "users.txt")]
    pub users_file: String,

    /// Seconds a reconnect token stays valid without use.
    #[arg(long, default_value_t = 900)]
    pub session_ttl_secs: u64,

    /// Seconds between expired-session sweeps.
    #[arg(long, default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Command invoking the text-generation engine, whitespace-separated.
    /// The engine reads a transcript on stdin and writes its reply to stdout.
    #[arg(long, env = "PARLEY_AI_CMD", default_value = "ollama run llama2")]
    pub ai_cmd: String,
}

impl ServerConfig {
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert.is_some() && self.tls_key.is_some()
    }

    /// Effective plain-listener address: the positional port, when
    /// given, wins over `--listen-addr`.
    pub fn effective_listen_addr(&self) -> String {
        match self.port {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen_addr.clone(),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Engine command split into program + arguments.
    pub fn ai_command(&self) -> Vec<String> {
        self.ai_cmd.split_whitespace().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_port_overrides_listen_addr() {
        let cfg = ServerConfig::parse_from(["parley-server", "7042"]);
        assert_eq!(cfg.effective_listen_addr(), "0.0.0.0:7042");

        let cfg = ServerConfig::parse_from(["parley-server"]);
        assert_eq!(cfg.effective_listen_addr(), "0.0.0.0:7000");
    }

    #[test]
    fn ai_command_splits_on_whitespace() {
        let cfg =
            ServerConfig::parse_from(["parley-server", "--ai-cmd", "ollama  run llama2"]);
        assert_eq!(cfg.ai_command(), ["ollama", "run", "llama2"]);
    }

    #[test]
    fn tls_requires_both_cert_and_key() {
        let cfg = ServerConfig::parse_from(["parley-server", "--tls-cert", "c.pem"]);
        assert!(!cfg.tls_enabled());
        let cfg = ServerConfig::parse_from([
            "parley-server",
            "--tls-cert",
            "c.pem",
            "--tls-key",
            "k.pem",
        ]);
        assert!(cfg.tls_enabled());
    }
}
