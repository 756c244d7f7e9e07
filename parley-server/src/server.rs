//! Shared server state and the TCP/TLS listeners.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

use crate::ai::AiBridge;
use crate::config::ServerConfig;
use crate::connection;
use crate::credentials::CredentialStore;
use crate::room::RoomRegistry;
use crate::session::SessionTable;

/// State shared by every connection handler. Each store guards its own
/// interior; a room broadcast never touches the session table's lock
/// and vice versa.
pub struct SharedState {
    pub credentials: CredentialStore,
    pub sessions: Arc<SessionTable>,
    pub rooms: RoomRegistry,
    pub ai: AiBridge,
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Build the shared state: open the credential registry, wire up
    /// the session table and AI bridge from config.
    pub fn build_state(&self) -> Result<Arc<SharedState>> {
        let credentials = CredentialStore::open(&self.config.users_file).with_context(|| {
            format!("failed to open users file {}", self.config.users_file)
        })?;
        Ok(Arc::new(SharedState {
            credentials,
            sessions: Arc::new(SessionTable::new(self.config.session_ttl())),
            rooms: RoomRegistry::new(),
            ai: AiBridge::new(self.config.ai_command()),
        }))
    }

    /// Run the server, blocking forever. Only a bind failure at startup
    /// is terminal; errors inside a connection stay in its handler task.
    pub async fn run(self) -> Result<()> {
        let tls_acceptor = self.build_tls_acceptor()?;
        let state = self.build_state()?;
        state.sessions.start_sweeper(self.config.sweep_interval());

        let listen_addr = self.config.effective_listen_addr();
        let listener = TcpListener::bind(&listen_addr)
            .await
            .with_context(|| format!("failed to bind {listen_addr}"))?;
        tracing::info!("plain listener on {listen_addr}");

        if let Some(acceptor) = tls_acceptor {
            let tls_addr = self.config.tls_listen_addr.clone();
            let tls_listener = TcpListener::bind(&tls_addr)
                .await
                .with_context(|| format!("failed to bind {tls_addr}"))?;
            tracing::info!("TLS listener on {tls_addr}");

            let tls_state = Arc::clone(&state);
            tokio::spawn(async move {
                loop {
                    match tls_listener.accept().await {
                        Ok((stream, peer)) => {
                            let state = Arc::clone(&tls_state);
                            let acceptor = acceptor.clone();
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        tracing::info!(%peer, "new connection (tls)");
                                        if let Err(e) = connection::handle_stream(
                                            tls_stream,
                                            state,
                                            peer.to_string(),
                                        )
                                        .await
                                        {
                                            tracing::error!(%peer, "TLS connection error: {e:#}");
                                        }
                                    }
                                    Err(e) => tracing::warn!(%peer, "TLS handshake failed: {e}"),
                                }
                            });
                        }
                        Err(e) => tracing::error!("TLS accept error: {e}"),
                    }
                }
            });
        }

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = connection::handle(stream, state).await {
                            tracing::error!("connection error: {e:#}");
                        }
                    });
                }
                Err(e) => tracing::error!("accept error: {e}"),
            }
        }
    }

    fn build_tls_acceptor(&self) -> Result<Option<TlsAcceptor>> {
        if !self.config.tls_enabled() {
            return Ok(None);
        }

        let cert_path = self.config.tls_cert.as_deref().unwrap();
        let key_path = self.config.tls_key.as_deref().unwrap();

        let cert_pem = std::fs::read(cert_path)
            .with_context(|| format!("failed to read TLS cert: {cert_path}"))?;
        let key_pem = std::fs::read(key_path)
            .with_context(|| format!("failed to read TLS key: {key_path}"))?;

        let certs: Vec<_> = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<Result<Vec<_>, _>>()
            .context("failed to parse TLS certificates")?;
        let key = rustls_pemfile::private_key(&mut &key_pem[..])
            .context("failed to parse TLS private key")?
            .context("no private key found in PEM file")?;

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("invalid TLS configuration")?;

        Ok(Some(TlsAcceptor::from(Arc::new(config))))
    }
}
