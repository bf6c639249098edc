//! russh-backed implementations of the session ports.

mod auth;
mod exec;
mod sftp;

pub use exec::SshCommandSession;
pub use sftp::SftpTransferSession;

use crate::error::{Result, SubmissionError};
use crate::session::{CommandSession, Credentials, SessionConnector, TransferSession};
use crate::trust::HostKeyPolicy;
use async_trait::async_trait;
use kmcx_core::config::ClusterTarget;
use russh::client;
use russh::keys::ssh_key::{HashAlg, PublicKey};
use std::sync::Arc;
use std::time::Duration;

const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    trust: Arc<HostKeyPolicy>,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        Ok(self.trust.check(&self.host, self.port, &fingerprint))
    }
}

/// Opens a TCP connection, verifies the host key and authenticates.
pub(crate) async fn open_handle(
    target: &ClusterTarget,
    credentials: &Credentials,
    trust: Arc<HostKeyPolicy>,
) -> Result<client::Handle<ClientHandler>> {
    let config = Arc::new(client::Config {
        inactivity_timeout: Some(INACTIVITY_TIMEOUT),
        ..Default::default()
    });
    let handler = ClientHandler {
        host: target.host.clone(),
        port: target.port,
        trust: trust.clone(),
    };

    tracing::debug!(
        "Connecting to {}@{}:{}",
        target.username,
        target.host,
        target.port
    );
    let mut handle =
        match client::connect(config, (target.host.as_str(), target.port), handler).await {
            Ok(handle) => handle,
            Err(err) => {
                if let Some(fingerprint) = trust.rejected_fingerprint() {
                    return Err(SubmissionError::HostRejected {
                        host: target.host.clone(),
                        fingerprint,
                    });
                }
                return Err(SubmissionError::connection(&target.host, err));
            }
        };

    auth::authenticate(&mut handle, target, credentials).await?;
    tracing::info!("Authenticated as {} on {}", target.username, target.host);
    Ok(handle)
}

pub(crate) async fn disconnect(handle: &client::Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(russh::Disconnect::ByApplication, "", "en")
        .await
    {
        tracing::debug!("Disconnect failed: {}", e);
    }
}

/// Connects real SSH sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect_command(
        &self,
        target: &ClusterTarget,
        credentials: &Credentials,
        trust: Arc<HostKeyPolicy>,
    ) -> Result<Box<dyn CommandSession>> {
        let handle = open_handle(target, credentials, trust).await?;
        Ok(Box::new(SshCommandSession::new(target.host.clone(), handle)))
    }

    async fn connect_transfer(
        &self,
        target: &ClusterTarget,
        credentials: &Credentials,
        trust: Arc<HostKeyPolicy>,
    ) -> Result<Box<dyn TransferSession>> {
        let handle = open_handle(target, credentials, trust).await?;
        let session = SftpTransferSession::open(&target.host, handle).await?;
        Ok(Box::new(session))
    }
}
