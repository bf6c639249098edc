use super::{disconnect, ClientHandler};
use crate::error::{Result, SubmissionError};
use crate::session::TransferSession;
use async_trait::async_trait;
use russh::client::Handle;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags};
use std::future::Future;
use tokio::io::AsyncWriteExt;

async fn open_sftp(host: &str, handle: &Handle<ClientHandler>) -> Result<SftpSession> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| SubmissionError::connection(host, e))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| SubmissionError::connection(host, e))?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| SubmissionError::connection(host, e))
}

/// Runs `release` only when `result` is an error.
async fn release_on_error<T, F>(result: Result<T>, release: F) -> Result<T>
where
    F: Future<Output = ()>,
{
    if result.is_err() {
        release.await;
    }
    result
}

/// File transfer over the SFTP subsystem of a dedicated connection.
pub struct SftpTransferSession {
    host: String,
    handle: Option<Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
}

impl SftpTransferSession {
    pub(crate) async fn open(host: &str, handle: Handle<ClientHandler>) -> Result<Self> {
        let sftp = release_on_error(open_sftp(host, &handle).await, disconnect(&handle)).await?;
        tracing::debug!("Opened SFTP session to {}", host);
        Ok(Self {
            host: host.to_string(),
            handle: Some(handle),
            sftp: Some(sftp),
        })
    }

    fn sftp(&self, path: &str) -> Result<&SftpSession> {
        self.sftp
            .as_ref()
            .ok_or_else(|| SubmissionError::transfer(path, "transfer session already closed"))
    }
}

#[async_trait]
impl TransferSession for SftpTransferSession {
    async fn exists(&mut self, path: &str) -> Result<bool> {
        self.sftp(path)?
            .try_exists(path)
            .await
            .map_err(|e| SubmissionError::transfer(path, e))
    }

    async fn is_dir(&mut self, path: &str) -> Result<bool> {
        let meta = self
            .sftp(path)?
            .metadata(path)
            .await
            .map_err(|e| SubmissionError::transfer(path, e))?;
        Ok(meta.is_dir())
    }

    async fn create_dir(&mut self, path: &str) -> Result<()> {
        tracing::debug!("Creating remote directory {}", path);
        self.sftp(path)?
            .create_dir(path)
            .await
            .map_err(|e| SubmissionError::transfer(path, e))
    }

    async fn upload(&mut self, path: &str, contents: &[u8], mode: u32) -> Result<()> {
        tracing::debug!("Uploading {} bytes to {}:{}", contents.len(), self.host, path);
        let flags = OpenFlags::WRITE
            .union(OpenFlags::CREATE)
            .union(OpenFlags::TRUNCATE);
        let attrs = FileAttributes {
            permissions: Some(mode),
            ..Default::default()
        };
        let mut file = self
            .sftp(path)?
            .open_with_flags_and_attributes(path, flags, attrs)
            .await
            .map_err(|e| SubmissionError::transfer(path, e))?;
        file.write_all(contents)
            .await
            .map_err(|e| SubmissionError::transfer(path, e))?;
        file.flush()
            .await
            .map_err(|e| SubmissionError::transfer(path, e))?;
        file.shutdown()
            .await
            .map_err(|e| SubmissionError::transfer(path, e))?;
        Ok(())
    }

    async fn set_mode(&mut self, path: &str, mode: u32) -> Result<()> {
        let attrs = FileAttributes {
            permissions: Some(mode),
            ..Default::default()
        };
        self.sftp(path)?
            .set_metadata(path, attrs)
            .await
            .map_err(|e| SubmissionError::transfer(path, e))
    }

    async fn close(&mut self) {
        if let Some(sftp) = self.sftp.take() {
            if let Err(e) = sftp.close().await {
                tracing::debug!("SFTP close failed: {}", e);
            }
        }
        if let Some(handle) = self.handle.take() {
            disconnect(&handle).await;
            tracing::debug!("Closed transfer session to {}", self.host);
        }
    }
}
