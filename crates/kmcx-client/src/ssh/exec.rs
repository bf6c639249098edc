use super::{disconnect, ClientHandler};
use crate::error::{Result, SubmissionError};
use crate::session::{CommandSession, ExecOutput};
use async_trait::async_trait;
use kmcx_core::logging::log_remote_command;
use russh::client::Handle;
use russh::ChannelMsg;

fn handle_capture_message(
    msg: &ChannelMsg,
    out: &mut Vec<u8>,
    err: &mut Vec<u8>,
    code: &mut i32,
) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            out.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            err.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            *code = *exit_status as i32;
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

pub struct SshCommandSession {
    host: String,
    handle: Option<Handle<ClientHandler>>,
}

impl SshCommandSession {
    pub(crate) fn new(host: String, handle: Handle<ClientHandler>) -> Self {
        Self {
            host,
            handle: Some(handle),
        }
    }

    fn handle(&self) -> Result<&Handle<ClientHandler>> {
        self.handle
            .as_ref()
            .ok_or_else(|| SubmissionError::connection(&self.host, "session already closed"))
    }
}

#[async_trait]
impl CommandSession for SshCommandSession {
    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        log_remote_command(&self.host, command);
        let host = self.host.clone();
        let handle = self.handle()?;
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SubmissionError::connection(&host, e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| SubmissionError::connection(&host, e))?;

        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut code = -1;
        while let Some(msg) = channel.wait().await {
            if handle_capture_message(&msg, &mut out, &mut err, &mut code) {
                break;
            }
        }
        let _ = channel.close().await;

        let output = ExecOutput {
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
            exit_code: code,
        };
        tracing::debug!("Remote command exited with {}", output.exit_code);
        Ok(output)
    }

    async fn home_dir(&mut self) -> Result<String> {
        let output = self.exec("echo \"$HOME\"").await?;
        let home = output.stdout.trim();
        if !output.success() || !home.starts_with('/') {
            return Err(SubmissionError::RemoteCommand {
                command: "echo $HOME".to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(home.to_string())
    }

    async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            disconnect(&handle).await;
            tracing::debug!("Closed command session to {}", self.host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::CryptoVec;

    #[test]
    fn test_capture_splits_streams() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut code = -1;
        let msgs = [
            ChannelMsg::Data {
                data: CryptoVec::from_slice(b"hello\n"),
            },
            ChannelMsg::ExtendedData {
                data: CryptoVec::from_slice(b"warn\n"),
                ext: 1,
            },
            ChannelMsg::ExitStatus { exit_status: 3 },
        ];
        for msg in &msgs {
            assert!(!handle_capture_message(msg, &mut out, &mut err, &mut code));
        }
        assert!(handle_capture_message(
            &ChannelMsg::Close,
            &mut out,
            &mut err,
            &mut code
        ));
        assert_eq!(out, b"hello\n");
        assert_eq!(err, b"warn\n");
        assert_eq!(code, 3);
    }
}
