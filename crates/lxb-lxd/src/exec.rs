//! Interactive command execution over the LXD exec websockets.

use crate::client::{LxdClient, QUERY_VALUE};
use crate::error::{LxdError, Result};
use crate::types::{Envelope, ExecPost, Operation};
use futures::StreamExt;
use hyper::Method;
use percent_encoding::utf8_percent_encode;
use std::collections::BTreeMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

impl LxdClient {
    /// Run `command` inside the container on a pseudo-terminal of
    /// `width`x`height`, copying its output to `output`.
    ///
    /// Returns the command's exit code once the exec operation completes.
    ///
    /// # Errors
    /// Returns an error if the exec operation cannot be started, a websocket
    /// fails, or the operation itself fails.
    pub async fn exec_interactive<W>(
        &self,
        name: &str,
        command: &[String],
        environment: &BTreeMap<String, String>,
        (width, height): (u16, u16),
        output: &mut W,
    ) -> Result<i32>
    where
        W: AsyncWrite + Unpin + Send,
    {
        tracing::debug!(name = %name, command = ?command, "Starting exec");
        let post = ExecPost {
            command: command.to_vec(),
            environment: environment.clone(),
            wait_for_websocket: true,
            interactive: true,
            width,
            height,
        };

        let envelope = self
            .send_json(Method::POST, &format!("/1.0/containers/{name}/exec"), &post)
            .await?;
        let operation_path = envelope.operation_path()?.to_string();
        let (data_secret, control_secret) = exec_secrets(envelope)?;

        // The daemon only starts the process once every fd is connected.
        let mut control = self.open_websocket(&operation_path, &control_secret).await?;
        let mut data = self.open_websocket(&operation_path, &data_secret).await?;
        tracing::trace!(operation = %operation_path, "Exec websockets connected");

        while let Some(message) = data.next().await {
            match message {
                Ok(Message::Binary(bytes)) => {
                    output.write_all(&bytes).await?;
                    output.flush().await?;
                }
                Ok(Message::Text(text)) => {
                    output.write_all(text.as_bytes()).await?;
                    output.flush().await?;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
                Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if let Err(e) = control.close(None).await {
            tracing::trace!(error = %e, "Control websocket already closed");
        }

        let op = self.wait_operation(&operation_path).await?;
        let code = exit_code(&op)?;
        tracing::debug!(name = %name, exit_code = code, "Exec finished");
        Ok(code)
    }

    async fn open_websocket(
        &self,
        operation_path: &str,
        secret: &str,
    ) -> Result<WebSocketStream<UnixStream>> {
        let stream = UnixStream::connect(self.socket_path()).await?;
        let url = format!(
            "ws://localhost{operation_path}/websocket?secret={}",
            utf8_percent_encode(secret, QUERY_VALUE)
        );
        let (socket, _response) = tokio_tungstenite::client_async(url, stream).await?;
        Ok(socket)
    }
}

/// Extract the data (`"0"`) and `control` websocket secrets.
fn exec_secrets(envelope: Envelope) -> Result<(String, String)> {
    let op: Operation = envelope.into_metadata()?;
    let fds = op
        .metadata
        .as_ref()
        .and_then(|m| m.get("fds"))
        .ok_or_else(|| LxdError::Protocol("exec operation has no fds".into()))?;

    let secret = |key: &str| {
        fds.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| LxdError::Protocol(format!("exec operation has no '{key}' fd")))
    };
    Ok((secret("0")?, secret("control")?))
}

fn exit_code(op: &Operation) -> Result<i32> {
    op.metadata
        .as_ref()
        .and_then(|m| m.get("return"))
        .and_then(|v| v.as_i64())
        .map(|code| code as i32)
        .ok_or_else(|| LxdError::Protocol("exec operation reported no return code".into()))
}
