//! LxdClient - request plumbing over the LXD Unix socket.

use crate::error::{LxdError, Result};
use crate::types::{Envelope, Operation, ServerInfo};
use hyper::{Body, Client, Method, Request};
use hyperlocal::{UnixClientExt, UnixConnector, Uri};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Socket used by the snap-packaged daemon.
const SNAP_SOCKET: &str = "/var/snap/lxd/common/lxd/unix.socket";

/// Socket used by distribution packages.
const DEFAULT_SOCKET: &str = "/var/lib/lxd/unix.socket";

/// Client for a local LXD daemon.
///
/// Server information (API extensions, trust) is fetched once when connecting
/// and cached for the lifetime of the client.
pub struct LxdClient {
    socket_path: PathBuf,
    http: Client<UnixConnector>,
    server: ServerInfo,
}

impl LxdClient {
    /// Connect to the daemon listening on `socket_path` and fetch `/1.0`.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be reached or `/1.0` fails.
    pub async fn connect(socket_path: impl Into<PathBuf>) -> Result<Self> {
        let socket_path = socket_path.into();
        tracing::debug!(socket = %socket_path.display(), "Connecting to LXD");

        let mut client = Self {
            socket_path,
            http: Client::unix(),
            server: ServerInfo::default(),
        };
        client.server = client.get("/1.0").await?;

        tracing::info!(
            socket = %client.socket_path.display(),
            api_version = %client.server.api_version,
            extensions = client.server.api_extensions.len(),
            "Connected to LXD"
        );
        Ok(client)
    }

    /// Pick the daemon socket: the snap location if present, else the
    /// distribution default.
    pub fn default_socket_path() -> PathBuf {
        let snap = Path::new(SNAP_SOCKET);
        if snap.exists() {
            snap.to_path_buf()
        } else {
            PathBuf::from(DEFAULT_SOCKET)
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    /// Whether this client's certificate (or socket peer) is trusted.
    pub fn is_trusted(&self) -> bool {
        self.server.auth == "trusted"
    }

    /// Whether the daemon advertises the given API extension.
    pub fn has_extension(&self, name: &str) -> bool {
        self.server.api_extensions.iter().any(|ext| ext == name)
    }

    /// Send a request and decode the response envelope.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Body,
    ) -> Result<Envelope> {
        tracing::trace!(method = %method, path = %path, "LXD request");
        let uri: hyper::Uri = Uri::new(&self.socket_path, path).into();

        let mut builder = Request::builder().method(method.clone()).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = builder
            .body(body)
            .map_err(|e| LxdError::Protocol(format!("failed to build request: {e}")))?;

        let response = self.http.request(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;

        let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|e| {
            LxdError::Protocol(format!(
                "{method} {path} returned {status} with an unreadable body: {e}"
            ))
        })?;
        envelope.into_result()
    }

    pub(crate) async fn send_json(
        &self,
        method: Method,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<Envelope> {
        let body = serde_json::to_vec(payload)?;
        self.send(
            method,
            path,
            &[("Content-Type", "application/json".to_string())],
            Body::from(body),
        )
        .await
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, &[], Body::empty())
            .await?
            .into_metadata()
    }

    /// Issue a request that starts a background operation and wait for it.
    pub(crate) async fn call_async(
        &self,
        method: Method,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<Operation> {
        let envelope = self.send_json(method, path, payload).await?;
        self.wait_operation(envelope.operation_path()?).await
    }

    /// Block until the operation at `operation_path` completes.
    ///
    /// # Errors
    /// Returns `LxdError::Operation` if the operation did not succeed.
    pub async fn wait_operation(&self, operation_path: &str) -> Result<Operation> {
        let start = std::time::Instant::now();
        tracing::debug!(operation = %operation_path, "Waiting for operation");

        let op: Operation = self.get(&format!("{operation_path}/wait")).await?;
        if !op.succeeded() {
            let message = if op.err.is_empty() {
                op.status.clone()
            } else {
                op.err.clone()
            };
            tracing::debug!(operation = %operation_path, status = %op.status, "Operation failed");
            return Err(LxdError::Operation { id: op.id, message });
        }

        tracing::debug!(
            operation = %operation_path,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Operation succeeded"
        );
        Ok(op)
    }
}

/// Characters escaped in query values. `/` stays readable in file paths.
pub(crate) const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::utf8_percent_encode;

    #[test]
    fn test_query_value_keeps_paths_readable() {
        let encode = |value: &str| utf8_percent_encode(value, QUERY_VALUE).to_string();
        assert_eq!(encode("/etc/motd"), "/etc/motd");
        assert_eq!(encode("/tmp/a file&b"), "/tmp/a%20file%26b");
        assert_eq!(encode("s3cr3t+=/x~y"), "s3cr3t%2B%3D/x~y");
    }

    #[test]
    fn test_default_socket_path_is_absolute() {
        assert!(LxdClient::default_socket_path().is_absolute());
    }
}
