//! Container lifecycle and network lookups.

use crate::client::LxdClient;
use crate::error::{LxdError, Result};
use crate::types::{Action, InstanceSource, InstanceState, InstanceStatePut, InstancesPost, Network};
use hyper::{Body, Method};

/// Image servers LXD ships as default remotes.
const SIMPLESTREAMS_REMOTES: &[(&str, &str)] = &[
    ("images", "https://images.linuxcontainers.org"),
    ("ubuntu", "https://cloud-images.ubuntu.com/releases"),
    ("ubuntu-daily", "https://cloud-images.ubuntu.com/daily"),
];

/// Resolve an image reference into an instance source.
///
/// `base` may carry its own remote prefix (`images:alpine/3.18`), which wins
/// over `remote`. The `local` remote, or any name LXD doesn't ship by
/// default, resolves to an image on the connected daemon: by fingerprint when
/// `base` is a hex fingerprint prefix, by alias otherwise.
pub fn image_source(remote: &str, base: &str) -> InstanceSource {
    let (remote, alias) = match base.split_once(':') {
        Some((prefix, alias)) if !prefix.is_empty() => (prefix, alias),
        _ => (remote, base),
    };

    match SIMPLESTREAMS_REMOTES.iter().find(|(name, _)| *name == remote) {
        Some((_, server)) => InstanceSource {
            kind: "image".into(),
            alias: alias.to_string(),
            fingerprint: None,
            server: Some((*server).to_string()),
            protocol: Some("simplestreams".into()),
            mode: Some("pull".into()),
        },
        None if looks_like_fingerprint(alias) => InstanceSource {
            kind: "image".into(),
            alias: String::new(),
            fingerprint: Some(alias.to_ascii_lowercase()),
            server: None,
            protocol: None,
            mode: None,
        },
        None => InstanceSource {
            kind: "image".into(),
            alias: alias.to_string(),
            fingerprint: None,
            server: None,
            protocol: None,
            mode: None,
        },
    }
}

/// 12 to 64 hex digits, the fingerprint prefix lengths `lxc` resolves.
fn looks_like_fingerprint(base: &str) -> bool {
    (12..=64).contains(&base.len()) && base.bytes().all(|b| b.is_ascii_hexdigit())
}

impl LxdClient {
    /// Look up a network by name. Returns `None` if it does not exist.
    pub async fn network(&self, name: &str) -> Result<Option<Network>> {
        match self.get::<Network>(&format!("/1.0/networks/{name}")).await {
            Ok(mut network) => {
                if network.name.is_empty() {
                    network.name = name.to_string();
                }
                Ok(Some(network))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create a container and wait for the creation operation.
    pub async fn create_instance(&self, post: &InstancesPost) -> Result<()> {
        tracing::info!(
            name = %post.name,
            image = %post.source.reference(),
            devices = post.devices.len(),
            "Creating container"
        );
        self.call_async(Method::POST, "/1.0/containers", post).await?;
        Ok(())
    }

    /// Change the running state of a container and wait for it.
    pub async fn update_state(
        &self,
        name: &str,
        action: Action,
        timeout_secs: i64,
        force: bool,
        stateful: bool,
    ) -> Result<()> {
        tracing::debug!(name = %name, action = %action, timeout_secs, force, "Updating container state");
        let put = InstanceStatePut {
            action: action.as_str(),
            timeout: timeout_secs,
            force,
            stateful,
        };
        self.call_async(Method::PUT, &format!("/1.0/containers/{name}/state"), &put)
            .await?;
        Ok(())
    }

    /// Fetch the runtime state (status and network interfaces).
    pub async fn instance_state(&self, name: &str) -> Result<InstanceState> {
        self.get(&format!("/1.0/containers/{name}/state")).await
    }

    /// Delete a container and wait for it.
    pub async fn delete_instance(&self, name: &str) -> Result<()> {
        tracing::debug!(name = %name, "Deleting container");
        let envelope = self
            .send(
                Method::DELETE,
                &format!("/1.0/containers/{name}"),
                &[],
                Body::empty(),
            )
            .await?;
        let operation = envelope.operation_path().map_err(|_| {
            LxdError::Protocol(format!("delete of {name} did not start an operation"))
        })?;
        self.wait_operation(operation).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_alias() {
        let source = image_source("local", "alpine-base");
        assert_eq!(source.alias, "alpine-base");
        assert!(source.server.is_none());
        assert!(source.protocol.is_none());
    }

    #[test]
    fn test_prefixed_remote_is_pulled() {
        let source = image_source("local", "images:alpine/3.18");
        assert_eq!(source.alias, "alpine/3.18");
        assert_eq!(
            source.server.as_deref(),
            Some("https://images.linuxcontainers.org")
        );
        assert_eq!(source.protocol.as_deref(), Some("simplestreams"));
        assert_eq!(source.mode.as_deref(), Some("pull"));
    }

    #[test]
    fn test_remote_argument_used_without_prefix() {
        let source = image_source("ubuntu", "22.04");
        assert_eq!(source.alias, "22.04");
        assert_eq!(
            source.server.as_deref(),
            Some("https://cloud-images.ubuntu.com/releases")
        );
    }

    #[test]
    fn test_local_fingerprint_is_sent_without_alias() {
        let source = image_source("local", "A1B2C3D4E5F6a7b8");
        assert_eq!(source.fingerprint.as_deref(), Some("a1b2c3d4e5f6a7b8"));
        assert_eq!(source.reference(), "a1b2c3d4e5f6a7b8");
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            serde_json::json!({"type": "image", "fingerprint": "a1b2c3d4e5f6a7b8"})
        );
    }

    #[test]
    fn test_short_hex_and_remote_fingerprints_stay_aliases() {
        assert_eq!(image_source("local", "cafe").alias, "cafe");
        assert!(image_source("local", "cafe").fingerprint.is_none());

        let pulled = image_source("images", "a1b2c3d4e5f6a7b8");
        assert_eq!(pulled.alias, "a1b2c3d4e5f6a7b8");
        assert!(pulled.fingerprint.is_none());
    }

    #[test]
    fn test_unknown_remote_falls_back_to_local_alias() {
        let source = image_source("mybox", "custom/base");
        assert_eq!(source.alias, "custom/base");
        assert!(source.server.is_none());
    }
}
