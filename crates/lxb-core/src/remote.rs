//! The daemon operations the build pipeline depends on.
//!
//! [`Remote`] is implemented for [`LxdClient`]; tests substitute a recording
//! fake.

use crate::spec::DeviceMap;
use async_trait::async_trait;
use lxb_lxd::{
    image_source, Action, InstanceState, InstancesPost, LxdClient, Network, PushOptions, Result,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Everything needed to create the build container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCreate {
    /// Container name, unique on the daemon.
    pub name: String,
    /// Remote the base image is resolved against (`local` for the daemon's own store).
    pub remote: String,
    /// Alias or fingerprint, optionally prefixed with `remote:`.
    pub base_image: String,
    /// Profiles applied in order.
    pub profiles: Vec<String>,
    /// Instance config keys such as `security.nesting`.
    pub config: BTreeMap<String, String>,
    /// Devices by name, including the generated network device.
    pub devices: DeviceMap,
}

/// Options for turning the stopped container into an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePublish {
    /// Whether untrusted clients may download the image.
    pub public: bool,
    /// Aliases pointed at the new image once it exists.
    pub aliases: Vec<String>,
    /// Image properties such as `os` and `release`.
    pub properties: BTreeMap<String, String>,
    /// Compression algorithm; `None` uses the daemon's default.
    pub compression: Option<String>,
}

/// Looks up networks by name.
#[async_trait]
pub trait NetworkLister: Send + Sync {
    /// `Ok(None)` when the network does not exist.
    async fn get_network(&self, name: &str) -> Result<Option<Network>>;
}

/// Container lifecycle, file, exec and image operations.
///
/// Every mutating call waits for the daemon's operation to finish.
#[async_trait]
pub trait Remote: NetworkLister {
    async fn create_instance(&self, request: &InstanceCreate) -> Result<()>;

    async fn perform_action(
        &self,
        name: &str,
        action: Action,
        timeout_secs: i64,
        force: bool,
        stateful: bool,
    ) -> Result<()>;

    async fn instance_state(&self, name: &str) -> Result<InstanceState>;

    /// Write one file. `None` ownership leaves the daemon's default.
    async fn push_file(
        &self,
        name: &str,
        destination: &str,
        uid: Option<u32>,
        gid: Option<u32>,
        mode: u32,
        content: Vec<u8>,
    ) -> Result<()>;

    async fn push_directory_recursive(
        &self,
        name: &str,
        source: &Path,
        destination: &str,
    ) -> Result<()>;

    /// Returns the image fingerprint.
    async fn publish_image(&self, name: &str, request: &ImagePublish) -> Result<String>;

    async fn delete_instance(&self, name: &str) -> Result<()>;

    /// Run `argv` on a `cols`x`rows` terminal, returning its exit code.
    async fn exec(
        &self,
        name: &str,
        argv: &[String],
        env: &BTreeMap<String, String>,
        cols: u16,
        rows: u16,
    ) -> Result<i32>;

    /// Whether the daemon advertises the named API extension.
    fn has_capability(&self, capability: &str) -> bool;
}

#[async_trait]
impl NetworkLister for LxdClient {
    async fn get_network(&self, name: &str) -> Result<Option<Network>> {
        self.network(name).await
    }
}

#[async_trait]
impl Remote for LxdClient {
    async fn create_instance(&self, request: &InstanceCreate) -> Result<()> {
        let post = InstancesPost {
            name: request.name.clone(),
            profiles: request.profiles.clone(),
            config: request.config.clone(),
            devices: request.devices.clone(),
            ephemeral: false,
            source: image_source(&request.remote, &request.base_image),
        };
        LxdClient::create_instance(self, &post).await
    }

    async fn perform_action(
        &self,
        name: &str,
        action: Action,
        timeout_secs: i64,
        force: bool,
        stateful: bool,
    ) -> Result<()> {
        self.update_state(name, action, timeout_secs, force, stateful)
            .await
    }

    async fn instance_state(&self, name: &str) -> Result<InstanceState> {
        LxdClient::instance_state(self, name).await
    }

    async fn push_file(
        &self,
        name: &str,
        destination: &str,
        uid: Option<u32>,
        gid: Option<u32>,
        mode: u32,
        content: Vec<u8>,
    ) -> Result<()> {
        let options = PushOptions {
            uid,
            gid,
            ..PushOptions::file(mode)
        };
        LxdClient::push_file(self, name, destination, options, content).await
    }

    async fn push_directory_recursive(
        &self,
        name: &str,
        source: &Path,
        destination: &str,
    ) -> Result<()> {
        LxdClient::push_directory_recursive(self, name, source, destination).await
    }

    async fn publish_image(&self, name: &str, request: &ImagePublish) -> Result<String> {
        LxdClient::publish_image(
            self,
            name,
            request.public,
            &request.aliases,
            &request.properties,
            request.compression.as_deref(),
        )
        .await
    }

    async fn delete_instance(&self, name: &str) -> Result<()> {
        LxdClient::delete_instance(self, name).await
    }

    async fn exec(
        &self,
        name: &str,
        argv: &[String],
        env: &BTreeMap<String, String>,
        cols: u16,
        rows: u16,
    ) -> Result<i32> {
        let mut stdout = tokio::io::stdout();
        self.exec_interactive(name, argv, env, (cols, rows), &mut stdout)
            .await
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.has_extension(capability)
    }
}
