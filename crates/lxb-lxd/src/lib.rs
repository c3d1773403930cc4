//! # lxb-lxd
//!
//! Async client for the LXD REST API, spoken over the daemon's Unix socket.
//!
//! Only the subset of the API needed to build an image from a container is
//! covered: server info, networks, container lifecycle, file push, exec and
//! image publishing.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lxb_lxd::{Action, LxdClient};
//!
//! # async fn example() -> lxb_lxd::Result<()> {
//! let client = LxdClient::connect(LxdClient::default_socket_path()).await?;
//! assert!(client.is_trusted());
//!
//! client.update_state("web-build", Action::Start, 30, false, false).await?;
//! let state = client.instance_state("web-build").await?;
//! println!("{} interfaces", state.interfaces().count());
//! # Ok(())
//! # }
//! ```
//!
//! Every call that starts a background operation on the daemon waits for that
//! operation to finish before returning.

mod client;
mod error;
mod exec;
mod files;
mod images;
mod instances;
mod types;

pub use client::LxdClient;
pub use error::{LxdError, Result};
pub use files::{FileKind, PushOptions, DIRECTORY_MANIPULATION};
pub use instances::image_source;
pub use types::{
    Action, ExecPost, ImageAliasPost, ImageSource, ImagesPost, InstanceSource, InstanceState,
    InstanceStatePut, InstancesPost, Network, NetworkAddress, NetworkInterface, Operation,
    ServerInfo,
};
