//! # lxb-core
//!
//! Turns an lxfile into an LXD image.
//!
//! A [`BuildSpec`] describes the base image, files, templates and commands of
//! one image. [`Build`] runs it as a pipeline of steps against anything that
//! implements [`Remote`], normally an [`lxb_lxd::LxdClient`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use lxb_core::{Build, BuildSpec, BuilderConfig};
//! use lxb_lxd::LxdClient;
//!
//! let spec = BuildSpec::load("lxfile.yml".as_ref())?;
//! let client = LxdClient::connect(LxdClient::default_socket_path()).await?;
//!
//! let mut build = Build::new(&spec, &client, BuilderConfig::from_env());
//! let outcome = build.execute(false).await?;
//! println!("{}", outcome.image);
//! ```

mod build;
mod commands;
mod config;
mod devices;
mod error;
mod instance;
mod provision;
mod readiness;
mod remote;
mod spec;
mod templates;

#[cfg(test)]
mod testing;

pub use build::{Build, BuildOutcome, BuildStep};
pub use commands::{run_commands, TERMINAL_COLS, TERMINAL_ROWS};
pub use config::BuilderConfig;
pub use devices::{resolve_devices, NicType, DEFAULT_NETWORKS};
pub use error::{BuildError, Result};
pub use instance::{generate_name, BuildInstance, InstanceStatus, MAX_NAME_LEN};
pub use provision::{
    select_provisioner, FileProvisioner, ManualProvisioner, NativeProvisioner, ProvisionFailure,
    ProvisionReport,
};
pub use readiness::{has_usable_ipv4, wait_for_network, Readiness, ReadinessPolicy};
pub use remote::{ImagePublish, InstanceCreate, NetworkLister, Remote};
pub use spec::{split_mapping, BuildSpec, DeviceMap};
pub use templates::{inject_templates, InstanceLayout, Metadata, TemplateEntry};
