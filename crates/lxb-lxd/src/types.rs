//! Wire types for the LXD 1.0 API.

use crate::error::{LxdError, Result};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Standard response envelope returned by every LXD endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub error_code: u16,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Envelope {
    /// Turn an `error` envelope into `LxdError::Api`.
    pub fn into_result(self) -> Result<Self> {
        if self.kind == "error" {
            return Err(LxdError::Api {
                code: self.error_code,
                message: self.error,
            });
        }
        Ok(self)
    }

    /// Decode the `metadata` payload.
    pub fn into_metadata<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.metadata).map_err(LxdError::from)
    }

    /// Path of the background operation started by this request.
    pub fn operation_path(&self) -> Result<&str> {
        if self.kind != "async" || self.operation.is_empty() {
            return Err(LxdError::Protocol(format!(
                "expected an async response, got '{}'",
                self.kind
            )));
        }
        Ok(&self.operation)
    }
}

/// `GET /1.0`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub api_extensions: Vec<String>,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub auth: String,
}

/// `GET /1.0/networks/<name>`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub name: String,
    /// Topology, e.g. `bridge`, `physical`, `macvlan`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub managed: bool,
}

impl Network {
    pub fn is_bridge(&self) -> bool {
        self.kind == "bridge"
    }
}

/// `GET /1.0/containers/<name>/state`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub status: String,
    /// LXD sends `null` here while the container is stopped.
    #[serde(default, deserialize_with = "nullable")]
    pub network: BTreeMap<String, NetworkInterface>,
}

impl InstanceState {
    pub fn interfaces(&self) -> impl Iterator<Item = (&str, &NetworkInterface)> {
        self.network.iter().map(|(name, iface)| (name.as_str(), iface))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    #[serde(default, deserialize_with = "nullable")]
    pub addresses: Vec<NetworkAddress>,
    /// Administrative state, `up` or `down`.
    #[serde(default)]
    pub state: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddress {
    /// `inet` or `inet6`.
    pub family: String,
    pub address: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub scope: String,
}

/// Background operation as returned by `/1.0/operations/<id>[/wait]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub err: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Operation {
    pub const SUCCESS: u16 = 200;

    pub fn succeeded(&self) -> bool {
        self.status_code == Self::SUCCESS
    }

    /// Look up a string value inside the operation metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}

/// `POST /1.0/containers`
#[derive(Debug, Clone, Serialize)]
pub struct InstancesPost {
    pub name: String,
    pub profiles: Vec<String>,
    pub config: BTreeMap<String, String>,
    pub devices: BTreeMap<String, BTreeMap<String, String>>,
    pub ephemeral: bool,
    pub source: InstanceSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alias: String,
    /// Set instead of `alias` when the base names a local image by fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl InstanceSource {
    /// The alias or fingerprint this source points at.
    pub fn reference(&self) -> &str {
        self.fingerprint.as_deref().unwrap_or(&self.alias)
    }
}

/// State change requested through `PUT /1.0/containers/<name>/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Freeze,
    Unfreeze,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Freeze => "freeze",
            Action::Unfreeze => "unfreeze",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatePut {
    pub action: &'static str,
    pub timeout: i64,
    pub force: bool,
    pub stateful: bool,
}

/// `POST /1.0/containers/<name>/exec`
#[derive(Debug, Clone, Serialize)]
pub struct ExecPost {
    pub command: Vec<String>,
    pub environment: BTreeMap<String, String>,
    #[serde(rename = "wait-for-websocket")]
    pub wait_for_websocket: bool,
    pub interactive: bool,
    pub width: u16,
    pub height: u16,
}

/// `POST /1.0/images`
#[derive(Debug, Clone, Serialize)]
pub struct ImagesPost {
    pub public: bool,
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_algorithm: Option<String>,
    pub source: ImageSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// `POST /1.0/images/aliases`
#[derive(Debug, Clone, Serialize)]
pub struct ImageAliasPost {
    pub name: String,
    pub description: String,
    pub target: String,
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
