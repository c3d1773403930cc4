//! Network device resolution for the build container.

use crate::error::{BuildError, Result};
use crate::remote::NetworkLister;
use crate::spec::{BuildSpec, DeviceMap};
use std::collections::BTreeMap;

/// Networks tried, in order, when the lxfile names none.
pub const DEFAULT_NETWORKS: &[&str] = &["default", "lxcbr0"];

/// How a NIC attaches to its parent network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicType {
    Bridged,
    Macvlan,
}

impl NicType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NicType::Bridged => "bridged",
            NicType::Macvlan => "macvlan",
        }
    }
}

fn nic_device(parent: &str, nic_type: NicType) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("type".to_string(), "nic".to_string()),
        ("nictype".to_string(), nic_type.as_str().to_string()),
        ("parent".to_string(), parent.to_string()),
    ])
}

fn has_explicit_nic(devices: &DeviceMap) -> bool {
    devices
        .values()
        .any(|device| device.get("type").map(String::as_str) == Some("nic"))
}

/// Compute the device map the container is created with.
///
/// With `build_networks` set, every listed network that exists gets a NIC.
/// Otherwise the first existing entry of `defaults` is used. Explicit
/// `devices` are kept as written, and win over a derived NIC of the same name.
pub async fn resolve_devices(
    spec: &BuildSpec,
    defaults: &[String],
    lister: &dyn NetworkLister,
) -> Result<DeviceMap> {
    let mut devices = spec.devices.clone();
    let explicit = !spec.networks.is_empty();
    let candidates: &[String] = if explicit { &spec.networks } else { defaults };

    let mut attached = 0usize;
    for name in candidates {
        let Some(network) = lister.get_network(name).await? else {
            if explicit {
                tracing::warn!(network = %name, "Build network not found, skipping");
            } else {
                tracing::debug!(network = %name, "Default network not present");
            }
            continue;
        };

        let nic_type = if network.is_bridge() {
            NicType::Bridged
        } else {
            NicType::Macvlan
        };
        tracing::debug!(network = %name, nictype = nic_type.as_str(), "Attaching network");
        devices
            .entry(name.clone())
            .or_insert_with(|| nic_device(name, nic_type));
        attached += 1;

        if !explicit {
            break;
        }
    }

    if attached == 0 && !has_explicit_nic(&devices) {
        return Err(BuildError::Configuration(format!(
            "no usable network among [{}] and no nic device declared",
            candidates.join(", ")
        )));
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeRemote};

    fn defaults() -> Vec<String> {
        DEFAULT_NETWORKS.iter().map(|s| s.to_string()).collect()
    }

    fn spec() -> BuildSpec {
        BuildSpec {
            base_image: "alpine/3.18".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bridge_network_is_bridged() {
        let remote = FakeRemote::new().with_network("default", "bridge");
        let devices = resolve_devices(&spec(), &defaults(), &remote).await.unwrap();

        let nic = &devices["default"];
        assert_eq!(nic["type"], "nic");
        assert_eq!(nic["nictype"], "bridged");
        assert_eq!(nic["parent"], "default");
    }

    #[tokio::test]
    async fn test_physical_network_is_macvlan() {
        let remote = FakeRemote::new().with_network("lxcbr0", "physical");
        let devices = resolve_devices(&spec(), &defaults(), &remote).await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices["lxcbr0"]["nictype"], "macvlan");
    }

    #[tokio::test]
    async fn test_first_existing_default_wins() {
        let remote = FakeRemote::new()
            .with_network("default", "bridge")
            .with_network("lxcbr0", "bridge");
        let devices = resolve_devices(&spec(), &defaults(), &remote).await.unwrap();

        assert!(devices.contains_key("default"));
        assert!(!devices.contains_key("lxcbr0"));
        assert_eq!(remote.count(|c| matches!(c, Call::GetNetwork(_))), 1);
    }

    #[tokio::test]
    async fn test_explicit_networks_all_attached() {
        let remote = FakeRemote::new()
            .with_network("build0", "bridge")
            .with_network("uplink", "macvlan");
        let spec = BuildSpec {
            networks: vec!["build0".into(), "missing".into(), "uplink".into()],
            ..spec()
        };
        let devices = resolve_devices(&spec, &defaults(), &remote).await.unwrap();

        assert_eq!(devices["build0"]["nictype"], "bridged");
        assert_eq!(devices["uplink"]["nictype"], "macvlan");
        assert!(!devices.contains_key("missing"));
        assert!(!remote.calls().contains(&Call::GetNetwork("default".into())));
    }

    #[tokio::test]
    async fn test_no_network_is_configuration_error() {
        let remote = FakeRemote::new();
        let err = resolve_devices(&spec(), &defaults(), &remote)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_explicit_nic_device_is_enough() {
        let remote = FakeRemote::new();
        let mut spec = spec();
        spec.devices.insert(
            "eth0".into(),
            BTreeMap::from([
                ("type".to_string(), "nic".to_string()),
                ("nictype".to_string(), "bridged".to_string()),
                ("parent".to_string(), "br-build".to_string()),
            ]),
        );
        let devices = resolve_devices(&spec, &defaults(), &remote).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices["eth0"]["parent"], "br-build");
    }

    #[tokio::test]
    async fn test_explicit_devices_are_kept() {
        let remote = FakeRemote::new().with_network("default", "bridge");
        let mut spec = spec();
        spec.devices.insert(
            "root".into(),
            BTreeMap::from([
                ("type".to_string(), "disk".to_string()),
                ("path".to_string(), "/".to_string()),
            ]),
        );
        let devices = resolve_devices(&spec, &defaults(), &remote).await.unwrap();
        assert_eq!(devices["root"]["type"], "disk");
        assert_eq!(devices["default"]["type"], "nic");
    }
}
