//! Build specification (the "lxfile").

use crate::error::{BuildError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Device name → attribute map, as LXD expects it.
pub type DeviceMap = BTreeMap<String, BTreeMap<String, String>>;

/// Declarative description of one image build.
///
/// Loaded from YAML. Unknown keys are ignored; everything except `baseimg`
/// is optional.
///
/// ```yaml
/// baseimg: images:alpine/3.18
/// image_aliases: [alpine-nginx]
/// env:
///   DEBIAN_FRONTEND: noninteractive
/// files:
///   - nginx.conf:/etc/nginx/nginx.conf
/// templates:
///   - tpl/hostname.tpl:/etc/hostname
/// cmd:
///   - apk add --no-cache nginx
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Image the build container is created from.
    #[serde(rename = "baseimg")]
    pub base_image: String,

    #[serde(rename = "image_aliases", default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(rename = "image_properties", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Publish the image as public (default: private).
    #[serde(default, skip_serializing_if = "is_false")]
    pub public: bool,

    /// Compression algorithm for the image tarball (default: daemon's choice).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_algo: Option<String>,

    #[serde(rename = "build_profiles", default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,

    #[serde(rename = "build_config", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,

    /// Networks to attach. Empty means try the conventional defaults.
    #[serde(rename = "build_networks", default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub devices: DeviceMap,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Shell commands, run in order.
    #[serde(rename = "cmd", default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,

    /// `source:destination` pairs pushed into the instance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// `source:destination` pairs registered as create-time templates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl BuildSpec {
    /// Parse a spec from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| BuildError::Configuration(format!("invalid lxfile: {e}")))
    }

    /// Load a spec from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(BuildError::from)
    }

    /// Check structure before anything is sent to the daemon.
    pub fn validate(&self) -> Result<()> {
        if self.base_image.trim().is_empty() {
            return Err(BuildError::Configuration("baseimg is required".into()));
        }
        for mapping in self.files.iter().chain(&self.templates) {
            let (source, destination) = split_mapping(mapping)?;
            if source.is_empty() || destination.is_empty() {
                return Err(BuildError::InvalidMapping(mapping.clone()));
            }
        }
        Ok(())
    }
}

/// Split a `source:destination` entry on its first colon.
pub fn split_mapping(mapping: &str) -> Result<(&str, &str)> {
    mapping
        .split_once(':')
        .ok_or_else(|| BuildError::InvalidMapping(mapping.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
baseimg: images:alpine/3.18
image_aliases: [alpine-web, web]
image_properties:
  os: alpine
public: true
compression_algo: xz
build_profiles: [default, build]
build_config:
  security.nesting: "true"
build_networks: [lxdbr0]
devices:
  root:
    type: disk
    path: /
    pool: default
env:
  APP_ENV: production
cmd:
  - apk update
  - apk add nginx
files:
  - conf/nginx.conf:/etc/nginx/nginx.conf
templates:
  - tpl/hostname.tpl:/etc/hostname
some_future_key: ignored
"#;

    #[test]
    fn test_parse_full_spec() {
        let spec = BuildSpec::from_yaml(FULL).expect("should parse");
        assert_eq!(spec.base_image, "images:alpine/3.18");
        assert_eq!(spec.aliases, vec!["alpine-web", "web"]);
        assert!(spec.public);
        assert_eq!(spec.compression_algo.as_deref(), Some("xz"));
        assert_eq!(spec.profiles, vec!["default", "build"]);
        assert_eq!(spec.config["security.nesting"], "true");
        assert_eq!(spec.networks, vec!["lxdbr0"]);
        assert_eq!(spec.devices["root"]["type"], "disk");
        assert_eq!(spec.env["APP_ENV"], "production");
        assert_eq!(spec.commands.len(), 2);
        assert_eq!(spec.files.len(), 1);
        assert_eq!(spec.templates.len(), 1);
    }

    #[test]
    fn test_minimal_spec_defaults() {
        let spec = BuildSpec::from_yaml("baseimg: ubuntu:22.04\n").unwrap();
        assert!(!spec.public);
        assert!(spec.compression_algo.is_none());
        assert!(spec.aliases.is_empty());
        assert!(spec.devices.is_empty());
        assert!(spec.commands.is_empty());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip_is_identical() {
        let spec = BuildSpec::from_yaml(FULL).unwrap();
        let reloaded = BuildSpec::from_yaml(&spec.to_yaml().unwrap()).unwrap();
        assert_eq!(spec, reloaded);
    }

    #[test]
    fn test_missing_baseimg_is_rejected() {
        assert!(BuildSpec::from_yaml("cmd: [true]\n").is_err());

        let spec = BuildSpec::from_yaml("baseimg: \"  \"\n").unwrap();
        assert!(matches!(spec.validate(), Err(BuildError::Configuration(_))));
    }

    #[test]
    fn test_malformed_mapping_is_rejected() {
        let spec = BuildSpec {
            base_image: "alpine".into(),
            files: vec!["no-separator".into()],
            ..Default::default()
        };
        assert!(matches!(spec.validate(), Err(BuildError::InvalidMapping(m)) if m == "no-separator"));

        let spec = BuildSpec {
            base_image: "alpine".into(),
            templates: vec!["tpl/a:".into()],
            ..Default::default()
        };
        assert!(matches!(spec.validate(), Err(BuildError::InvalidMapping(_))));
    }

    #[test]
    fn test_split_mapping_uses_first_colon() {
        assert_eq!(split_mapping("a:b:c").unwrap(), ("a", "b:c"));
        assert!(split_mapping("abc").is_err());
    }
}
