//! Registering create-time templates in the container's on-disk metadata.
//!
//! This edits `<lxd_dir>/containers/<name>/metadata.yaml` directly, so it only
//! works when lxb runs on the daemon's host with access to its storage.

use crate::error::{BuildError, Result};
use crate::spec::split_mapping;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One entry of the `templates` map in `metadata.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// File name under the instance's `templates/` directory.
    pub template: String,
    #[serde(default)]
    pub when: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub create_only: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TemplateEntry {
    /// Rendered once, when an instance is created from the image.
    pub fn on_create(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            when: vec!["create".to_string()],
            ..Default::default()
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The image metadata descriptor.
///
/// Only `templates` is interpreted; every other key is carried through
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "nullable")]
    pub templates: BTreeMap<String, TemplateEntry>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_yaml::Value>,
}

impl Metadata {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_yaml(&text)
    }

    /// Replace `path` with this descriptor via a temporary sibling and rename.
    pub async fn store(&self, path: &Path) -> Result<()> {
        let mut temp = path.as_os_str().to_owned();
        temp.push(".lxb-tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, self.to_yaml()?).await?;
        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }

    /// Returns a copy with `destination` mapped to `entry`.
    pub fn with_template(mut self, destination: impl Into<String>, entry: TemplateEntry) -> Self {
        self.templates.insert(destination.into(), entry);
        self
    }
}

/// Where an instance lives on the daemon's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceLayout {
    root: PathBuf,
}

impl InstanceLayout {
    pub fn new(lxd_dir: &Path, instance: &str) -> Self {
        Self {
            root: lxd_dir.join("containers").join(instance),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join("metadata.yaml")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }
}

/// Copy each template source into the instance and register it in
/// `metadata.yaml`. Returns the number of templates added.
pub async fn inject_templates(layout: &InstanceLayout, mappings: &[String]) -> Result<usize> {
    if mappings.is_empty() {
        return Ok(0);
    }
    if !tokio::fs::metadata(layout.root())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(BuildError::Template(format!(
            "instance directory {} not found",
            layout.root().display()
        )));
    }
    let metadata_path = layout.metadata_path();
    if tokio::fs::metadata(&metadata_path).await.is_err() {
        return Err(BuildError::Template(format!(
            "{} not found",
            metadata_path.display()
        )));
    }

    let mut metadata = Metadata::load(&metadata_path).await?;
    let templates_dir = layout.templates_dir();
    tokio::fs::create_dir_all(&templates_dir).await?;

    for mapping in mappings {
        let (source, destination) = split_mapping(mapping)?;
        let file_name = Path::new(source)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| BuildError::Template(format!("template source {source} has no file name")))?;

        tokio::fs::copy(source, templates_dir.join(file_name))
            .await
            .map_err(|e| BuildError::Template(format!("copying {source}: {e}")))?;
        tracing::debug!(source = %source, destination = %destination, "Registered template");

        metadata = metadata.with_template(destination, TemplateEntry::on_create(file_name));
    }

    metadata.store(&metadata_path).await?;
    Ok(mappings.len())
}
