//! Pushing host files into the build container.
//!
//! Two strategies exist. [`NativeProvisioner`] relies on the daemon's
//! `directory_manipulation` extension and is fail-fast. [`ManualProvisioner`]
//! serves older daemons: it walks directories one level deep, pushes each
//! regular file on its own, and logs and skips anything that fails.

use crate::error::{BuildError, Result};
use crate::remote::Remote;
use crate::spec::split_mapping;
use async_trait::async_trait;
use lxb_lxd::DIRECTORY_MANIPULATION;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// A mapping that the manual strategy skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionFailure {
    /// Host path, or the raw mapping when it could not be parsed.
    pub path: String,
    pub reason: String,
}

/// Result of one provisioning batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Number of successful push calls.
    pub pushed: usize,
    pub failures: Vec<ProvisionFailure>,
}

impl ProvisionReport {
    fn skip(&mut self, path: impl Into<String>, reason: impl ToString) {
        let failure = ProvisionFailure {
            path: path.into(),
            reason: reason.to_string(),
        };
        tracing::warn!(path = %failure.path, reason = %failure.reason, "Skipping file");
        self.failures.push(failure);
    }
}

/// Strategy for copying `source:destination` mappings into an instance.
#[async_trait]
pub trait FileProvisioner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn provision(
        &self,
        remote: &dyn Remote,
        instance: &str,
        mappings: &[String],
    ) -> Result<ProvisionReport>;
}

/// Pick the strategy for this daemon once per batch.
pub fn select_provisioner(remote: &dyn Remote) -> Box<dyn FileProvisioner> {
    if remote.has_capability(DIRECTORY_MANIPULATION) {
        Box::new(NativeProvisioner)
    } else {
        Box::new(ManualProvisioner)
    }
}

fn mode_bits(metadata: &std::fs::Metadata) -> u32 {
    metadata.permissions().mode() & 0o7777
}

fn provisioning_error(path: &str, source: impl std::error::Error + Send + Sync + 'static) -> BuildError {
    BuildError::Provisioning {
        path: path.to_string(),
        source: Box::new(source),
    }
}

fn join_destination(directory: &str, file_name: &str) -> String {
    format!("{}/{}", directory.trim_end_matches('/'), file_name)
}

/// Fail-fast strategy using recursive directory pushes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProvisioner;

#[async_trait]
impl FileProvisioner for NativeProvisioner {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn provision(
        &self,
        remote: &dyn Remote,
        instance: &str,
        mappings: &[String],
    ) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::default();
        for mapping in mappings {
            let (source, destination) = split_mapping(mapping)?;
            let metadata = tokio::fs::metadata(source)
                .await
                .map_err(|e| provisioning_error(source, e))?;

            if metadata.is_dir() {
                tracing::debug!(source = %source, destination = %destination, "Pushing directory");
                remote
                    .push_directory_recursive(instance, Path::new(source), destination)
                    .await
                    .map_err(|e| provisioning_error(source, e))?;
            } else {
                let content = tokio::fs::read(source)
                    .await
                    .map_err(|e| provisioning_error(source, e))?;
                tracing::debug!(source = %source, destination = %destination, "Pushing file");
                remote
                    .push_file(instance, destination, None, None, mode_bits(&metadata), content)
                    .await
                    .map_err(|e| provisioning_error(source, e))?;
            }
            report.pushed += 1;
        }
        Ok(report)
    }
}

/// Best-effort strategy for daemons without directory support.
///
/// Files are owned by root. Files found inside a directory take the
/// directory's mode bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualProvisioner;

impl ManualProvisioner {
    async fn push_one(
        remote: &dyn Remote,
        instance: &str,
        source: &Path,
        destination: &str,
        mode: u32,
        report: &mut ProvisionReport,
    ) {
        let display = source.display().to_string();
        let content = match tokio::fs::read(source).await {
            Ok(content) => content,
            Err(e) => return report.skip(display, e),
        };
        match remote
            .push_file(instance, destination, Some(0), Some(0), mode, content)
            .await
        {
            Ok(()) => report.pushed += 1,
            Err(e) => report.skip(display, e),
        }
    }
}

#[async_trait]
impl FileProvisioner for ManualProvisioner {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn provision(
        &self,
        remote: &dyn Remote,
        instance: &str,
        mappings: &[String],
    ) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::default();
        for mapping in mappings {
            let (source, destination) = match split_mapping(mapping) {
                Ok(pair) => pair,
                Err(e) => {
                    report.skip(mapping.as_str(), e);
                    continue;
                }
            };
            let metadata = match tokio::fs::metadata(source).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    report.skip(source, e);
                    continue;
                }
            };

            if !metadata.is_dir() {
                Self::push_one(
                    remote,
                    instance,
                    Path::new(source),
                    destination,
                    mode_bits(&metadata),
                    &mut report,
                )
                .await;
                continue;
            }

            let dir_mode = mode_bits(&metadata);
            let mut entries = match tokio::fs::read_dir(source).await {
                Ok(entries) => entries,
                Err(e) => {
                    report.skip(source, e);
                    continue;
                }
            };
            let mut files = Vec::new();
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => files.push(entry),
                    Ok(None) => break,
                    Err(e) => {
                        report.skip(source, e);
                        break;
                    }
                }
            }
            files.sort_by_key(|entry| entry.file_name());

            for entry in files {
                match entry.file_type().await {
                    Ok(kind) if kind.is_file() => {}
                    Ok(_) => {
                        tracing::debug!(path = %entry.path().display(), "Not a regular file, ignoring");
                        continue;
                    }
                    Err(e) => {
                        report.skip(entry.path().display().to_string(), e);
                        continue;
                    }
                }
                let target = join_destination(destination, &entry.file_name().to_string_lossy());
                Self::push_one(remote, instance, &entry.path(), &target, dir_mode, &mut report)
                    .await;
            }
        }
        Ok(report)
    }
}
