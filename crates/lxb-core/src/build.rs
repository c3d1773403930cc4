//! The build pipeline.
//!
//! A build is a fixed sequence of [`BuildStep`]s run against one container:
//! create, start, push files, register templates, run commands, stop, publish,
//! and optionally remove. Steps run strictly in order. The first failure ends
//! the build and leaves the container in place for inspection.

use crate::commands::run_commands;
use crate::config::BuilderConfig;
use crate::devices::resolve_devices;
use crate::error::{BuildError, Result};
use crate::instance::{BuildInstance, InstanceStatus};
use crate::provision::select_provisioner;
use crate::readiness::{wait_for_network, Readiness};
use crate::remote::{ImagePublish, InstanceCreate, Remote};
use crate::spec::BuildSpec;
use crate::templates::{inject_templates, InstanceLayout};
use lxb_lxd::Action;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// One unit of failure in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    /// Create the container from the base image.
    Create,
    /// Start it and wait for an IPv4 address.
    Start,
    /// Copy the lxfile's `files` mappings in.
    ProvisionFiles,
    /// Upload templates and register them in `metadata.yaml`.
    InjectTemplates,
    /// Run the build commands in order.
    RunCommands,
    /// Stop the container.
    Stop,
    /// Publish the stopped container as an image.
    Snapshot,
    /// Delete the container; skipped when it is kept.
    Remove,
}

impl BuildStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStep::Create => "create",
            BuildStep::Start => "start",
            BuildStep::ProvisionFiles => "provision-files",
            BuildStep::InjectTemplates => "inject-templates",
            BuildStep::RunCommands => "run-commands",
            BuildStep::Stop => "stop",
            BuildStep::Snapshot => "snapshot",
            BuildStep::Remove => "remove",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PIPELINE: &[BuildStep] = &[
    BuildStep::Create,
    BuildStep::Start,
    BuildStep::ProvisionFiles,
    BuildStep::InjectTemplates,
    BuildStep::RunCommands,
    BuildStep::Stop,
    BuildStep::Snapshot,
];

/// What a successful build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Container the image was built in (already deleted unless kept).
    pub instance: String,
    /// Fingerprint of the published image.
    pub image: String,
}

/// A single build of `spec` on `remote`.
pub struct Build<'s, R: Remote> {
    spec: &'s BuildSpec,
    remote: &'s R,
    instance: BuildInstance,
    config: BuilderConfig,
    cancel: CancellationToken,
}

impl<'s, R: Remote> Build<'s, R> {
    pub fn new(spec: &'s BuildSpec, remote: &'s R, config: BuilderConfig) -> Self {
        let instance = BuildInstance::for_base(&spec.base_image, &config.remote, None);
        Self {
            spec,
            remote,
            instance,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a fixed instance name instead of a generated one.
    pub fn with_instance(mut self, name: impl Into<String>) -> Self {
        self.instance = BuildInstance::new(name, self.config.remote.clone());
        self
    }

    /// Append `suffix` to the generated instance name.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.instance =
            BuildInstance::for_base(&self.spec.base_image, &self.config.remote, Some(suffix));
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn instance(&self) -> &BuildInstance {
        &self.instance
    }

    pub fn remote(&self) -> &R {
        self.remote
    }

    /// The steps a build will run.
    pub fn steps(keep_instance: bool) -> Vec<BuildStep> {
        let mut steps = PIPELINE.to_vec();
        if !keep_instance {
            steps.push(BuildStep::Remove);
        }
        steps
    }

    /// Run the pipeline.
    ///
    /// Lxfile validation errors come back as-is, before anything reaches the
    /// daemon. Every later failure is wrapped in [`BuildError::Step`], naming
    /// the step and, once creation has succeeded, the container left behind.
    pub async fn execute(&mut self, keep_instance: bool) -> Result<BuildOutcome> {
        self.spec.validate()?;

        let start = std::time::Instant::now();
        tracing::info!(
            instance = %self.instance.name,
            base = %self.spec.base_image,
            keep = keep_instance,
            "Starting build"
        );

        for step in Self::steps(keep_instance) {
            if self.cancel.is_cancelled() {
                return Err(self.step_error(step, BuildError::Cancelled));
            }

            let step_start = std::time::Instant::now();
            tracing::info!(instance = %self.instance.name, step = %step, "Step started");
            if let Err(e) = self.run_step(step).await {
                tracing::error!(instance = %self.instance.name, step = %step, error = %e, "Step failed");
                return Err(self.step_error(step, e));
            }
            tracing::info!(
                instance = %self.instance.name,
                step = %step,
                elapsed_ms = step_start.elapsed().as_millis() as u64,
                "Step finished"
            );
        }

        let image = self.instance.image.clone().ok_or_else(|| {
            BuildError::Configuration("pipeline finished without an image".into())
        })?;
        tracing::info!(
            instance = %self.instance.name,
            image = %image,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Build complete"
        );
        Ok(BuildOutcome {
            instance: self.instance.name.clone(),
            image,
        })
    }

    fn step_error(&self, step: BuildStep, source: BuildError) -> BuildError {
        let instance = match self.instance.status {
            InstanceStatus::Pending => None,
            _ => Some(self.instance.name.clone()),
        };
        BuildError::Step {
            step,
            instance,
            source: Box::new(source),
        }
    }

    async fn run_step(&mut self, step: BuildStep) -> Result<()> {
        let name = self.instance.name.clone();
        let remote: &dyn Remote = self.remote;

        match step {
            BuildStep::Create => {
                let devices =
                    resolve_devices(self.spec, &self.config.default_networks, remote).await?;
                let request = InstanceCreate {
                    name,
                    remote: self.instance.remote.clone(),
                    base_image: self.spec.base_image.clone(),
                    profiles: self.spec.profiles.clone(),
                    config: self.spec.config.clone(),
                    devices,
                };
                remote.create_instance(&request).await?;
                self.instance.set_status(InstanceStatus::Created);
            }
            BuildStep::Start => {
                remote
                    .perform_action(&name, Action::Start, self.config.action_timeout, false, false)
                    .await?;
                self.instance.set_status(InstanceStatus::Running);

                let policy = self.config.readiness_policy();
                if wait_for_network(remote, &name, policy, &self.cancel).await
                    == Readiness::Cancelled
                {
                    return Err(BuildError::Cancelled);
                }
            }
            BuildStep::ProvisionFiles => {
                if self.spec.files.is_empty() {
                    return Ok(());
                }
                let provisioner = select_provisioner(remote);
                tracing::debug!(instance = %name, strategy = provisioner.name(), "Provisioning files");
                let report = provisioner.provision(remote, &name, &self.spec.files).await?;
                if !report.failures.is_empty() {
                    tracing::warn!(
                        instance = %name,
                        pushed = report.pushed,
                        skipped = report.failures.len(),
                        "Some files were not provisioned"
                    );
                }
            }
            BuildStep::InjectTemplates => {
                let layout = InstanceLayout::new(&self.config.lxd_dir, &name);
                inject_templates(&layout, &self.spec.templates).await?;
            }
            BuildStep::RunCommands => {
                run_commands(remote, &name, &self.spec.commands, &self.spec.env).await?;
            }
            BuildStep::Stop => {
                remote
                    .perform_action(&name, Action::Stop, self.config.action_timeout, true, false)
                    .await?;
                self.instance.set_status(InstanceStatus::Stopped);
            }
            BuildStep::Snapshot => {
                let request = ImagePublish {
                    public: self.spec.public,
                    aliases: self.spec.aliases.clone(),
                    properties: self.spec.properties.clone(),
                    compression: self.spec.compression_algo.clone(),
                };
                let fingerprint = remote.publish_image(&name, &request).await?;
                self.instance.image = Some(fingerprint);
                self.instance.set_status(InstanceStatus::Published);
            }
            BuildStep::Remove => {
                remote.delete_instance(&name).await?;
                self.instance.set_status(InstanceStatus::Removed);
            }
        }
        Ok(())
    }
}
