//! The build container as tracked by the pipeline.

use std::fmt;

/// Longest instance name LXD accepts.
pub const MAX_NAME_LEN: usize = 63;

/// Where the build container is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceStatus {
    #[default]
    Pending,
    Created,
    Running,
    Stopped,
    Published,
    Removed,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Created => "created",
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Published => "published",
            InstanceStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// The container a build runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInstance {
    pub name: String,
    /// Remote the base image came from.
    pub remote: String,
    /// Fingerprint, once published.
    pub image: Option<String>,
    pub status: InstanceStatus,
}

impl BuildInstance {
    pub fn new(name: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: remote.into(),
            image: None,
            status: InstanceStatus::Pending,
        }
    }

    /// Name derived from the base image and the current time.
    pub fn for_base(base_image: &str, remote: &str, suffix: Option<&str>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self::new(generate_name(base_image, now, suffix), remote)
    }

    pub(crate) fn set_status(&mut self, status: InstanceStatus) {
        tracing::debug!(instance = %self.name, from = %self.status, to = %status, "Instance status");
        self.status = status;
    }
}

fn sanitise(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// `<sanitised base>-build-<timestamp>[-<suffix>]`, valid as an LXD name.
pub fn generate_name(base_image: &str, timestamp: i64, suffix: Option<&str>) -> String {
    let mut base = sanitise(base_image);
    if !base.starts_with(|c: char| c.is_ascii_alphabetic()) {
        base = if base.is_empty() {
            "lxb".to_string()
        } else {
            format!("lxb-{base}")
        };
    }

    let mut tail = format!("-build-{timestamp}");
    if let Some(suffix) = suffix.map(sanitise).filter(|s| !s.is_empty()) {
        tail.push('-');
        tail.push_str(&suffix);
    }

    let room = MAX_NAME_LEN.saturating_sub(tail.len());
    if base.len() > room {
        base.truncate(room);
        base.truncate(base.trim_end_matches('-').len());
    }
    let mut name = base + &tail;
    name.truncate(MAX_NAME_LEN);
    name
}
