//! Pushing files and directory trees into a container.

use crate::client::{LxdClient, QUERY_VALUE};
use crate::error::{LxdError, Result};
use hyper::{Body, Method};
use percent_encoding::utf8_percent_encode;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use walkdir::WalkDir;

/// API extension that allows creating directories through the files API.
pub const DIRECTORY_MANIPULATION: &str = "directory_manipulation";

/// Kind of filesystem entry to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    fn as_str(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Directory => "directory",
        }
    }
}

/// Ownership and permissions for a pushed entry.
///
/// `None` for uid/gid leaves ownership to the daemon's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOptions {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub mode: u32,
    pub kind: FileKind,
}

impl PushOptions {
    pub fn file(mode: u32) -> Self {
        Self {
            uid: None,
            gid: None,
            mode,
            kind: FileKind::File,
        }
    }

    pub fn directory(mode: u32) -> Self {
        Self {
            kind: FileKind::Directory,
            ..Self::file(mode)
        }
    }

    pub fn owned_by(mut self, uid: u32, gid: u32) -> Self {
        self.uid = Some(uid);
        self.gid = Some(gid);
        self
    }

    pub(crate) fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-LXD-type", self.kind.as_str().to_string()),
            ("X-LXD-mode", format!("{:04o}", self.mode & 0o7777)),
        ];
        if let Some(uid) = self.uid {
            headers.push(("X-LXD-uid", uid.to_string()));
        }
        if let Some(gid) = self.gid {
            headers.push(("X-LXD-gid", gid.to_string()));
        }
        headers
    }
}

impl LxdClient {
    /// Write `content` to `path` inside the container.
    pub async fn push_file(
        &self,
        name: &str,
        path: &str,
        options: PushOptions,
        content: Vec<u8>,
    ) -> Result<()> {
        tracing::debug!(
            name = %name,
            path = %path,
            kind = options.kind.as_str(),
            mode = format!("{:04o}", options.mode & 0o7777),
            size = content.len(),
            "Pushing file"
        );
        let mut headers = options.headers();
        headers.push(("Content-Type", "application/octet-stream".to_string()));

        self.send(
            Method::POST,
            &format!(
                "/1.0/containers/{name}/files?path={}",
                utf8_percent_encode(path, QUERY_VALUE)
            ),
            &headers,
            Body::from(content),
        )
        .await?;
        Ok(())
    }

    /// Recreate the tree rooted at `source` under `target` in the container.
    ///
    /// Directories are created first, then files pushed with their own mode
    /// bits. Requires the `directory_manipulation` API extension.
    pub async fn push_directory_recursive(
        &self,
        name: &str,
        source: &Path,
        target: &str,
    ) -> Result<()> {
        if !self.has_extension(DIRECTORY_MANIPULATION) {
            return Err(LxdError::Protocol(format!(
                "daemon lacks the {DIRECTORY_MANIPULATION} extension"
            )));
        }

        let start = std::time::Instant::now();
        let mut pushed = 0usize;
        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| LxdError::Io(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| LxdError::Protocol(format!("walk escaped its root: {e}")))?;
            let remote_path = join_remote(target, relative);
            let mode = entry
                .metadata()
                .map_err(|e| LxdError::Io(e.into()))?
                .permissions()
                .mode();

            let file_type = entry.file_type();
            if file_type.is_dir() {
                self.push_file(name, &remote_path, PushOptions::directory(mode), Vec::new())
                    .await?;
            } else if file_type.is_file() {
                let content = tokio::fs::read(entry.path()).await?;
                self.push_file(name, &remote_path, PushOptions::file(mode), content)
                    .await?;
            } else {
                tracing::debug!(path = %entry.path().display(), "Skipping non-regular entry");
                continue;
            }
            pushed += 1;
        }

        tracing::debug!(
            name = %name,
            source = %source.display(),
            target = %target,
            pushed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Directory pushed"
        );
        Ok(())
    }
}

/// Join a host-relative path onto a container path using `/` separators.
fn join_remote(base: &str, relative: &Path) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for part in relative.components() {
        out.push('/');
        out.push_str(&part.as_os_str().to_string_lossy());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ownership_has_no_uid_headers() {
        let headers = PushOptions::file(0o100644).headers();
        assert!(headers.contains(&("X-LXD-mode", "0644".to_string())));
        assert!(headers.contains(&("X-LXD-type", "file".to_string())));
        assert!(!headers.iter().any(|(name, _)| *name == "X-LXD-uid"));
    }

    #[test]
    fn test_root_ownership_headers() {
        let headers = PushOptions::file(0o755).owned_by(0, 0).headers();
        assert!(headers.contains(&("X-LXD-uid", "0".to_string())));
        assert!(headers.contains(&("X-LXD-gid", "0".to_string())));
    }

    #[test]
    fn test_directory_kind_header() {
        let headers = PushOptions::directory(0o40755).headers();
        assert!(headers.contains(&("X-LXD-type", "directory".to_string())));
        assert!(headers.contains(&("X-LXD-mode", "0755".to_string())));
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/srv/app/", Path::new("")), "/srv/app");
        assert_eq!(join_remote("/srv/app", Path::new("bin/run")), "/srv/app/bin/run");
        assert_eq!(join_remote("/", Path::new("")), "/");
    }
}
