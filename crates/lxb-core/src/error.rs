//! Error types for lxb-core.

use crate::build::BuildStep;
use thiserror::Error;

/// Result type alias for lxb-core operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that can occur while building an image.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The lxfile or environment cannot produce a valid build
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A `source:destination` entry could not be parsed
    #[error("incorrect file path format: {0}")]
    InvalidMapping(String),

    /// An LXD call or awaited operation failed
    #[error(transparent)]
    Remote(#[from] lxb_lxd::LxdError),

    /// A file could not be pushed into the instance
    #[error("failed to provision {path}: {source}")]
    Provisioning {
        /// Host-side path that failed
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Template precondition or copy failure
    #[error("template error: {0}")]
    Template(String),

    /// Instance metadata could not be parsed or written back
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_yaml::Error),

    /// A build command exited non-zero or its channel broke
    #[error("build command `{command}` failed: {}", describe_failure(.exit_code, .source))]
    CommandFailed {
        /// The shell command as written in the lxfile
        command: String,
        /// Exit code, if the command ran to completion
        exit_code: Option<i32>,
        #[source]
        source: Option<lxb_lxd::LxdError>,
    },

    /// The build was aborted from outside
    #[error("build cancelled")]
    Cancelled,

    /// A pipeline step failed; any created instance is left in place
    #[error("{step} step failed{}: {source}", describe_instance(.instance))]
    Step {
        /// Step that failed
        step: BuildStep,
        /// Instance left behind on the daemon, `None` if none was created
        instance: Option<String>,
        #[source]
        source: Box<BuildError>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Name of the instance a failed build left on the daemon, if any.
    pub fn surviving_instance(&self) -> Option<&str> {
        match self {
            Self::Step { instance, .. } => instance.as_deref(),
            _ => None,
        }
    }

    /// The step that failed, if the error came out of the pipeline.
    pub fn failed_step(&self) -> Option<BuildStep> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The underlying error, with any step annotation removed.
    pub fn root_cause(&self) -> &BuildError {
        match self {
            Self::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn describe_instance(instance: &Option<String>) -> String {
    match instance {
        Some(name) => format!(" for instance {name}"),
        None => " before any instance was created".to_string(),
    }
}

fn describe_failure(exit_code: &Option<i32>, source: &Option<lxb_lxd::LxdError>) -> String {
    match (exit_code, source) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(e)) => e.to_string(),
        (None, None) => "no exit code".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failure_message() {
        let err = BuildError::CommandFailed {
            command: "false".into(),
            exit_code: Some(1),
            source: None,
        };
        assert_eq!(err.to_string(), "build command `false` failed: exit code 1");
    }

    #[test]
    fn test_step_error_reports_instance() {
        let err = BuildError::Step {
            step: BuildStep::RunCommands,
            instance: Some("alpine-build-1".into()),
            source: Box::new(BuildError::Cancelled),
        };
        assert_eq!(err.surviving_instance(), Some("alpine-build-1"));
        assert_eq!(err.failed_step(), Some(BuildStep::RunCommands));
        assert!(matches!(err.root_cause(), BuildError::Cancelled));
        assert_eq!(
            err.to_string(),
            "run-commands step failed for instance alpine-build-1: build cancelled"
        );
    }

    #[test]
    fn test_step_error_without_instance() {
        let err = BuildError::Step {
            step: BuildStep::Create,
            instance: None,
            source: Box::new(BuildError::Configuration("no network".into())),
        };
        assert_eq!(err.surviving_instance(), None);
        assert_eq!(err.failed_step(), Some(BuildStep::Create));
        assert_eq!(
            err.to_string(),
            "create step failed before any instance was created: configuration error: no network"
        );
    }
}
