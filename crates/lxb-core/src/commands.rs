//! Running the lxfile's build commands.

use crate::error::{BuildError, Result};
use crate::remote::Remote;
use std::collections::BTreeMap;

pub const TERMINAL_COLS: u16 = 80;
pub const TERMINAL_ROWS: u16 = 24;

fn shell_argv(command: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()]
}

/// Run each command through `/bin/sh -c`, stopping at the first failure.
pub async fn run_commands(
    remote: &dyn Remote,
    instance: &str,
    commands: &[String],
    env: &BTreeMap<String, String>,
) -> Result<()> {
    for (index, command) in commands.iter().enumerate() {
        let start = std::time::Instant::now();
        tracing::info!(instance = %instance, index, command = %command, "Running build command");

        let exit_code = remote
            .exec(instance, &shell_argv(command), env, TERMINAL_COLS, TERMINAL_ROWS)
            .await
            .map_err(|e| BuildError::CommandFailed {
                command: command.clone(),
                exit_code: None,
                source: Some(e),
            })?;

        if exit_code != 0 {
            return Err(BuildError::CommandFailed {
                command: command.clone(),
                exit_code: Some(exit_code),
                source: None,
            });
        }
        tracing::debug!(
            instance = %instance,
            index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Build command finished"
        );
    }
    Ok(())
}
