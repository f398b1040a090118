use super::{Readings, parse_value, single};
use crate::SampleError;
use tokio::process::Command;
use tracing::trace;

const SHELL: &str = "/bin/bash";

/// Runs a shell command and reads a single integer from its stdout.
#[derive(Debug, Clone)]
pub struct BashSampler {
    command: String,
}

impl BashSampler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Run the command to completion. Dropping the future kills the child.
    pub async fn sample(&self) -> Result<Readings, SampleError> {
        let output = Command::new(SHELL)
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SampleError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SampleError::Exec {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(command = %self.command, %stdout, "command finished");
        parse_value(&stdout).map(single)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn reads_command_output() {
        let readings = BashSampler::new("echo 17").sample().await.unwrap();
        assert_eq!(readings, Readings::from([(String::new(), 17)]));
    }

    #[tokio::test]
    async fn uses_bash() {
        let readings = BashSampler::new("echo $(( 6 * 7 ))")
            .sample()
            .await
            .unwrap();
        assert_eq!(readings[""], 42);
    }

    #[tokio::test]
    async fn nonzero_exit_is_exec_error() {
        let err = BashSampler::new("echo oops >&2; exit 3")
            .sample()
            .await
            .unwrap_err();
        match err {
            SampleError::Exec { stderr, status, .. } => {
                assert_eq!(stderr, "oops");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn bad_output_is_parse_error() {
        let err = BashSampler::new("echo hello").sample().await.unwrap_err();
        assert!(matches!(err, SampleError::Parse { .. }));
    }
}
