//! External VM provisioner client.
//!
//! Invokes the provisioner CLI with a small fixed vocabulary of subcommands
//! (`up`, `destroy --force`, `provision`, `global-status --prune`). The
//! working directory is passed explicitly per invocation; nothing mutates
//! process-wide state, so there is no prior directory to restore on failure.

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Captured result of one invocation. A non-zero exit or a timeout is a
/// recoverable failure whose diagnostic text travels back to the caller; a
/// process that cannot be spawned at all is reported separately.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub text: String,
}

#[derive(Clone)]
pub struct VagrantClient {
    binary: String,
    command_timeout: Duration,
}

impl VagrantClient {
    #[must_use]
    pub fn new(binary: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            command_timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub async fn up(&self, dir: &Path) -> ProcessOutput {
        self.run(dir, &["up"]).await
    }

    pub async fn destroy(&self, dir: &Path) -> ProcessOutput {
        // --force: never wait on an interactive confirmation prompt
        self.run(dir, &["destroy", "--force"]).await
    }

    pub async fn provision(&self, dir: &Path) -> ProcessOutput {
        self.run(dir, &["provision"]).await
    }

    pub async fn prune(&self, dir: &Path) -> ProcessOutput {
        self.run(dir, &["global-status", "--prune"]).await
    }

    /// Runs an arbitrary command line from the given directory. The caller is
    /// responsible for passing it through the security filter first.
    ///
    /// Unlike the fixed subcommands, a program that cannot even be spawned is
    /// an `Err`, since the command line came from a caller who can correct it.
    pub async fn passthrough(&self, dir: &Path, raw: &str) -> std::io::Result<ProcessOutput> {
        let mut parts = raw.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command",
            ));
        };
        let args: Vec<&str> = parts.collect();

        self.run_program(program, &args, dir).await
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> ProcessOutput {
        let binary = self.binary.clone();
        match self.run_program(&binary, args, dir).await {
            Ok(output) => output,
            Err(err) => ProcessOutput {
                success: false,
                text: format!("failed to spawn `{binary}`: {err}"),
            },
        }
    }

    async fn run_program(
        &self,
        program: &str,
        args: &[&str],
        dir: &Path,
    ) -> std::io::Result<ProcessOutput> {
        debug!(program, ?args, dir = %dir.display(), "spawning external process");

        let future = Command::new(program)
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output();

        match timeout(self.command_timeout, future).await {
            Err(_) => Ok(ProcessOutput {
                success: false,
                text: format!(
                    "`{program} {}` timed out after {}s",
                    args.join(" "),
                    self.command_timeout.as_secs()
                ),
            }),
            Ok(Err(err)) => Err(err),
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));

                Ok(ProcessOutput {
                    success: output.status.success(),
                    text,
                })
            }
        }
    }
}
