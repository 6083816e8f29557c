// src/invoke.rs

//! Process execution for command steps
//!
//! Runs a command string through `/bin/sh -c` with:
//! - the builder's explicit environment table (never the process table)
//! - stdin nullified to prevent hangs on interactive prompts
//! - captured stdout/stderr, relayed line by line to the log
//! - a hard timeout, after which the child is killed
//!
//! Outcomes are classified for the retry supervisor: a non-zero exit is
//! [`Error::CommandFailed`], an expired timeout is
//! [`Error::CommandTimeout`], and a spawn failure is plain I/O (fatal).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::{Error, Result};
use crate::step::StepContext;

/// A command invocation bound at declaration time.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Shell command text, run via `/bin/sh -c`
    pub command: String,
    /// Working directory; relative paths resolve against the build
    /// workdir, absent means the workdir itself
    pub workdir: Option<PathBuf>,
    /// Extra variables layered over the builder's environment
    pub env_overrides: BTreeMap<String, String>,
    /// Per-command timeout; absent means the configured step timeout
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Spec for a plain shell command
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Set the working directory
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Layer an extra environment variable over the builder's table
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }
}

/// Captured output of a completed command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run a command spec against the step context.
///
/// `description` labels log lines and failure errors; it is the step's
/// description, not the command text.
pub fn run_command(
    description: &str,
    spec: &CommandSpec,
    ctx: &StepContext<'_>,
) -> Result<CommandOutput> {
    let workdir = match &spec.workdir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => ctx.workdir.join(dir),
        None => ctx.workdir.to_path_buf(),
    };
    let timeout = spec.timeout.unwrap_or(ctx.timeout);

    debug!(
        "[{}] sh -c {:?} (cwd: {}, timeout: {}s)",
        description,
        spec.command,
        workdir.display(),
        timeout.as_secs()
    );

    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(&spec.command)
        .current_dir(&workdir)
        .env_clear()
        .envs(ctx.env.iter())
        .envs(&spec.env_overrides)
        .stdin(Stdio::null()) // prevent hangs on interactive prompts
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    match child.wait_timeout(timeout)? {
        Some(status) => {
            let output = child.wait_with_output()?;
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();

            for line in stdout.lines() {
                debug!("[{}] {}", description, line);
            }
            for line in stderr.lines() {
                warn!("[{}] {}", description, line);
            }

            if status.success() {
                Ok(CommandOutput { stdout, stderr })
            } else {
                Err(Error::CommandFailed {
                    description: description.to_string(),
                    code: status.code().unwrap_or(-1),
                })
            }
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::CommandTimeout {
                description: description.to_string(),
                secs: timeout.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use std::path::Path;
    use tempfile::TempDir;

    fn ctx<'a>(env: &'a Environment, workdir: &'a Path) -> StepContext<'a> {
        StepContext {
            env,
            workdir,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_successful_command_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let env = Environment::from_process();
        let out = run_command("echo", &CommandSpec::shell("echo hello"), &ctx(&env, dir.path()))
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_nonzero_exit_is_command_failed() {
        let dir = TempDir::new().unwrap();
        let env = Environment::from_process();
        let err =
            run_command("fail", &CommandSpec::shell("exit 3"), &ctx(&env, dir.path())).unwrap_err();
        match err {
            Error::CommandFailed { description, code } => {
                assert_eq!(description, "fail");
                assert_eq!(code, 3);
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_kills_and_classifies() {
        let dir = TempDir::new().unwrap();
        let env = Environment::from_process();
        let spec = CommandSpec {
            command: "sleep 30".to_string(),
            timeout: Some(Duration::from_millis(200)),
            ..CommandSpec::default()
        };
        let err = run_command("slow", &spec, &ctx(&env, dir.path())).unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { secs: 0, .. }));
    }

    #[test]
    fn test_environment_comes_from_explicit_table() {
        let dir = TempDir::new().unwrap();
        let mut env = Environment::from_process();
        env.set("GALLEY_TEST_MARKER", "present");
        let out = run_command(
            "env check",
            &CommandSpec::shell("echo ${GALLEY_TEST_MARKER:-absent}"),
            &ctx(&env, dir.path()),
        )
        .unwrap();
        assert_eq!(out.stdout.trim(), "present");

        env.remove("GALLEY_TEST_MARKER");
        let out = run_command(
            "env check",
            &CommandSpec::shell("echo ${GALLEY_TEST_MARKER:-absent}"),
            &ctx(&env, dir.path()),
        )
        .unwrap();
        assert_eq!(out.stdout.trim(), "absent");
    }

    #[test]
    fn test_env_overrides_layer_over_table() {
        let dir = TempDir::new().unwrap();
        let mut env = Environment::from_process();
        env.set("LAYERED", "base");
        let spec = CommandSpec::shell("echo $LAYERED").env("LAYERED", "override");
        let out = run_command("layered", &spec, &ctx(&env, dir.path())).unwrap();
        assert_eq!(out.stdout.trim(), "override");
    }

    #[test]
    fn test_relative_workdir_resolves_against_context() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let env = Environment::from_process();
        let spec = CommandSpec::shell("touch marker").in_dir("sub");
        run_command("touch", &spec, &ctx(&env, dir.path())).unwrap();
        assert!(dir.path().join("sub/marker").exists());
    }
}
