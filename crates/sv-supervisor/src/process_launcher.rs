//! Spawns the server process with its environment and secret material.

use crate::{Secret, SupervisorError, SupervisorResult, generate_secret, write_secret_file};

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use error_location::ErrorLocation;
use sv_config::ServerConfig;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

/// Program, arguments and environment overrides for one launch.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Merged over the inherited environment
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Build the spec from the configured command line.
    ///
    /// In shell mode the command text goes to `sh -c` (`cmd /C` on Windows).
    pub fn from_config(config: &ServerConfig) -> SupervisorResult<Self> {
        let (program, args) = if config.shell {
            shell_invocation(config.shell_line())
        } else {
            let mut tokens = config.command_line().into_iter();
            let program = tokens.next().ok_or_else(|| SupervisorError::LaunchFailure {
                command: config.command.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "command line is empty",
                ),
                location: ErrorLocation::from(Location::caller()),
            })?;
            (program, tokens.collect())
        };

        Ok(Self {
            program,
            args,
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
        })
    }

    /// Hand the secret and its directory to the child through the environment.
    pub fn with_secret(
        mut self,
        secret_env_var: &str,
        dir_env_var: &str,
        dir: &Path,
        secret: &Secret,
    ) -> Self {
        self.env
            .insert(secret_env_var.to_string(), secret.expose().to_string());
        self.env
            .insert(dir_env_var.to_string(), dir.to_string_lossy().into_owned());
        self
    }

    /// Program and arguments joined for log lines and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(unix)]
fn shell_invocation(line: String) -> (String, Vec<String>) {
    (String::from("sh"), vec![String::from("-c"), line])
}

#[cfg(windows)]
fn shell_invocation(line: String) -> (String, Vec<String>) {
    (String::from("cmd"), vec![String::from("/C"), line])
}

// Environment values may hold the secret
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("working_dir", &self.working_dir)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A freshly spawned child with line readers over its output.
pub struct LaunchedProcess {
    pub child: Child,
    pub pid: u32,
    pub stdout: Lines<BufReader<ChildStdout>>,
    pub stderr: Lines<BufReader<ChildStderr>>,
    /// Where this launch's secret was written, if secrets are enabled
    pub secret_file: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Write a fresh secret, then spawn the child with piped stdout/stderr.
    ///
    /// The child leads its own process group on Unix so a stop reaches
    /// everything it forks.
    pub fn launch(&self, config: &ServerConfig) -> SupervisorResult<LaunchedProcess> {
        let mut spec = CommandSpec::from_config(config)?;

        let secret_file = if config.secret.enabled {
            let dir = config.secret.resolve_dir()?;
            let secret = generate_secret();
            let path = write_secret_file(&dir, &config.secret.file_name, &secret)?;
            debug!("Wrote server secret to {}", path.display());
            spec = spec.with_secret(
                &config.secret.env_var,
                &config.secret.dir_env_var,
                &dir,
                &secret,
            );
            Some(path)
        } else {
            None
        };

        let mut launched = self.spawn(&spec)?;
        launched.secret_file = secret_file;
        Ok(launched)
    }

    /// Spawn `spec` as-is.
    pub fn spawn(&self, spec: &CommandSpec) -> SupervisorResult<LaunchedProcess> {
        let command_text = spec.display();
        info!("Launching server: {command_text}");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let launch_failure = |source: std::io::Error| SupervisorError::LaunchFailure {
            command: command_text.clone(),
            source,
            location: ErrorLocation::from(Location::caller()),
        };

        let mut child = cmd.spawn().map_err(launch_failure)?;

        let pid = child.id().ok_or_else(|| {
            launch_failure(std::io::Error::other("child exited before it had a pid"))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| launch_failure(std::io::Error::other("stdout was not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| launch_failure(std::io::Error::other("stderr was not captured")))?;

        info!("Spawned server with PID: {pid}");

        Ok(LaunchedProcess {
            child,
            pid,
            stdout: BufReader::new(stdout).lines(),
            stderr: BufReader::new(stderr).lines(),
            secret_file: None,
        })
    }
}
