use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_COMMAND, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_PROCESS_NAME, MIN_PORT, PortConfig, SecretConfig, ShutdownConfig, StartupConfig,
};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const LOOPBACK_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "::1"];
const HOST_PLACEHOLDER: &str = "{host}";
const PORT_PLACEHOLDER: &str = "{port}";

/// Everything the supervisor needs to launch and watch one server process.
///
/// Immutable for the duration of a start cycle; the supervisor clones it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host the child is told to bind, also used for health requests
    pub host: String,
    pub port: u16,
    /// Executable path or whitespace separated command line.
    /// `{host}` and `{port}` are substituted before launch.
    pub command: String,
    /// Extra arguments appended after the command line
    pub args: Vec<String>,
    /// Run the command line through the platform shell
    pub shell: bool,
    pub working_dir: Option<PathBuf>,
    /// Environment overrides merged over the inherited environment
    pub env: BTreeMap<String, String>,
    /// Command line pattern used to reap stray instances. `None` disables
    /// name based reaping and only the port owner is targeted.
    pub process_name: Option<String>,
    pub startup: StartupConfig,
    pub ports: PortConfig,
    pub shutdown: ShutdownConfig,
    pub secret: SecretConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_HOST),
            port: DEFAULT_PORT,
            command: String::from(DEFAULT_COMMAND),
            args: Vec::new(),
            shell: false,
            working_dir: None,
            env: BTreeMap::new(),
            process_name: Some(String::from(DEFAULT_PROCESS_NAME)),
            startup: StartupConfig::default(),
            ports: PortConfig::default(),
            shutdown: ShutdownConfig::default(),
            secret: SecretConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Base URL a host view should open once the server is running.
    pub fn web_url(&self) -> String {
        format!("http://{}:{}", self.url_host(), self.port)
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> String {
        format!("{}{}", self.web_url(), self.startup.health_path)
    }

    /// Command line tokens with `{host}`/`{port}` substituted, followed by `args`.
    pub fn command_line(&self) -> Vec<String> {
        self.command
            .split_whitespace()
            .map(str::to_string)
            .chain(self.args.iter().cloned())
            .map(|token| self.substitute(&token))
            .collect()
    }

    /// Command text handed to the platform shell when `shell` is set.
    ///
    /// Unlike `command_line` the command is kept verbatim so quoting survives.
    pub fn shell_line(&self) -> String {
        let mut line = self.substitute(self.command.trim());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&self.substitute(arg));
        }
        line
    }

    /// Ports that must be free before launch, listen port first.
    pub fn ports_to_clear(&self) -> Vec<u16> {
        let mut ports = vec![self.port];
        for port in &self.ports.extra_ports {
            if !ports.contains(port) {
                ports.push(*port);
            }
        }
        ports
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.port < MIN_PORT {
            return Err(ConfigError::server(format!(
                "port must be >= {MIN_PORT} (unprivileged)"
            )));
        }

        if !LOOPBACK_HOSTS.contains(&self.host.as_str()) {
            return Err(ConfigError::server(format!(
                "host must be one of {LOOPBACK_HOSTS:?}, got {:?}",
                self.host
            )));
        }

        if self.command.trim().is_empty() {
            return Err(ConfigError::server("command must not be empty"));
        }

        if let Some(dir) = &self.working_dir
            && !dir.is_dir()
        {
            return Err(ConfigError::server(format!(
                "working_dir {} is not a directory",
                dir.display()
            )));
        }

        if let Some(pattern) = &self.process_name
            && pattern.trim().len() < 3
        {
            return Err(ConfigError::server(
                "process_name must be at least 3 characters to avoid reaping unrelated processes",
            ));
        }

        for key in self.env.keys() {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(ConfigError::server(format!(
                    "invalid environment variable name {key:?}"
                )));
            }
        }

        self.startup.validate()?;
        self.ports.validate(self.port)?;
        self.shutdown.validate()?;
        self.secret.validate()?;

        Ok(())
    }

    fn url_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    fn substitute(&self, token: &str) -> String {
        token
            .replace(HOST_PLACEHOLDER, &self.host)
            .replace(PORT_PLACEHOLDER, &self.port.to_string())
    }
}
