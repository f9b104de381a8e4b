use crate::{
    CONFIG_DIR_ENV, CONFIG_DIR_NAME, CONFIG_FILENAME, ConfigError, ConfigErrorResult,
    LoggingConfig, ServerConfig,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from the config directory.
    ///
    /// Loading order:
    /// 1. Check for SV_CONFIG_DIR env var, else use ./.sv/
    /// 2. Load config.toml if it exists, else use defaults
    /// 3. Apply SV_* environment variable overrides
    ///
    /// Never writes anything. Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        let config_dir = Self::config_dir()?;
        Self::load_from(&config_dir.join(CONFIG_FILENAME))
    }

    /// Load an explicit config file (missing file means defaults), then apply env overrides.
    pub fn load_from(path: &Path) -> ConfigErrorResult<Self> {
        let mut config = if path.exists() {
            Self::load_toml(path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load and parse TOML file with detailed error context.
    fn load_toml(path: &Path) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the config directory.
    /// Priority: SV_CONFIG_DIR env var > ./.sv/ (relative to cwd)
    pub fn config_dir() -> ConfigErrorResult<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(CONFIG_DIR_NAME))
    }

    /// Validate all configuration.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.server.validate()?;

        let log_dir = Path::new(&self.logging.dir);
        if log_dir.is_absolute() || self.logging.dir.contains("..") {
            return Err(ConfigError::logging(
                "logging.dir must be relative and cannot contain '..'",
            ));
        }

        if self.logging.file_prefix.trim().is_empty() {
            return Err(ConfigError::logging("logging.file_prefix must not be empty"));
        }

        Ok(())
    }

    /// Absolute path of the log directory.
    pub fn log_dir(&self) -> ConfigErrorResult<PathBuf> {
        Ok(Self::config_dir()?.join(&self.logging.dir))
    }

    /// Human readable summary. Environment override values are never included.
    pub fn summary_lines(&self) -> Vec<String> {
        let server = &self.server;
        let env_keys: Vec<&str> = server.env.keys().map(String::as_str).collect();

        vec![
            format!("  server: {} (listening on {})", server.command, server.web_url()),
            format!(
                "  working_dir: {}",
                server
                    .working_dir
                    .as_ref()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|| String::from("<inherited>"))
            ),
            format!("  env overrides: {env_keys:?}"),
            format!(
                "  reap pattern: {}",
                server.process_name.as_deref().unwrap_or("<port owner only>")
            ),
            format!(
                "  startup: marker={:?}, health={}, timeout={}, poll={}",
                server.startup.marker,
                server.startup.health_path,
                humantime::format_duration(server.startup.timeout()),
                humantime::format_duration(server.startup.health_interval())
            ),
            format!(
                "  ports: retries={}, backoff={}, extra={:?}",
                server.ports.max_retries,
                humantime::format_duration(server.ports.backoff()),
                server.ports.extra_ports
            ),
            format!(
                "  shutdown: grace={}, reap_grace={}",
                humantime::format_duration(server.shutdown.grace()),
                humantime::format_duration(server.shutdown.reap_grace())
            ),
            format!(
                "  secret: {} (env {})",
                if server.secret.enabled {
                    "generated per launch"
                } else {
                    "disabled"
                },
                server.secret.env_var
            ),
            format!(
                "  logging: {} (dir {}, colored: {})",
                self.logging.level, self.logging.dir, self.logging.colored
            ),
        ]
    }

    /// Log configuration summary (NEVER logs secrets).
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        for line in self.summary_lines() {
            info!("{line}");
        }
    }

    fn apply_env_overrides(&mut self) {
        // Server
        Self::apply_env_string("SV_SERVER_HOST", &mut self.server.host);
        Self::apply_env_parse("SV_SERVER_PORT", &mut self.server.port);
        Self::apply_env_string("SV_SERVER_COMMAND", &mut self.server.command);
        Self::apply_env_bool("SV_SERVER_SHELL", &mut self.server.shell);
        if let Ok(dir) = std::env::var("SV_SERVER_WORKING_DIR") {
            self.server.working_dir = Some(PathBuf::from(dir));
        }
        Self::apply_env_option_string("SV_SERVER_PROCESS_NAME", &mut self.server.process_name);

        // Startup
        Self::apply_env_string("SV_STARTUP_HEALTH_PATH", &mut self.server.startup.health_path);
        Self::apply_env_string("SV_STARTUP_MARKER", &mut self.server.startup.marker);
        Self::apply_env_duration_ms("SV_STARTUP_TIMEOUT", &mut self.server.startup.timeout_ms);
        Self::apply_env_duration_ms(
            "SV_STARTUP_HEALTH_INTERVAL",
            &mut self.server.startup.health_interval_ms,
        );

        // Ports
        Self::apply_env_parse("SV_PORT_MAX_RETRIES", &mut self.server.ports.max_retries);
        Self::apply_env_duration_ms("SV_PORT_BACKOFF", &mut self.server.ports.backoff_ms);

        // Shutdown
        Self::apply_env_duration_ms("SV_SHUTDOWN_GRACE", &mut self.server.shutdown.grace_ms);

        // Secret
        Self::apply_env_bool("SV_SECRET_ENABLED", &mut self.server.secret.enabled);
        if let Ok(dir) = std::env::var("SV_SECRET_DIR") {
            self.server.secret.dir = Some(PathBuf::from(dir));
        }

        // Logging
        Self::apply_env_parse("SV_LOG_LEVEL", &mut self.logging.level);
        Self::apply_env_string("SV_LOG_DIR", &mut self.logging.dir);
        Self::apply_env_bool("SV_LOG_COLORED", &mut self.logging.colored);
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for bool values (accepts "true"/"1")
    fn apply_env_bool(var_name: &str, target: &mut bool) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val == "true" || val == "1";
        }
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(val) = std::env::var(var_name) {
            match val.parse() {
                Ok(parsed) => *target = parsed,
                Err(_) => warn!("Ignoring {var_name}={val:?}: cannot parse value"),
            }
        }
    }

    /// Helper: Apply environment variable override for durations.
    /// Accepts humantime strings ("30s", "250ms") or bare milliseconds.
    fn apply_env_duration_ms(var_name: &str, target: &mut u64) {
        if let Ok(val) = std::env::var(var_name) {
            match parse_duration_ms(&val) {
                Some(ms) => *target = ms,
                None => warn!("Ignoring {var_name}={val:?}: not a duration"),
            }
        }
    }

    /// Helper: Apply environment variable override for Option<String> values
    fn apply_env_option_string(var_name: &str, target: &mut Option<String>) {
        if let Ok(val) = std::env::var(var_name) {
            *target = if val.is_empty() { None } else { Some(val) };
        }
    }
}

/// Parse "250ms" / "30s" / "1m 30s" or a bare millisecond count.
pub(crate) fn parse_duration_ms(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(ms) = value.parse::<u64>() {
        return Some(ms);
    }

    humantime::parse_duration(value)
        .ok()
        .map(|duration: Duration| duration.as_millis().min(u128::from(u64::MAX)) as u64)
}
