mod config;
mod error;
mod log_level;
mod logging_config;
mod port_config;
mod secret_config;
mod server_config;
mod shutdown_config;
mod startup_config;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{ConfigError, ConfigErrorResult};
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use port_config::PortConfig;
pub use secret_config::SecretConfig;
pub use server_config::ServerConfig;
pub use shutdown_config::ShutdownConfig;
pub use startup_config::StartupConfig;

pub const CONFIG_DIR_ENV: &str = "SV_CONFIG_DIR";
pub const CONFIG_DIR_NAME: &str = ".sv";
pub const CONFIG_FILENAME: &str = "config.toml";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_COMMAND: &str = "open-webui serve --host {host} --port {port}";
const DEFAULT_PROCESS_NAME: &str = "open-webui serve";
const MIN_PORT: u16 = 1024;

const DEFAULT_HEALTH_PATH: &str = "/health";
const DEFAULT_STARTUP_MARKER: &str = "Application startup complete";
const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_HEALTH_INTERVAL_MS: u64 = 1_000;
const DEFAULT_OUTPUT_TAIL_LINES: usize = 50;
const MAX_OUTPUT_TAIL_LINES: usize = 10_000;

const DEFAULT_PORT_MAX_RETRIES: u32 = 3;
const DEFAULT_PORT_BACKOFF_MS: u64 = 2_000;

const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;
const DEFAULT_REAP_GRACE_MS: u64 = 2_000;

const DEFAULT_SECRET_DIR_NAME: &str = "open-webui";
const DEFAULT_SECRET_FILENAME: &str = ".webui_secret_key";
const DEFAULT_SECRET_ENV_VAR: &str = "WEBUI_SECRET_KEY";
const DEFAULT_SECRET_DIR_ENV_VAR: &str = "WEBUI_CONFIG_DIR";

const DEFAULT_LOG_LEVEL_STRING: &str = "info";
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
const DEFAULT_LOG_DIRECTORY: &str = "logs";
const DEFAULT_LOG_FILE_PREFIX: &str = "svctl";
