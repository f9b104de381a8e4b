use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_SECRET_DIR_ENV_VAR, DEFAULT_SECRET_DIR_NAME,
    DEFAULT_SECRET_ENV_VAR, DEFAULT_SECRET_FILENAME,
};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Secret material generated for every launch.
///
/// The token is written to `<dir>/<file_name>` and handed to the child through
/// `env_var`; `dir_env_var` tells the child where its config directory lives.
/// Nothing here ever ends up on the child's command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretConfig {
    pub enabled: bool,
    /// Config directory of the child. Defaults to `<platform config dir>/open-webui`.
    pub dir: Option<PathBuf>,
    pub file_name: String,
    pub env_var: String,
    pub dir_env_var: String,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            file_name: String::from(DEFAULT_SECRET_FILENAME),
            env_var: String::from(DEFAULT_SECRET_ENV_VAR),
            dir_env_var: String::from(DEFAULT_SECRET_DIR_ENV_VAR),
        }
    }
}

impl SecretConfig {
    /// Resolve the directory the secret file is written to.
    pub fn resolve_dir(&self) -> ConfigErrorResult<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }

        dirs::config_dir()
            .map(|base| base.join(DEFAULT_SECRET_DIR_NAME))
            .ok_or_else(|| ConfigError::secret("Cannot determine platform config directory"))
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let file = std::path::Path::new(&self.file_name);
        if self.file_name.is_empty()
            || file.components().count() != 1
            || self.file_name.contains("..")
        {
            return Err(ConfigError::secret(
                "file_name must be a bare file name without directories",
            ));
        }

        for var in [&self.env_var, &self.dir_env_var] {
            if var.is_empty() || var.contains('=') || var.contains('\0') {
                return Err(ConfigError::secret(format!(
                    "invalid environment variable name {var:?}"
                )));
            }
        }

        Ok(())
    }
}
