//! Per-launch secret token.

use crate::{SupervisorError, SupervisorResult};

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use error_location::ErrorLocation;
use rand::RngCore;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const SECRET_BYTES: usize = 32;
#[cfg(unix)]
const SECRET_FILE_MODE: u32 = 0o600; // Owner read/write only

/// Secret token handed to the child through its environment.
///
/// `Debug` and `Display` are redacted so the value never reaches a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// 32 bytes from the OS-seeded CSPRNG, URL-safe base64 without padding.
pub fn generate_secret() -> Secret {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    Secret(URL_SAFE_NO_PAD.encode(bytes))
}

/// Write the secret to `<dir>/<file_name>`, replacing any previous one.
///
/// Written to a temp file first and renamed, so the child never reads a
/// half-written key.
pub fn write_secret_file(dir: &Path, file_name: &str, secret: &Secret) -> SupervisorResult<PathBuf> {
    let path = dir.join(file_name);
    let map_err = |source: std::io::Error| SupervisorError::SecretWrite {
        path: path.clone(),
        source,
        location: ErrorLocation::from(Location::caller()),
    };

    std::fs::create_dir_all(dir).map_err(map_err)?;

    let temp_path = dir.join(format!("{file_name}.tmp"));
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(SECRET_FILE_MODE);

    let mut file = options.open(&temp_path).map_err(map_err)?;
    file.write_all(secret.expose().as_bytes()).map_err(map_err)?;
    file.sync_all().map_err(map_err)?;
    drop(file);

    std::fs::rename(&temp_path, &path).map_err(map_err)?;

    Ok(path)
}
