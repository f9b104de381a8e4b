use crate::error::CliError;
use crate::{load_config, resolve_config_dir};

use std::path::PathBuf;

use googletest::prelude::*;
use tempfile::TempDir;

#[test]
fn given_explicit_dir_when_resolving_then_used_verbatim() {
    let dir = resolve_config_dir(Some(PathBuf::from("/srv/sv"))).unwrap();

    assert_eq!(dir, PathBuf::from("/srv/sv"));
}

#[test]
fn given_config_file_when_loading_then_values_applied() {
    // Given
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("config.toml"),
        "[server]\nport = 8123\nprocess_name = \"mock-serve\"\n",
    )
    .unwrap();

    // When
    let config = load_config(temp.path()).unwrap();

    // Then
    assert_that!(config.server.port, eq(8123));
    assert_eq!(config.server.process_name.as_deref(), Some("mock-serve"));
}

#[test]
fn given_invalid_config_when_loading_then_config_error_with_hint() {
    // Given
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "[server]\nport = 80\n").unwrap();

    // When
    let error = load_config(temp.path()).unwrap_err();

    // Then
    assert!(matches!(error, CliError::Config { .. }));
    assert!(error.hint().is_some());
}
