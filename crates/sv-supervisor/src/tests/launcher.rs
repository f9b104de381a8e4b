use super::mock_config;
use crate::{CommandSpec, FailureKind, ProcessLauncher, generate_secret};

use std::path::Path;

use googletest::prelude::*;
use sv_config::ServerConfig;
use tempfile::TempDir;

#[test]
fn given_plain_command_when_building_spec_then_first_token_is_program() {
    let config = ServerConfig {
        command: "open-webui serve --port {port}".into(),
        port: 8123,
        ..ServerConfig::default()
    };

    let spec = CommandSpec::from_config(&config).unwrap();

    assert_that!(spec.program.as_str(), eq("open-webui"));
    assert_eq!(spec.args, vec!["serve", "--port", "8123"]);
}

#[cfg(unix)]
#[test]
fn given_shell_mode_when_building_spec_then_runs_through_sh() {
    let temp = TempDir::new().unwrap();
    let config = mock_config(&temp, "echo 'ready on {port}'");

    let spec = CommandSpec::from_config(&config).unwrap();

    assert_that!(spec.program.as_str(), eq("sh"));
    assert_eq!(spec.args, vec!["-c", "echo 'ready on 8123'"]);
}

#[test]
fn given_blank_command_when_building_spec_then_launch_failure() {
    let config = ServerConfig {
        command: "   ".into(),
        ..ServerConfig::default()
    };

    let error = CommandSpec::from_config(&config).unwrap_err();

    assert_that!(error.kind(), some(eq(FailureKind::LaunchFailure)));
}

#[test]
fn given_secret_when_added_to_spec_then_only_in_environment() {
    // Given
    let secret = generate_secret();
    let spec = CommandSpec::from_config(&ServerConfig::default()).unwrap();

    // When
    let spec = spec.with_secret(
        "WEBUI_SECRET_KEY",
        "WEBUI_CONFIG_DIR",
        Path::new("/tmp/open-webui"),
        &secret,
    );

    // Then
    assert_eq!(
        spec.env.get("WEBUI_SECRET_KEY").map(String::as_str),
        Some(secret.expose())
    );
    assert_eq!(
        spec.env.get("WEBUI_CONFIG_DIR").map(String::as_str),
        Some("/tmp/open-webui")
    );
    assert!(!spec.display().contains(secret.expose()));
    assert!(!format!("{spec:?}").contains(secret.expose()));
}

#[cfg(unix)]
#[tokio::test]
async fn given_secret_enabled_when_launched_then_child_sees_secret_from_file() {
    // Given
    let temp = TempDir::new().unwrap();
    let config = mock_config(&temp, "echo \"$WEBUI_SECRET_KEY\"; echo \"$WEBUI_CONFIG_DIR\"");

    // When
    let mut launched = ProcessLauncher::new().launch(&config).unwrap();
    let key_line = launched.stdout.next_line().await.unwrap().unwrap();
    let dir_line = launched.stdout.next_line().await.unwrap().unwrap();
    launched.child.wait().await.unwrap();

    // Then
    let secret_file = launched.secret_file.expect("secret file written");
    assert_eq!(std::fs::read_to_string(secret_file).unwrap(), key_line);
    assert_eq!(dir_line, temp.path().to_string_lossy());
}

#[cfg(unix)]
#[tokio::test]
async fn given_env_override_when_launched_then_child_sees_it() {
    let temp = TempDir::new().unwrap();
    let mut config = mock_config(&temp, "echo \"$SV_TEST_GREETING\"");
    config
        .env
        .insert("SV_TEST_GREETING".into(), "hello from config".into());

    let mut launched = ProcessLauncher::new().launch(&config).unwrap();
    let line = launched.stdout.next_line().await.unwrap().unwrap();
    launched.child.wait().await.unwrap();

    assert_that!(line.as_str(), eq("hello from config"));
}

#[tokio::test]
async fn given_missing_binary_when_launched_then_launch_failure() {
    let temp = TempDir::new().unwrap();
    let config = ServerConfig {
        shell: false,
        command: "/nonexistent/sv-test-binary".into(),
        ..mock_config(&temp, "")
    };

    let error = ProcessLauncher::new().launch(&config).err().unwrap();

    assert_that!(error.kind(), some(eq(FailureKind::LaunchFailure)));
}
