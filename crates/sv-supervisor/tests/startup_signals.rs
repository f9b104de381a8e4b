#![cfg(unix)]

mod common;

use common::{
    FreePortProber, MARKER, RecordingListener, RecordingReaper, count_launch, eventually,
    launch_count, mock_server_config,
};

use std::sync::Arc;
use std::time::Duration;

use googletest::prelude::*;
use sv_config::ServerConfig;
use sv_supervisor::{ServerSupervisor, SupervisorState};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn supervisor(config: ServerConfig, listener: Arc<RecordingListener>) -> ServerSupervisor {
    ServerSupervisor::builder(config)
        .prober(Arc::new(FreePortProber::default()))
        .reaper(Arc::new(RecordingReaper::default()))
        .status_listener(listener)
        .build()
        .unwrap()
}

async fn health_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn given_healthy_endpoint_and_no_marker_when_started_then_running_and_polling_stops() {
    // Given
    let server = health_server().await;
    let temp = TempDir::new().unwrap();
    let mut config = mock_server_config(&temp, server.address().port(), "exec sleep 30");
    config.startup.health_interval_ms = 50;
    let supervisor = supervisor(config, Arc::new(RecordingListener::default()));

    // When
    supervisor.start().await.unwrap();
    supervisor.wait_for_startup().await.unwrap();
    let after_ready = request_count(&server).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Then
    assert!(supervisor.is_running());
    assert_that!(after_ready, eq(1));
    assert_that!(request_count(&server).await, eq(after_ready));

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn given_marker_before_first_poll_when_started_then_no_health_requests() {
    // Given
    let server = health_server().await;
    let temp = TempDir::new().unwrap();
    let script = format!("echo '{MARKER}'; exec sleep 30");
    let mut config = mock_server_config(&temp, server.address().port(), &script);
    config.startup.health_interval_ms = 1_000;
    let supervisor = supervisor(config, Arc::new(RecordingListener::default()));

    // When
    supervisor.start().await.unwrap();
    supervisor.wait_for_startup().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    // Then
    assert!(supervisor.is_running());
    assert_that!(request_count(&server).await, eq(0));

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn given_port_conflict_in_output_when_starting_then_restarted_exactly_once() {
    // Given
    let temp = TempDir::new().unwrap();
    let launches = temp.path().join("launches");
    let script = format!(
        "{}; echo 'ERROR: [Errno 98] error while attempting to bind: address already in use' >&2; exec sleep 30",
        count_launch(&launches)
    );
    let listener = Arc::new(RecordingListener::default());
    let supervisor = supervisor(mock_server_config(&temp, 8123, &script), listener.clone());

    // When
    supervisor.start().await.unwrap();

    // Then
    assert!(eventually(Duration::from_secs(5), || launch_count(&launches) == 2).await);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_that!(launch_count(&launches), eq(2));
    assert_eq!(
        listener.states(),
        vec![
            SupervisorState::Starting,
            SupervisorState::Stopping,
            SupervisorState::Stopped,
            SupervisorState::Starting,
        ]
    );

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.status(), SupervisorState::Stopped);
}

#[tokio::test]
async fn given_port_conflict_restart_when_caller_starts_new_cycle_then_bound_resets() {
    // Given
    let temp = TempDir::new().unwrap();
    let launches = temp.path().join("launches");
    let script = format!(
        "{}; echo 'address already in use' >&2; exec sleep 30",
        count_launch(&launches)
    );
    let supervisor = supervisor(
        mock_server_config(&temp, 8123, &script),
        Arc::new(RecordingListener::default()),
    );
    supervisor.start().await.unwrap();
    assert!(eventually(Duration::from_secs(5), || launch_count(&launches) == 2).await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    supervisor.stop().await.unwrap();

    // When
    supervisor.start().await.unwrap();

    // Then
    assert!(eventually(Duration::from_secs(5), || launch_count(&launches) == 4).await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_that!(launch_count(&launches), eq(4));

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn given_port_conflict_while_running_when_restarted_then_running_again_and_never_down() {
    // Given
    let temp = TempDir::new().unwrap();
    let launches = temp.path().join("launches");
    let conflicted = temp.path().join("conflicted");
    let script = format!(
        "{}; echo '{MARKER}'; if [ ! -f '{flag}' ]; then touch '{flag}'; sleep 0.5; \
         echo 'address already in use' >&2; fi; exec sleep 30",
        count_launch(&launches),
        flag = conflicted.display()
    );
    let listener = Arc::new(RecordingListener::default());
    let supervisor = supervisor(mock_server_config(&temp, 8123, &script), listener.clone());
    supervisor.start().await.unwrap();
    supervisor.wait_for_startup().await.unwrap();

    // When
    let down = tokio::time::timeout(Duration::from_secs(3), supervisor.wait_until_down()).await;

    // Then
    assert!(down.is_err(), "restart was reported as a final stop: {down:?}");
    assert_that!(launch_count(&launches), eq(2));
    assert!(eventually(Duration::from_secs(2), || supervisor.is_running()).await);
    assert!(!supervisor.is_restarting());
    assert_eq!(
        listener.states(),
        vec![
            SupervisorState::Starting,
            SupervisorState::Running,
            SupervisorState::Stopping,
            SupervisorState::Stopped,
            SupervisorState::Starting,
            SupervisorState::Running,
        ]
    );

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.wait_until_down().await, SupervisorState::Stopped);
}
