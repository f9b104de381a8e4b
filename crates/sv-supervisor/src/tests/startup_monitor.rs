use crate::{HealthProbe, OutputLine, StartupMonitor, StartupOutcome};

use std::time::Duration;

use googletest::prelude::*;
use tokio::sync::{mpsc, watch};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MARKER: &str = "Application startup complete";

async fn health_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn monitor(server: &MockServer, interval: Duration, timeout: Duration) -> StartupMonitor {
    let probe = HealthProbe::new(format!("{}/health", server.uri()), interval).unwrap();
    StartupMonitor::new(MARKER, probe, interval, timeout)
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn given_marker_line_when_monitoring_then_marker_seen_and_no_health_requests() {
    // Given
    let server = health_server(200).await;
    let monitor = monitor(&server, Duration::from_millis(200), Duration::from_secs(5));
    let (line_tx, mut lines) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel) = watch::channel(false);
    line_tx.send(OutputLine::stdout("Loading models")).unwrap();
    line_tx
        .send(OutputLine::stdout(format!("INFO:     {MARKER}.")))
        .unwrap();

    // When
    let outcome = monitor.run(&mut lines, cancel).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Then
    assert_that!(outcome, eq(StartupOutcome::MarkerSeen));
    assert_that!(request_count(&server).await, eq(0));
}

#[tokio::test]
async fn given_healthy_endpoint_when_monitoring_then_health_ready_and_polling_stops() {
    // Given
    let server = health_server(200).await;
    let monitor = monitor(&server, Duration::from_millis(50), Duration::from_secs(5));
    let (_line_tx, mut lines) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel) = watch::channel(false);

    // When
    let outcome = monitor.run(&mut lines, cancel).await;
    let after_ready = request_count(&server).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Then
    assert_that!(outcome, eq(StartupOutcome::HealthReady));
    assert_that!(after_ready, eq(1));
    assert_that!(request_count(&server).await, eq(after_ready));
}

#[tokio::test]
async fn given_unhealthy_endpoint_and_no_marker_when_monitoring_then_times_out() {
    // Given
    let server = health_server(503).await;
    let monitor = monitor(&server, Duration::from_millis(20), Duration::from_millis(100));
    let (_line_tx, mut lines) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel) = watch::channel(false);
    let started = std::time::Instant::now();

    // When
    let outcome = monitor.run(&mut lines, cancel).await;

    // Then
    assert_that!(outcome, eq(StartupOutcome::TimedOut));
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn given_cancel_signal_when_monitoring_then_cancelled() {
    // Given
    let server = health_server(503).await;
    let monitor = monitor(&server, Duration::from_millis(50), Duration::from_secs(5));
    let (_line_tx, mut lines) = mpsc::unbounded_channel();
    let (cancel_tx, cancel) = watch::channel(false);

    // When
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_tx.send_replace(true);
        cancel_tx
    });
    let outcome = monitor.run(&mut lines, cancel).await;
    let _cancel_tx = canceller.await.unwrap();

    // Then
    assert_that!(outcome, eq(StartupOutcome::Cancelled));
}

#[tokio::test]
async fn given_closed_output_when_monitoring_then_health_still_decides() {
    // Given
    let server = health_server(200).await;
    let monitor = monitor(&server, Duration::from_millis(50), Duration::from_secs(5));
    let (line_tx, mut lines) = mpsc::unbounded_channel::<OutputLine>();
    let (_cancel_tx, cancel) = watch::channel(false);
    drop(line_tx);

    // When
    let outcome = monitor.run(&mut lines, cancel).await;

    // Then
    assert_that!(outcome, eq(StartupOutcome::HealthReady));
}

#[tokio::test]
async fn given_slow_health_request_in_flight_when_marker_arrives_then_marker_wins_immediately() {
    // Given
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let probe = HealthProbe::new(format!("{}/health", server.uri()), Duration::from_secs(5)).unwrap();
    let monitor = StartupMonitor::new(
        MARKER,
        probe,
        Duration::from_millis(50),
        Duration::from_secs(10),
    );
    let (line_tx, mut lines) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel) = watch::channel(false);
    let started = std::time::Instant::now();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = line_tx.send(OutputLine::stdout(MARKER));
    });

    // When
    let outcome = monitor.run(&mut lines, cancel).await;

    // Then
    assert_that!(outcome, eq(StartupOutcome::MarkerSeen));
    assert!(started.elapsed() < Duration::from_secs(2));
}
