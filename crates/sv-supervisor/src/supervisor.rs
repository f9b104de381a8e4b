//! Server process lifecycle: free the port, launch, watch startup, tear down.

use crate::{
    ExitInfo, FailureKind, FailureReason, LogSink, OutputLine, OutputStream, OutputTail,
    PortAllocator, PortProber, ProcessHandle, ProcessLauncher, ProcessReaper, ReapMatchers,
    StartupMonitor, StartupOutcome, StatusListener, SupervisorError, SupervisorResult,
    SupervisorState, SystemProcessReaper, TcpPortProber, TracingLogSink, signal,
};

use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use error_location::ErrorLocation;
use sv_config::ServerConfig;
use tokio::io::{AsyncRead, BufReader, Lines};
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};

/// Supervises one server process.
///
/// Responsibilities:
/// - Free the listen port before launch
/// - Launch the server with fresh secret material
/// - Decide when startup finished (log marker or health endpoint)
/// - Restart once when the server reports a port conflict
/// - Graceful shutdown with forced fallback and a reap pass
///
/// Cloning is cheap; every clone drives the same process.
#[derive(Clone)]
pub struct ServerSupervisor {
    shared: Arc<Shared>,
}

struct Shared {
    config: ServerConfig,
    prober: Arc<dyn PortProber>,
    reaper: Arc<dyn ProcessReaper>,
    launcher: ProcessLauncher,
    log_sink: Arc<dyn LogSink>,
    listeners: Vec<Arc<dyn StatusListener>>,
    state_tx: watch::Sender<SupervisorState>,
    /// Serializes start and stop
    op_lock: Mutex<()>,
    process: Mutex<Option<ProcessHandle>>,
    monitor: StdMutex<Option<MonitorTask>>,
    /// Bumped on every launch; background results from older launches are ignored
    generation: AtomicU64,
    conflict_restart_used: AtomicBool,
    restarting: AtomicBool,
    tail: OutputTail,
}

/// How long an exit report waits for the last output lines
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

struct MonitorTask {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Configures a [`ServerSupervisor`]; unset collaborators get the OS defaults.
pub struct SupervisorBuilder {
    config: ServerConfig,
    prober: Option<Arc<dyn PortProber>>,
    reaper: Option<Arc<dyn ProcessReaper>>,
    log_sink: Option<Arc<dyn LogSink>>,
    listeners: Vec<Arc<dyn StatusListener>>,
}

impl SupervisorBuilder {
    pub fn prober(mut self, prober: Arc<dyn PortProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn reaper(mut self, reaper: Arc<dyn ProcessReaper>) -> Self {
        self.reaper = Some(reaper);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn status_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate the configuration and build the supervisor in `Stopped`.
    pub fn build(self) -> SupervisorResult<ServerSupervisor> {
        self.config.validate()?;

        let reap_grace = self.config.shutdown.reap_grace();
        let tail = OutputTail::new(self.config.startup.output_tail_lines);
        let (state_tx, _) = watch::channel(SupervisorState::Stopped);

        let shared = Shared {
            prober: self.prober.unwrap_or_else(|| Arc::new(TcpPortProber)),
            reaper: self
                .reaper
                .unwrap_or_else(|| Arc::new(SystemProcessReaper::new(reap_grace))),
            launcher: ProcessLauncher::new(),
            log_sink: self.log_sink.unwrap_or_else(|| Arc::new(TracingLogSink)),
            listeners: self.listeners,
            state_tx,
            op_lock: Mutex::new(()),
            process: Mutex::new(None),
            monitor: StdMutex::new(None),
            generation: AtomicU64::new(0),
            conflict_restart_used: AtomicBool::new(false),
            restarting: AtomicBool::new(false),
            tail,
            config: self.config,
        };

        Ok(ServerSupervisor {
            shared: Arc::new(shared),
        })
    }
}

impl ServerSupervisor {
    pub fn builder(config: ServerConfig) -> SupervisorBuilder {
        SupervisorBuilder {
            config,
            prober: None,
            reaper: None,
            log_sink: None,
            listeners: Vec::new(),
        }
    }

    /// Supervisor with the OS prober/reaper and the tracing log sink.
    pub fn new(config: ServerConfig) -> SupervisorResult<Self> {
        Self::builder(config).build()
    }

    /// Free the port and launch the server.
    ///
    /// Returns once the child is spawned, normally in `Starting`; readiness is
    /// decided in the background (see [`wait_for_startup`](Self::wait_for_startup)).
    /// Calling this while `Starting`/`Running`/`Stopping` does nothing and
    /// returns the current state.
    pub async fn start(&self) -> SupervisorResult<SupervisorState> {
        let _guard = self.shared.op_lock.lock().await;
        Shared::start_locked(&self.shared, true).await
    }

    /// Terminate the server and clean up after it. Always ends in `Stopped`.
    pub async fn stop(&self) -> SupervisorResult<()> {
        let _guard = self.shared.op_lock.lock().await;
        self.shared.stop_locked().await;
        Ok(())
    }

    pub fn status(&self) -> SupervisorState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.shared.state(), SupervisorState::Running)
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the current start cycle ends.
    ///
    /// `Ok` once `Running`; the failure reason as an error on `Failed`;
    /// `StartupInterrupted` if the supervisor is stopped first. A port
    /// conflict restart is waited through.
    pub async fn wait_for_startup(&self) -> SupervisorResult<()> {
        let mut rx = self.shared.state_tx.subscribe();

        loop {
            let state = rx.borrow_and_update().clone();
            let restarting = self.shared.restarting.load(Ordering::SeqCst);
            match state {
                SupervisorState::Running => return Ok(()),
                _ if restarting => {}
                SupervisorState::Failed { reason } => {
                    return Err(SupervisorError::startup_failed(reason));
                }
                SupervisorState::Stopped | SupervisorState::Stopping => {
                    return Err(SupervisorError::StartupInterrupted {
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                SupervisorState::Starting => {}
            }

            if rx.changed().await.is_err() {
                return Err(SupervisorError::StartupInterrupted {
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }

    /// Whether a port-conflict restart is in flight.
    pub fn is_restarting(&self) -> bool {
        self.shared.restarting.load(Ordering::SeqCst)
    }

    /// Wait until the server is down for good: `Stopped` or `Failed` with no
    /// port-conflict restart in flight. Returns that state.
    pub async fn wait_until_down(&self) -> SupervisorState {
        let mut rx = self.shared.state_tx.subscribe();

        loop {
            let state = rx.borrow_and_update().clone();
            let down = matches!(
                state,
                SupervisorState::Stopped | SupervisorState::Failed { .. }
            );
            if down && !self.is_restarting() {
                return state;
            }

            if rx.changed().await.is_err() {
                return self.shared.state();
            }
        }
    }

    /// PID of the live child, if any.
    pub async fn pid(&self) -> Option<u32> {
        self.shared.process.lock().await.as_ref().map(ProcessHandle::pid)
    }

    pub async fn has_process(&self) -> bool {
        self.shared.process.lock().await.is_some()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    /// URL the host view should open once `Running`.
    pub fn web_url(&self) -> String {
        self.shared.config.web_url()
    }

    /// Most recent output lines of the child.
    pub fn output_tail(&self) -> Vec<String> {
        self.shared.tail.snapshot()
    }
}

impl Shared {
    fn state(&self) -> SupervisorState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, state: SupervisorState, message: &str) {
        self.state_tx.send_replace(state.clone());
        self.notify(&state, message);
    }

    /// Compare-and-set for background results: applies only while the launch
    /// that produced them is still current and `from` accepts the state.
    fn transition_if_current(
        &self,
        generation: u64,
        from: impl FnOnce(&SupervisorState) -> bool,
        next: SupervisorState,
        message: &str,
    ) -> bool {
        let applied = self.state_tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) == generation && from(&*state) {
                *state = next.clone();
                true
            } else {
                false
            }
        });

        if applied {
            self.notify(&next, message);
        }
        applied
    }

    fn notify(&self, state: &SupervisorState, message: &str) {
        info!("Server {state}: {message}");
        for listener in &self.listeners {
            listener.on_status(state, message);
        }
    }

    /// Caller holds `op_lock`.
    async fn start_locked(
        shared: &Arc<Self>,
        caller_initiated: bool,
    ) -> SupervisorResult<SupervisorState> {
        let current = shared.state();
        if !current.can_start() {
            debug!("Start ignored, server is {current}");
            return Ok(current);
        }

        if caller_initiated {
            shared.conflict_restart_used.store(false, Ordering::SeqCst);
        }

        // A timed-out launch keeps its process; never run two
        if shared.process.lock().await.is_some() {
            info!("Stopping the previous server process before starting again");
            shared.stop_locked().await;
        }

        let config = &shared.config;
        shared.tail.clear();
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        shared.set_state(
            SupervisorState::Starting,
            &format!("Starting server on port {}", config.port),
        );

        let allocator = PortAllocator::new(
            Arc::clone(&shared.prober),
            Arc::clone(&shared.reaper),
            config.ports.backoff(),
        )
        .with_process_name_pattern(config.process_name.clone());

        for port in config.ports_to_clear() {
            if let Err(e) = allocator
                .ensure_port_available(port, config.ports.max_retries)
                .await
            {
                return Err(shared.fail(FailureKind::PortUnavailable, e));
            }
        }

        let monitor = match StartupMonitor::from_config(config) {
            Ok(monitor) => monitor,
            Err(e) => return Err(shared.fail(FailureKind::LaunchFailure, e)),
        };

        let launched = match shared.launcher.launch(config) {
            Ok(launched) => launched,
            Err(e) => return Err(shared.fail(FailureKind::LaunchFailure, e)),
        };

        let pid = launched.pid;
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (exit_tx, exit_rx) = watch::channel(None);
        let (drained_tx, drained_rx) = mpsc::channel::<()>(1);

        {
            // Held until the handle is stored so a fast exit cannot race past it
            let mut slot = shared.process.lock().await;

            let pumps = vec![
                spawn_output_pump(
                    Arc::clone(shared),
                    launched.stdout,
                    OutputStream::Stdout,
                    line_tx.clone(),
                    drained_tx.clone(),
                    generation,
                ),
                spawn_output_pump(
                    Arc::clone(shared),
                    launched.stderr,
                    OutputStream::Stderr,
                    line_tx,
                    drained_tx,
                    generation,
                ),
            ];

            tokio::spawn(watch_exit(
                Arc::clone(shared),
                launched.child,
                drained_rx,
                exit_tx,
                cancel_tx.clone(),
                generation,
            ));

            *slot = Some(ProcessHandle::new(pid, generation, exit_rx, pumps));
        }

        let task = tokio::spawn(run_monitor(
            Arc::clone(shared),
            monitor,
            line_rx,
            cancel_rx,
            generation,
        ));
        *shared.monitor_slot() = Some(MonitorTask {
            cancel: cancel_tx,
            task,
        });

        Ok(shared.state())
    }

    /// Publish `Failed` and return the matching error, so `kind()` and
    /// `excerpt()` agree with the state.
    fn fail(&self, kind: FailureKind, error: SupervisorError) -> SupervisorError {
        let reason = FailureReason::new(kind, error.to_string(), self.config.port)
            .with_excerpt(self.tail.snapshot());
        error!("Server start failed: {error}");
        self.set_state(
            SupervisorState::Failed {
                reason: reason.clone(),
            },
            &reason.message,
        );
        SupervisorError::startup_failed(reason)
    }

    fn monitor_slot(&self) -> std::sync::MutexGuard<'_, Option<MonitorTask>> {
        self.monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Caller holds `op_lock`.
    async fn stop_locked(&self) {
        let current = self.state();
        if current == SupervisorState::Stopped {
            debug!("Stop ignored, server is already stopped");
            return;
        }

        self.set_state(SupervisorState::Stopping, "Stopping server");

        let monitor = self.monitor_slot().take();
        if let Some(monitor) = monitor {
            monitor.cancel.send_replace(true);
            if let Err(e) = monitor.task.await
                && !e.is_cancelled()
            {
                warn!("Startup monitor ended abnormally: {e}");
            }
        }

        let mut slot = self.process.lock().await;
        let mut exit = None;

        if let Some(handle) = slot.as_mut() {
            exit = self.terminate(handle).await;
            handle.abort_output();
        }

        let matchers =
            ReapMatchers::port(self.config.port).with_pattern(self.config.process_name.clone());
        match self.reaper.reap(&matchers).await {
            Ok(report) if !report.is_empty() => info!("Reaped leftover processes: {report:?}"),
            Ok(_) => {}
            Err(e) => warn!("Reap after stop failed: {e}"),
        }

        *slot = None;
        drop(slot);

        let message = match exit {
            Some(exit) => format!("Server stopped ({exit})"),
            None => String::from("Server stopped"),
        };
        self.set_state(SupervisorState::Stopped, &message);
    }

    /// Graceful signal, bounded wait, then the forced kill.
    async fn terminate(&self, handle: &ProcessHandle) -> Option<ExitInfo> {
        if let Some(exit) = handle.exit() {
            return Some(exit);
        }

        let pid = handle.pid();
        info!("Sending terminate to server process {pid}");
        if let Err(e) = signal::terminate_group(pid) {
            warn!("Failed to signal server process {pid}: {e}");
        }

        let grace = self.config.shutdown.grace();
        if !handle.wait_for_exit(grace).await {
            warn!("Server process {pid} still running after {grace:?}, killing it");
            if let Err(e) = signal::force_kill_group(pid) {
                error!("Failed to kill server process {pid}: {e}");
            }
            handle
                .wait_for_exit(self.config.shutdown.reap_grace())
                .await;
        }

        handle.exit()
    }

    /// One stop/start per caller-initiated start cycle.
    fn on_port_conflict(shared: &Arc<Self>, generation: u64) {
        if shared.generation.load(Ordering::SeqCst) != generation || !shared.state().is_active() {
            return;
        }

        if shared.conflict_restart_used.swap(true, Ordering::SeqCst) {
            warn!("Port conflict reported again, not restarting a second time");
            return;
        }

        warn!(
            "Server reported port {} already in use, restarting once",
            shared.config.port
        );
        shared.restarting.store(true, Ordering::SeqCst);

        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            {
                let _guard = shared.op_lock.lock().await;
                // A caller stop in the meantime wins over the restart
                if shared.generation.load(Ordering::SeqCst) == generation
                    && shared.state() != SupervisorState::Stopped
                {
                    shared.stop_locked().await;
                    if let Err(e) = Shared::start_locked(&shared, false).await {
                        warn!("Restart after port conflict failed: {e}");
                    }
                }
            }
            shared.restarting.store(false, Ordering::SeqCst);
            // Wake waiters that saw Stopped while the restart was in flight
            shared.state_tx.send_modify(|_| {});
        });
    }
}

fn spawn_output_pump<R>(
    shared: Arc<Shared>,
    mut lines: Lines<BufReader<R>>,
    stream: OutputStream,
    line_tx: mpsc::UnboundedSender<OutputLine>,
    // Dropped when the stream ends
    drained: mpsc::Sender<()>,
    generation: u64,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let level = match stream {
        OutputStream::Stdout => Level::INFO,
        OutputStream::Stderr => Level::WARN,
    };

    tokio::spawn(async move {
        loop {
            match lines.next_line().await {
                Ok(Some(text)) => {
                    let line = OutputLine { stream, text };
                    shared.log_sink.log(level, &line.text);
                    shared.tail.push(&line);

                    let conflict = line.is_port_conflict();
                    // The monitor may be gone already
                    let _ = line_tx.send(line);

                    if conflict {
                        Shared::on_port_conflict(&shared, generation);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Stopped reading server {stream}: {e}");
                    break;
                }
            }
        }
        drop(drained);
    })
}

/// Owns the child until it exits, then reports the exit.
async fn watch_exit(
    shared: Arc<Shared>,
    mut child: Child,
    mut drained: mpsc::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    cancel_tx: watch::Sender<bool>,
    generation: u64,
) {
    let exit = match child.wait().await {
        Ok(status) => ExitInfo::from(status),
        Err(e) => {
            error!("Failed to wait for server process: {e}");
            ExitInfo {
                code: None,
                signal: None,
            }
        }
    };

    exit_tx.send_replace(Some(exit));
    cancel_tx.send_replace(true);

    // Let the pumps capture the last lines for the excerpt
    let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drained.recv()).await;

    if exit.success() {
        shared.transition_if_current(
            generation,
            SupervisorState::is_active,
            SupervisorState::Stopped,
            &format!("Server exited ({exit})"),
        );
    } else {
        let reason = FailureReason::new(
            FailureKind::UnexpectedExit,
            format!("server exited with {exit}"),
            shared.config.port,
        )
        .with_excerpt(shared.tail.snapshot());
        let message = reason.message.clone();

        if shared.transition_if_current(
            generation,
            SupervisorState::is_active,
            SupervisorState::Failed { reason },
            &message,
        ) {
            error!("Server process exited unexpectedly ({exit})");
        }
    }

    let mut slot = shared.process.lock().await;
    if slot
        .as_ref()
        .is_some_and(|handle| handle.generation() == generation)
    {
        *slot = None;
    }
}

async fn run_monitor(
    shared: Arc<Shared>,
    monitor: StartupMonitor,
    mut lines: mpsc::UnboundedReceiver<OutputLine>,
    cancel: watch::Receiver<bool>,
    generation: u64,
) {
    let is_starting = |state: &SupervisorState| matches!(state, SupervisorState::Starting);

    match monitor.run(&mut lines, cancel).await {
        StartupOutcome::MarkerSeen | StartupOutcome::HealthReady => {
            shared.transition_if_current(
                generation,
                is_starting,
                SupervisorState::Running,
                &format!("Server ready at {}", shared.config.web_url()),
            );
        }
        StartupOutcome::TimedOut => {
            let timeout = shared.config.startup.timeout();
            let excerpt = shared.tail.snapshot();
            for line in &excerpt {
                warn!("  | {line}");
            }

            let reason = FailureReason::new(
                FailureKind::StartupTimeout,
                format!("no startup signal within {timeout:?}, server left running"),
                shared.config.port,
            )
            .with_excerpt(excerpt);
            let message = reason.message.clone();

            shared.transition_if_current(
                generation,
                is_starting,
                SupervisorState::Failed { reason },
                &message,
            );
        }
        StartupOutcome::Cancelled => {}
    }
}
