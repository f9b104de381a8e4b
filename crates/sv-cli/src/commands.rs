use crate::error::CliResult;
use crate::shutdown;

use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use serde::Serialize;
use sv_config::Config;
use sv_supervisor::{
    PortProber, ProcessReaper, ReapMatchers, ServerSupervisor, SupervisorError, SupervisorState,
    SystemProcessReaper, TcpPortProber,
};
use tracing::{error, info, warn};

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Start the server, wait for it to become ready, stop it on SIGINT/SIGTERM
    Run {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,

        /// Override the startup timeout (e.g. "45s", "2m")
        #[arg(long, value_parser = humantime::parse_duration)]
        startup_timeout: Option<Duration>,
    },

    /// Report whether a port is currently bound
    Probe {
        #[arg(long)]
        port: u16,
    },

    /// Terminate processes listening on a port and/or matching a command line pattern
    Reap {
        #[arg(long, required_unless_present = "name")]
        port: Option<u16>,

        /// Substring of the process command line
        #[arg(long)]
        name: Option<String>,

        /// Time between terminate and force-kill (e.g. "2s")
        #[arg(long, value_parser = humantime::parse_duration, default_value = "2s")]
        grace: Duration,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Serialize)]
struct ProbeOutput {
    port: u16,
    in_use: bool,
}

/// Serialized on every status change while `run` is active.
#[derive(Serialize)]
struct StatusEvent<'a> {
    #[serde(flatten)]
    state: &'a SupervisorState,
    message: &'a str,
}

pub(crate) fn print_json<T: Serialize>(value: &T, pretty: bool) -> CliResult<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

pub(crate) async fn run(
    mut config: Config,
    port: Option<u16>,
    startup_timeout: Option<Duration>,
) -> CliResult<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(timeout) = startup_timeout {
        config.server.startup.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }

    let listener = |state: &SupervisorState, message: &str| {
        if let Ok(json) = serde_json::to_string(&StatusEvent { state, message }) {
            println!("{json}");
        }
    };

    let supervisor = ServerSupervisor::builder(config.server)
        .status_listener(Arc::new(listener))
        .build()?;

    supervisor.start().await?;

    let started = tokio::select! {
        result = supervisor.wait_for_startup() => result,
        signal = shutdown::wait_for_signal() => {
            info!("Received {}, stopping before startup finished", signal?);
            supervisor.stop().await?;
            return Ok(());
        }
    };

    if let Err(e) = started {
        error!("Server failed to start: {e}");
        supervisor.stop().await?;
        return Err(e.into());
    }

    info!("Server is ready at {}", supervisor.web_url());

    // A port-conflict restart passes through Stopping/Stopped; only a final stop ends the run
    tokio::select! {
        signal = shutdown::wait_for_signal() => {
            info!("Received {}, shutting down...", signal?);
        }
        state = supervisor.wait_until_down() => {
            warn!("Server is no longer running: {state}");
        }
    }

    let last_state = supervisor.status();
    supervisor.stop().await?;
    info!("Server stopped");

    match last_state {
        SupervisorState::Failed { reason } => Err(SupervisorError::startup_failed(reason).into()),
        _ => Ok(()),
    }
}

pub(crate) fn probe(port: u16, pretty: bool) -> CliResult<()> {
    let in_use = TcpPortProber.is_port_in_use(port)?;
    print_json(&ProbeOutput { port, in_use }, pretty)
}

pub(crate) async fn reap(
    port: Option<u16>,
    name: Option<String>,
    grace: Duration,
    pretty: bool,
) -> CliResult<()> {
    let matchers = ReapMatchers {
        process_name_pattern: name,
        port,
    };

    let report = SystemProcessReaper::new(grace).reap(&matchers).await?;
    print_json(&report, pretty)
}

pub(crate) fn show_config(config: &Config) {
    println!("Effective configuration:");
    for line in config.summary_lines() {
        println!("{line}");
    }
}
