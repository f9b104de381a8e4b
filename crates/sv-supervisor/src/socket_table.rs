//! Which processes own a listening socket on a port.
//!
//! Shells out to the platform socket table tool (`lsof` on Unix,
//! `netstat -ano` on Windows); the parsers are kept pure for testing.

use crate::{SupervisorError, SupervisorResult};

use std::collections::BTreeSet;

use tokio::process::Command;
use tracing::debug;

/// Pids listening on `port` according to the platform socket table.
pub(crate) async fn listening_pids(port: u16) -> SupervisorResult<BTreeSet<u32>> {
    #[cfg(unix)]
    {
        let output = Command::new("lsof")
            .args(["-nP", "-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SupervisorError::reap_failure(format!("lsof unavailable: {e}")))?;

        // lsof exits 1 when nothing matches
        let pids = parse_lsof_pids(&String::from_utf8_lossy(&output.stdout));
        debug!("lsof reports {} listener(s) on port {port}", pids.len());
        Ok(pids)
    }

    #[cfg(windows)]
    {
        let output = Command::new("netstat")
            .args(["-ano", "-p", "TCP"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SupervisorError::reap_failure(format!("netstat unavailable: {e}")))?;

        if !output.status.success() {
            return Err(SupervisorError::reap_failure(format!(
                "netstat exited with {}",
                output.status
            )));
        }

        let pids = parse_netstat_pids(&String::from_utf8_lossy(&output.stdout), port);
        debug!("netstat reports {} listener(s) on port {port}", pids.len());
        Ok(pids)
    }
}

/// `lsof -t` prints one pid per line.
#[cfg_attr(windows, allow(dead_code))]
pub(crate) fn parse_lsof_pids(output: &str) -> BTreeSet<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Rows look like `TCP    127.0.0.1:8080    0.0.0.0:0    LISTENING    4242`.
#[cfg_attr(unix, allow(dead_code))]
pub(crate) fn parse_netstat_pids(output: &str, port: u16) -> BTreeSet<u32> {
    let suffix = format!(":{port}");
    output
        .lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [proto, local, _remote, state, pid]
                    if proto.eq_ignore_ascii_case("tcp")
                        && state.eq_ignore_ascii_case("listening")
                        && local.ends_with(&suffix) =>
                {
                    pid.parse().ok()
                }
                _ => None,
            }
        })
        .filter(|pid| *pid != 0)
        .collect()
}
