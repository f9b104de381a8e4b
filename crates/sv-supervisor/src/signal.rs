//! Platform process signalling.
//!
//! Unix sends SIGTERM/SIGKILL; Windows shells out to `taskkill`. A target
//! that is already gone counts as success.

use std::io;

#[cfg(unix)]
mod imp {
    use std::io;

    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    fn pid(pid: u32) -> io::Result<Pid> {
        i32::try_from(pid)
            .ok()
            .filter(|raw| *raw > 0)
            .map(Pid::from_raw)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))
    }

    fn ignore_missing(result: nix::Result<()>) -> io::Result<()> {
        match result {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    pub fn terminate(target: u32) -> io::Result<()> {
        ignore_missing(kill(pid(target)?, Signal::SIGTERM))
    }

    pub fn force_kill(target: u32) -> io::Result<()> {
        ignore_missing(kill(pid(target)?, Signal::SIGKILL))
    }

    /// Signal the whole process group led by `leader` (children spawned with setsid).
    pub fn terminate_group(leader: u32) -> io::Result<()> {
        let group = pid(leader)?;
        ignore_missing(killpg(group, Signal::SIGTERM))?;
        ignore_missing(kill(group, Signal::SIGTERM))
    }

    pub fn force_kill_group(leader: u32) -> io::Result<()> {
        let group = pid(leader)?;
        ignore_missing(killpg(group, Signal::SIGKILL))?;
        ignore_missing(kill(group, Signal::SIGKILL))
    }

    pub fn is_alive(target: u32) -> bool {
        // kill(pid, 0) succeeds if the process exists (EPERM: exists, not ours)
        match pid(target) {
            Ok(p) => matches!(kill(p, None), Ok(()) | Err(Errno::EPERM)),
            Err(_) => false,
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::io;
    use std::process::Command;

    fn taskkill(args: &[&str]) -> io::Result<()> {
        // taskkill exits nonzero when the process is already gone
        Command::new("taskkill").args(args).output().map(|_| ())
    }

    pub fn terminate(target: u32) -> io::Result<()> {
        taskkill(&["/PID", &target.to_string()])
    }

    pub fn force_kill(target: u32) -> io::Result<()> {
        taskkill(&["/F", "/PID", &target.to_string()])
    }

    pub fn terminate_group(leader: u32) -> io::Result<()> {
        taskkill(&["/T", "/PID", &leader.to_string()])
    }

    pub fn force_kill_group(leader: u32) -> io::Result<()> {
        taskkill(&["/F", "/T", "/PID", &leader.to_string()])
    }

    pub fn is_alive(target: u32) -> bool {
        let mut system = sysinfo::System::new();
        system.refresh_process(sysinfo::Pid::from_u32(target))
    }
}

pub(crate) fn terminate(pid: u32) -> io::Result<()> {
    imp::terminate(pid)
}

pub(crate) fn force_kill(pid: u32) -> io::Result<()> {
    imp::force_kill(pid)
}

pub(crate) fn terminate_group(leader: u32) -> io::Result<()> {
    imp::terminate_group(leader)
}

pub(crate) fn force_kill_group(leader: u32) -> io::Result<()> {
    imp::force_kill_group(leader)
}

pub(crate) fn is_alive(pid: u32) -> bool {
    imp::is_alive(pid)
}
