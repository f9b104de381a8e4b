//! Waiting for SIGINT/SIGTERM (Ctrl-C elsewhere).

use crate::error::CliResult;

#[cfg(unix)]
pub async fn wait_for_signal() -> CliResult<&'static str> {
    use crate::error::CliError;

    use std::panic::Location;

    use error_location::ErrorLocation;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    /// Unregisters the handlers when the wait is abandoned.
    struct CloseOnDrop(signal_hook::iterator::Handle);

    impl Drop for CloseOnDrop {
        fn drop(&mut self) {
            self.0.close();
        }
    }

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|source| CliError::Signal {
        source,
        location: ErrorLocation::from(Location::caller()),
    })?;
    let _close = CloseOnDrop(signals.handle());

    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let _ = tx.send(sig);
        }
    });

    // A closed channel means the handlers were closed
    let name = match rx.await {
        Ok(SIGTERM) => "SIGTERM",
        _ => "SIGINT",
    };
    Ok(name)
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> CliResult<&'static str> {
    use crate::error::CliError;

    use std::panic::Location;

    use error_location::ErrorLocation;

    tokio::signal::ctrl_c()
        .await
        .map_err(|source| CliError::Signal {
            source,
            location: ErrorLocation::from(Location::caller()),
        })?;
    Ok("Ctrl-C")
}
