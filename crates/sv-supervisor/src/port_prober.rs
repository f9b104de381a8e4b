//! Port availability checks.

use crate::{SupervisorError, SupervisorResult};

use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
use std::panic::Location;

use error_location::ErrorLocation;

/// Answers whether a TCP port is currently bound by any process.
pub trait PortProber: Send + Sync {
    /// `Ok(false)` means free. Only a probe that could not be carried out is an error.
    fn is_port_in_use(&self, port: u16) -> SupervisorResult<bool>;
}

/// Bind test against the IPv4 and IPv6 loopback and wildcard addresses.
///
/// A bind succeeding means nobody listens there; the socket is released
/// when the listener is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpPortProber;

impl TcpPortProber {
    fn bind_test(addr: SocketAddr) -> std::io::Result<bool> {
        match TcpListener::bind(addr) {
            Ok(_listener) => Ok(false),
            Err(e) if e.kind() == ErrorKind::AddrInUse => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// IPv6 disabled or absent on this host; nothing can listen there.
    fn family_unavailable(addr: &SocketAddr, error: &std::io::Error) -> bool {
        addr.is_ipv6()
            && (matches!(
                error.kind(),
                ErrorKind::AddrNotAvailable | ErrorKind::Unsupported
            ) || Self::is_af_not_supported(error))
    }

    #[cfg(unix)]
    fn is_af_not_supported(error: &std::io::Error) -> bool {
        error.raw_os_error() == Some(libc::EAFNOSUPPORT)
    }

    #[cfg(not(unix))]
    fn is_af_not_supported(_error: &std::io::Error) -> bool {
        false
    }
}

impl PortProber for TcpPortProber {
    fn is_port_in_use(&self, port: u16) -> SupervisorResult<bool> {
        let addrs = [
            SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            SocketAddr::from((Ipv6Addr::LOCALHOST, port)),
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
        ];

        for addr in addrs {
            match Self::bind_test(addr) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if Self::family_unavailable(&addr, &e) => {}
                Err(source) => {
                    return Err(SupervisorError::ProbeFailure {
                        port,
                        source,
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }

        Ok(false)
    }
}
