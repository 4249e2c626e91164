//! Zabbix server selection
//!
//! Walks an ordered candidate list and selects the first server whose
//! trapper port accepts a TCP connection within a bounded timeout. Probing
//! short-circuits on the first success; remaining candidates are never
//! contacted. The probe itself sits behind [`ReachabilityProbe`] so the
//! selection logic is testable without a network.

use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, ZagentError};

/// One entry of the candidate list
#[derive(Debug, Clone)]
pub struct CollectorCandidate {
    pub host: String,
    pub port: u16,
}

/// The single server selected for this run, immutable once made
#[derive(Debug, Clone)]
pub struct CollectorSelection {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for CollectorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// TCP-level liveness check against a host/port pair
pub trait ReachabilityProbe {
    fn is_reachable(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Production probe using a bounded-timeout TCP connect
pub struct TcpProbe;

impl ReachabilityProbe for TcpProbe {
    fn is_reachable(&self, host: &str, port: u16, timeout: Duration) -> bool {
        let Ok(addrs) = (host, port).to_socket_addrs() else {
            return false;
        };
        for addr in addrs {
            if TcpStream::connect_timeout(&addr, timeout).is_ok() {
                return true;
            }
        }
        false
    }
}

/// Select the first reachable candidate, in list order
pub fn select_collector(
    candidates: &[CollectorCandidate],
    probe: &dyn ReachabilityProbe,
    timeout: Duration,
) -> Result<CollectorSelection> {
    for candidate in candidates {
        if probe.is_reachable(&candidate.host, candidate.port, timeout) {
            return Ok(CollectorSelection {
                host: candidate.host.clone(),
                port: candidate.port,
            });
        }
    }

    Err(ZagentError::NoCollectorReachable {
        port: candidates.first().map(|c| c.port).unwrap_or_default(),
        candidates: candidates
            .iter()
            .map(|c| c.host.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}
