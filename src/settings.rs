//! Immutable run settings
//!
//! All configurable behavior is resolved here, once, from the parsed CLI
//! (clap also folds in the `ZAGENT_*` environment overrides). Components
//! receive `&Settings` and never read ambient environment state themselves.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

/// How long a single TCP liveness probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Settle period after service start/restart before verifying state.
const SETTLE: Duration = Duration::from_secs(5);

/// Resolved, immutable settings for one provisioning run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Candidate Zabbix servers, probed in order
    pub servers: Vec<String>,
    /// Server trapper port (liveness probe + ServerActive)
    pub server_port: u16,
    /// Agent listen port
    pub listen_port: u16,
    /// Agent DebugLevel
    pub debug_level: u8,
    /// HostMetadata value for auto-registration
    pub host_metadata: String,
    /// Zabbix release series (e.g. "7.0")
    pub agent_version: String,
    /// Agent configuration file override
    pub config_path: Option<PathBuf>,
    /// Run transcript file
    pub log_file: PathBuf,
    /// Emit the run summary as JSON
    pub json: bool,
    /// TCP probe timeout
    pub probe_timeout: Duration,
    /// Settle period around service start/restart
    pub settle: Duration,
    /// Host identification source on unix families
    pub os_release_path: PathBuf,
    /// Systemd unit search locations; `None` uses the standard directories
    pub unit_search_paths: Option<Vec<PathBuf>>,
}

impl Settings {
    /// Resolve settings from the parsed CLI
    pub fn from_cli(cli: Cli) -> Self {
        let listen_port = cli
            .listen_port
            .unwrap_or_else(|| cli.server_port.saturating_sub(1));

        Self {
            servers: cli.servers,
            server_port: cli.server_port,
            listen_port,
            debug_level: cli.debug_level,
            host_metadata: cli.host_metadata,
            agent_version: cli.agent_version,
            config_path: cli.config_path,
            log_file: cli.log_file,
            json: cli.json,
            probe_timeout: PROBE_TIMEOUT,
            settle: SETTLE,
            os_release_path: PathBuf::from("/etc/os-release"),
            unit_search_paths: None,
        }
    }
}
