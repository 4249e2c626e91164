//! Per-family package strategies
//!
//! A closed tagged variant over the supported OS families. Each variant
//! carries its own data (repository URL template, install verbs, plugin
//! query, artifact-resolution procedure) and the rest of the pipeline
//! dispatches through [`PackageStrategy`] instead of branching on family
//! strings. Unsupported families never reach this module; they are rejected
//! by the environment prober.

mod debian;
mod rhel;
mod suse;
mod windows;

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::agent_config::ConfigDefaults;
use crate::environ::{HostEnvironment, OsFamily};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::fetch::ArtifactFetcher;
use crate::service::ServiceManager;

pub use debian::DebianStrategy;
pub use rhel::RhelStrategy;
pub use suse::SuseStrategy;
pub use windows::WindowsStrategy;

/// The agent package every family installs
pub const AGENT_PACKAGE: &str = "zabbix-agent2";

/// Naming convention for separately packaged agent plugins
pub const PLUGIN_PREFIX: &str = "zabbix-agent2-plugin-";

/// Upstream package repository root
pub const REPO_BASE: &str = "https://repo.zabbix.com/zabbix";

/// Standard agent configuration path on unix families
const UNIX_CONFIG_PATH: &str = "/etc/zabbix/zabbix_agent2.conf";

const UNIX_DEFAULTS: ConfigDefaults = ConfigDefaults {
    pid_file: Some("/run/zabbix/zabbix_agent2.pid"),
    log_file: "/var/log/zabbix/zabbix_agent2.log",
    include: &[
        "/etc/zabbix/zabbix_agent2.d/*.conf",
        "/etc/zabbix/zabbix_agent2.d/plugins.d/*.conf",
    ],
};

/// Family-specific installation strategy
#[derive(Debug, Clone)]
pub enum PackageStrategy {
    Debian(DebianStrategy),
    Rhel(RhelStrategy),
    Suse(SuseStrategy),
    Windows(WindowsStrategy),
}

impl PackageStrategy {
    /// Map a probed environment to its strategy
    pub fn resolve(env: &HostEnvironment, series: &str) -> Self {
        match env.family {
            OsFamily::Debian => Self::Debian(DebianStrategy::new(env, series)),
            OsFamily::Rhel => Self::Rhel(RhelStrategy::new(env, series)),
            OsFamily::Suse => Self::Suse(SuseStrategy::new(env, series)),
            OsFamily::Windows => Self::Windows(WindowsStrategy::new(env, series)),
        }
    }

    pub fn family(&self) -> OsFamily {
        match self {
            Self::Debian(_) => OsFamily::Debian,
            Self::Rhel(_) => OsFamily::Rhel,
            Self::Suse(_) => OsFamily::Suse,
            Self::Windows(_) => OsFamily::Windows,
        }
    }

    /// Register the upstream repository (download the release artifact and
    /// hand it to the local package manager). An `Err` fails the primary
    /// path, not the run.
    pub fn register_repository(
        &self,
        runner: &dyn CommandRunner,
        fetcher: &dyn ArtifactFetcher,
        scratch: &Path,
    ) -> std::result::Result<(), String> {
        match self {
            Self::Debian(s) => s.register_repository(runner, fetcher, scratch),
            Self::Rhel(s) => s.register_repository(runner, fetcher, scratch),
            Self::Suse(s) => s.register_repository(runner, fetcher, scratch),
            Self::Windows(s) => s.register_repository(runner, fetcher, scratch),
        }
    }

    /// Primary install invocation for the agent plus plugin set
    pub fn install(
        &self,
        runner: &dyn CommandRunner,
        fetcher: &dyn ArtifactFetcher,
        scratch: &Path,
        packages: &[String],
    ) -> io::Result<CommandOutput> {
        match self {
            Self::Debian(s) => s.install(runner, packages),
            Self::Rhel(s) => s.install(runner, packages),
            Self::Suse(s) => s.install(runner, packages),
            Self::Windows(s) => s.install(runner, fetcher, scratch),
        }
    }

    /// Package-index query listing plugin packages, if the family has one
    pub fn plugin_query(&self) -> Option<CommandSpec> {
        match self {
            Self::Debian(s) => Some(s.plugin_query()),
            Self::Rhel(s) => Some(s.plugin_query()),
            Self::Suse(s) => Some(s.plugin_query()),
            Self::Windows(_) => None,
        }
    }

    /// Extract plugin package names from the query output
    pub fn parse_plugin_listing(&self, stdout: &str) -> BTreeSet<String> {
        match self {
            Self::Debian(s) => s.parse_plugin_listing(stdout),
            Self::Rhel(s) => s.parse_plugin_listing(stdout),
            Self::Suse(s) => s.parse_plugin_listing(stdout),
            Self::Windows(_) => BTreeSet::new(),
        }
    }

    /// Resolve the latest artifact location(s) for one package. Empty means
    /// the package index could not place it.
    pub fn locate_artifact(
        &self,
        package: &str,
        runner: &dyn CommandRunner,
        fetcher: &dyn ArtifactFetcher,
    ) -> Vec<String> {
        match self {
            Self::Debian(s) => s.locate_artifact(package, runner),
            Self::Rhel(s) => s.locate_artifact(package, runner),
            Self::Suse(s) => s.locate_artifact(package, runner, fetcher),
            Self::Windows(s) => s.locate_artifact(package, fetcher),
        }
    }

    /// Install already-downloaded artifacts in one local invocation,
    /// preferring replacement on conflicts
    pub fn install_local(
        &self,
        runner: &dyn CommandRunner,
        files: &[PathBuf],
    ) -> io::Result<CommandOutput> {
        match self {
            Self::Debian(s) => s.install_local(runner, files),
            Self::Rhel(s) => s.install_local(runner, files),
            Self::Suse(s) => s.install_local(runner, files),
            Self::Windows(s) => s.install_local(runner, files),
        }
    }

    /// Whether the agent package is present on the host
    pub fn is_installed(&self, runner: &dyn CommandRunner) -> bool {
        let spec = match self {
            Self::Debian(_) => CommandSpec::new("dpkg", &["-s", AGENT_PACKAGE]),
            Self::Rhel(_) | Self::Suse(_) => CommandSpec::new("rpm", &["-q", AGENT_PACKAGE]),
            Self::Windows(_) => CommandSpec::new("sc", &["query", "Zabbix Agent 2"]),
        };
        runner.run(&spec).map(|out| out.success).unwrap_or(false)
    }

    /// Auxiliary packages worth having but never required
    pub fn optional_packages(&self) -> &'static [&'static str] {
        match self {
            Self::Rhel(s) => s.optional_packages(),
            _ => &[],
        }
    }

    pub fn config_path(&self) -> PathBuf {
        match self {
            Self::Windows(s) => s.config_path(),
            _ => PathBuf::from(UNIX_CONFIG_PATH),
        }
    }

    pub fn config_defaults(&self) -> ConfigDefaults {
        match self {
            Self::Windows(s) => s.config_defaults(),
            _ => UNIX_DEFAULTS,
        }
    }

    pub fn service_manager(&self) -> ServiceManager {
        match self {
            Self::Windows(_) => ServiceManager::windows("Zabbix Agent 2"),
            _ => ServiceManager::systemd(AGENT_PACKAGE),
        }
    }
}
