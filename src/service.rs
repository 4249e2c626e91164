//! Agent service lifecycle
//!
//! Drives the service through its state machine:
//! `NotInstalled → Stopped → Starting → {Running, Failed}`, with one
//! verification restart from `Running` (`Running → Starting → {Running,
//! Failed}`). Some agents only register with the server after an explicit
//! restart, so a single restart cycle is part of verification. `Failed` and
//! the post-restart `Running` are terminal for a run.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, ZagentError};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::transcript::Transcript;

/// Observed lifecycle state of the agent service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotInstalled,
    Stopped,
    Starting,
    Running,
    Failed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::NotInstalled => write!(f, "not-installed"),
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Failed => write!(f, "failed"),
        }
    }
}

/// The host's service manager, issuing family-appropriate verbs
#[derive(Debug, Clone)]
pub enum ServiceManager {
    Systemd {
        unit: String,
        search_paths: Vec<PathBuf>,
    },
    Windows {
        name: String,
    },
}

impl ServiceManager {
    pub fn systemd(unit: &str) -> Self {
        Self::Systemd {
            unit: unit.to_string(),
            search_paths: vec![
                PathBuf::from("/etc/systemd/system"),
                PathBuf::from("/usr/lib/systemd/system"),
                PathBuf::from("/lib/systemd/system"),
            ],
        }
    }

    /// Systemd manager with custom unit search paths
    pub fn systemd_with_paths(unit: &str, search_paths: Vec<PathBuf>) -> Self {
        Self::Systemd {
            unit: unit.to_string(),
            search_paths,
        }
    }

    pub fn windows(name: &str) -> Self {
        Self::Windows {
            name: name.to_string(),
        }
    }

    /// Unit or service name for messages
    pub fn describe(&self) -> &str {
        match self {
            ServiceManager::Systemd { unit, .. } => unit,
            ServiceManager::Windows { name } => name,
        }
    }

    /// Whether the service currently reports active/running
    pub fn is_active(&self, runner: &dyn CommandRunner) -> bool {
        match self {
            ServiceManager::Systemd { unit, .. } => runner
                .run(&CommandSpec::new(
                    "systemctl",
                    &["is-active", "--quiet", unit],
                ))
                .map(|out| out.success)
                .unwrap_or(false),
            ServiceManager::Windows { name } => runner
                .run(&CommandSpec::new("sc", &["query", name]))
                .map(|out| out.success && out.stdout.contains("RUNNING"))
                .unwrap_or(false),
        }
    }

    /// Whether the managed unit/definition is actually present on disk,
    /// rather than assumed from package metadata
    pub fn unit_present(&self, runner: &dyn CommandRunner) -> bool {
        match self {
            ServiceManager::Systemd { unit, search_paths } => search_paths
                .iter()
                .any(|dir| dir.join(format!("{unit}.service")).exists()),
            ServiceManager::Windows { name } => runner
                .run(&CommandSpec::new("sc", &["qc", name]))
                .map(|out| out.success)
                .unwrap_or(false),
        }
    }

    pub fn stop(&self, runner: &dyn CommandRunner) -> io::Result<CommandOutput> {
        match self {
            ServiceManager::Systemd { unit, .. } => {
                runner.run(&CommandSpec::new("systemctl", &["stop", unit]))
            }
            ServiceManager::Windows { name } => {
                runner.run(&CommandSpec::new("sc", &["stop", name]))
            }
        }
    }

    pub fn enable(&self, runner: &dyn CommandRunner) -> io::Result<CommandOutput> {
        match self {
            ServiceManager::Systemd { unit, .. } => {
                runner.run(&CommandSpec::new("systemctl", &["enable", unit]))
            }
            ServiceManager::Windows { name } => {
                runner.run(&CommandSpec::new("sc", &["config", name, "start=", "auto"]))
            }
        }
    }

    pub fn start(&self, runner: &dyn CommandRunner) -> io::Result<CommandOutput> {
        match self {
            ServiceManager::Systemd { unit, .. } => {
                runner.run(&CommandSpec::new("systemctl", &["start", unit]))
            }
            ServiceManager::Windows { name } => {
                runner.run(&CommandSpec::new("sc", &["start", name]))
            }
        }
    }

    pub fn restart(&self, runner: &dyn CommandRunner) -> io::Result<CommandOutput> {
        match self {
            ServiceManager::Systemd { unit, .. } => {
                runner.run(&CommandSpec::new("systemctl", &["restart", unit]))
            }
            // sc has no restart verb
            ServiceManager::Windows { .. } => {
                let _ = self.stop(runner);
                self.start(runner)
            }
        }
    }
}

/// Drives the service state machine for one run
pub struct ServiceController<'a> {
    manager: ServiceManager,
    runner: &'a dyn CommandRunner,
    settle: Duration,
    state: ServiceState,
}

impl<'a> ServiceController<'a> {
    pub fn new(manager: ServiceManager, runner: &'a dyn CommandRunner, settle: Duration) -> Self {
        Self {
            manager,
            runner,
            settle,
            state: ServiceState::NotInstalled,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Stop the service before the configuration is rewritten, so a live
    /// process never reads a half-written or stale file. Stop failures are
    /// tolerated: the service may not exist yet.
    pub fn stop_if_running(&mut self, transcript: &mut Transcript) {
        if self.manager.is_active(self.runner) {
            match self.manager.stop(self.runner) {
                Ok(out) if !out.success => {
                    transcript.warn(&format!(
                        "could not stop {}: {}",
                        self.manager.describe(),
                        out.error_line()
                    ));
                }
                Err(e) => {
                    transcript.warn(&format!("could not stop {}: {e}", self.manager.describe()));
                }
                Ok(_) => {}
            }
        }
        self.state = ServiceState::Stopped;
    }

    /// Enable, start, settle, restart once for verification, settle again
    /// and confirm the final running state
    pub fn bring_up(&mut self, transcript: &mut Transcript) -> Result<()> {
        let name = self.manager.describe().to_string();

        if !self.manager.unit_present(self.runner) {
            self.state = ServiceState::Failed;
            return Err(ZagentError::ServiceFailed {
                message: format!("installation incomplete: {name} service definition not found"),
            });
        }

        match self.manager.enable(self.runner) {
            Ok(out) if !out.success => {
                transcript.warn(&format!("could not enable {name} at boot: {}", out.error_line()));
            }
            Err(e) => transcript.warn(&format!("could not enable {name} at boot: {e}")),
            Ok(_) => {}
        }

        self.state = ServiceState::Starting;
        self.manager
            .start(self.runner)
            .map_err(|e| ZagentError::ServiceFailed {
                message: format!("could not start {name}: {e}"),
            })?;
        std::thread::sleep(self.settle);

        if !self.manager.is_active(self.runner) {
            self.state = ServiceState::Failed;
            return Err(ZagentError::ServiceFailed {
                message: format!("{name} did not reach running state after start"),
            });
        }
        self.state = ServiceState::Running;

        transcript.info("verification restart");
        self.state = ServiceState::Starting;
        self.manager
            .restart(self.runner)
            .map_err(|e| ZagentError::ServiceFailed {
                message: format!("could not restart {name}: {e}"),
            })?;
        std::thread::sleep(self.settle);

        if self.manager.is_active(self.runner) {
            self.state = ServiceState::Running;
            Ok(())
        } else {
            self.state = ServiceState::Failed;
            Err(ZagentError::ServiceFailed {
                message: format!("{name} not running after verification restart"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FakeRunner, fail_output, ok_output};
    use tempfile::TempDir;

    fn systemd_in(temp: &TempDir) -> ServiceManager {
        ServiceManager::systemd_with_paths("zabbix-agent2", vec![temp.path().to_path_buf()])
    }

    fn write_unit(temp: &TempDir) {
        std::fs::write(temp.path().join("zabbix-agent2.service"), "[Unit]\n").unwrap();
    }

    #[test]
    fn test_bring_up_reaches_running() {
        let temp = TempDir::new().unwrap();
        write_unit(&temp);
        let runner = FakeRunner::permissive();
        let mut controller = ServiceController::new(systemd_in(&temp), &runner, Duration::ZERO);

        controller.bring_up(&mut Transcript::disabled()).unwrap();

        assert_eq!(controller.state(), ServiceState::Running);
        assert!(runner.ran("systemctl enable zabbix-agent2"));
        assert!(runner.ran("systemctl start zabbix-agent2"));
        assert!(runner.ran("systemctl restart zabbix-agent2"));
    }

    #[test]
    fn test_bring_up_without_unit_is_incomplete_install() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::permissive();
        let mut controller = ServiceController::new(systemd_in(&temp), &runner, Duration::ZERO);

        let err = controller.bring_up(&mut Transcript::disabled()).unwrap_err();

        assert!(matches!(err, ZagentError::ServiceFailed { .. }));
        assert!(err.to_string().contains("installation incomplete"));
        // no mutating verbs were attempted
        assert!(!runner.ran("systemctl start"));
    }

    #[test]
    fn test_bring_up_fails_when_never_active() {
        let temp = TempDir::new().unwrap();
        write_unit(&temp);
        let runner =
            FakeRunner::permissive().on("systemctl is-active", fail_output(3, "inactive"));
        let mut controller = ServiceController::new(systemd_in(&temp), &runner, Duration::ZERO);

        let err = controller.bring_up(&mut Transcript::disabled()).unwrap_err();

        assert!(err.to_string().contains("after start"));
        assert_eq!(controller.state(), ServiceState::Failed);
        assert!(!runner.ran("systemctl restart"));
    }

    #[test]
    fn test_bring_up_fails_after_verification_restart() {
        let temp = TempDir::new().unwrap();
        write_unit(&temp);
        // active after start, gone after the verification restart
        let runner = FakeRunner::permissive().on_seq(
            "systemctl is-active",
            vec![ok_output(""), fail_output(3, "inactive")],
        );
        let mut controller = ServiceController::new(systemd_in(&temp), &runner, Duration::ZERO);

        let err = controller.bring_up(&mut Transcript::disabled()).unwrap_err();

        assert!(err.to_string().contains("verification restart"));
        assert_eq!(controller.state(), ServiceState::Failed);
        assert!(runner.ran("systemctl restart"));
    }

    #[test]
    fn test_stop_if_running_tolerates_stop_failure() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::permissive().on("systemctl stop", fail_output(5, "no such unit"));
        let mut controller = ServiceController::new(systemd_in(&temp), &runner, Duration::ZERO);

        controller.stop_if_running(&mut Transcript::disabled());

        assert_eq!(controller.state(), ServiceState::Stopped);
    }

    #[test]
    fn test_stop_if_running_skips_stop_when_inactive() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let mut controller = ServiceController::new(systemd_in(&temp), &runner, Duration::ZERO);

        controller.stop_if_running(&mut Transcript::disabled());

        assert!(!runner.ran("systemctl stop"));
        assert_eq!(controller.state(), ServiceState::Stopped);
    }

    #[test]
    fn test_windows_is_active_parses_state() {
        let manager = ServiceManager::windows("Zabbix Agent 2");
        let running = FakeRunner::new().on(
            "sc query",
            ok_output("SERVICE_NAME: Zabbix Agent 2\n        STATE : 4  RUNNING\n"),
        );
        let stopped = FakeRunner::new().on(
            "sc query",
            ok_output("SERVICE_NAME: Zabbix Agent 2\n        STATE : 1  STOPPED\n"),
        );

        assert!(manager.is_active(&running));
        assert!(!manager.is_active(&stopped));
    }

    #[test]
    fn test_service_state_display() {
        assert_eq!(ServiceState::Running.to_string(), "running");
        assert_eq!(ServiceState::NotInstalled.to_string(), "not-installed");
    }
}
