//! Run orchestration
//!
//! Sequences the whole provisioning pipeline and owns its lifecycle:
//!
//! 1. Preconditions (privileges, disk space)
//! 2. Host environment probe
//! 3. Idempotency short-circuit: agent installed and service active means
//!    the run exits successfully without touching anything
//! 4. Server selection
//! 5. Plugin discovery
//! 6. Installation (primary path, fallback on failure)
//! 7. Stop service, write configuration (stop-before-write keeps the live
//!    process away from a half-written file)
//! 8. Enable, start, verification restart, final state check
//!
//! The orchestrator is the single writer of the configuration and the sole
//! driver of the service state machine.

use console::style;
use serde::Serialize;

use crate::agent_config::AgentConfig;
use crate::collector::{self, CollectorCandidate, ReachabilityProbe, TcpProbe};
use crate::environ;
use crate::error::Result;
use crate::exec::{CommandRunner, SystemRunner};
use crate::fetch::{ArtifactFetcher, HttpFetcher};
use crate::install::{Installer, PackagePlan};
use crate::plugins::discover_plugins;
use crate::preflight;
use crate::service::{ServiceController, ServiceManager, ServiceState};
use crate::settings::Settings;
use crate::strategy::{AGENT_PACKAGE, PackageStrategy};
use crate::transcript::Transcript;

/// What one run did, for the human and JSON reports
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub family: String,
    pub collector: Option<String>,
    pub install_path: Option<String>,
    pub artifacts: Vec<String>,
    pub plugins: Vec<String>,
    pub config_path: Option<String>,
    pub backup: Option<String>,
    pub service_state: String,
    pub short_circuited: bool,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn print_human(&self) {
        println!();
        if self.short_circuited {
            println!(
                "{} agent already installed and active; nothing to do",
                style("✓").green().bold()
            );
            return;
        }

        println!("{}", style("Provisioning complete").green().bold());
        println!("  family:        {}", self.family);
        if let Some(collector) = &self.collector {
            println!("  server:        {collector}");
        }
        if let Some(path) = &self.install_path {
            println!("  install path:  {path}");
        }
        println!("  plugins:       {}", if self.plugins.is_empty() {
            "none".to_string()
        } else {
            self.plugins.join(", ")
        });
        if let Some(config) = &self.config_path {
            println!("  configuration: {config}");
        }
        if let Some(backup) = &self.backup {
            println!("  backup:        {backup}");
        }
        println!("  service:       {}", self.service_state);
        for warning in &self.warnings {
            println!("  {} {warning}", style("warning:").yellow().bold());
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Run the full pipeline with production collaborators
pub fn run(settings: &Settings) -> Result<RunSummary> {
    let mut transcript = Transcript::open(&settings.log_file);
    let runner = SystemRunner;
    let fetcher = HttpFetcher::new();
    let probe = TcpProbe;
    run_with(settings, &runner, &fetcher, &probe, &mut transcript)
}

/// Pipeline over injected seams; production and tests share this path
pub(crate) fn run_with(
    settings: &Settings,
    runner: &dyn CommandRunner,
    fetcher: &dyn ArtifactFetcher,
    probe: &dyn ReachabilityProbe,
    transcript: &mut Transcript,
) -> Result<RunSummary> {
    transcript.step("checking preconditions");
    preflight::check(runner)?;

    transcript.step("probing host environment");
    let env = environ::detect(&settings.os_release_path)?;
    transcript.info(&env.describe());

    let strategy = PackageStrategy::resolve(&env, &settings.agent_version);
    let manager = service_manager_for(&strategy, settings);

    if strategy.is_installed(runner) && manager.is_active(runner) {
        transcript.info("agent already installed and service active");
        return Ok(RunSummary {
            family: env.family.to_string(),
            collector: None,
            install_path: None,
            artifacts: Vec::new(),
            plugins: Vec::new(),
            config_path: None,
            backup: None,
            service_state: ServiceState::Running.to_string(),
            short_circuited: true,
            warnings: Vec::new(),
        });
    }

    transcript.step("selecting server");
    let candidates: Vec<CollectorCandidate> = settings
        .servers
        .iter()
        .map(|host| CollectorCandidate {
            host: host.clone(),
            port: settings.server_port,
        })
        .collect();
    let selection = collector::select_collector(&candidates, probe, settings.probe_timeout)?;
    transcript.info(&format!("selected {selection}"));

    transcript.step("discovering plugins");
    let plugins = discover_plugins(&strategy, runner, transcript);
    transcript.info(&format!("{} plugin package(s) found", plugins.len()));

    transcript.step("installing agent packages");
    let plan = PackagePlan::new(AGENT_PACKAGE, plugins);
    let outcome = Installer::new(&strategy, runner, fetcher).run(&plan, transcript)?;

    let mut controller = ServiceController::new(manager, runner, settings.settle);
    controller.stop_if_running(transcript);

    transcript.step("writing agent configuration");
    let config_path = settings
        .config_path
        .clone()
        .unwrap_or_else(|| strategy.config_path());
    let config = AgentConfig::build(&selection, settings, &strategy.config_defaults());
    let backup = config.write(&config_path, transcript)?;
    transcript.info(&format!("wrote {}", config_path.display()));

    transcript.step("starting agent service");
    controller.bring_up(transcript)?;
    transcript.step("provisioning complete");

    Ok(RunSummary {
        family: env.family.to_string(),
        collector: Some(selection.to_string()),
        install_path: Some(outcome.path.to_string()),
        artifacts: outcome.artifacts,
        plugins: plan.plugins.iter().cloned().collect(),
        config_path: Some(config_path.display().to_string()),
        backup: backup.map(|p| p.display().to_string()),
        service_state: controller.state().to_string(),
        short_circuited: false,
        warnings: outcome.warnings,
    })
}

/// The strategy's service manager, with unit search paths overridable from
/// the settings
fn service_manager_for(strategy: &PackageStrategy, settings: &Settings) -> ServiceManager {
    match (&settings.unit_search_paths, strategy.service_manager()) {
        (Some(paths), ServiceManager::Systemd { unit, .. }) => {
            ServiceManager::systemd_with_paths(&unit, paths.clone())
        }
        (_, manager) => manager,
    }
}
