//! RHEL-family strategy (RHEL, CentOS, Rocky, Alma, Oracle, Fedora, Amazon)
//!
//! Primary path: fetch the zabbix-release .rpm for the major version,
//! register it with rpm, refresh the dnf cache and dnf install. Fallback
//! artifact resolution uses `dnf repoquery --location`. This family also
//! carries the optional ODBC driver packages used by the database plugins.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::environ::HostEnvironment;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::fetch::ArtifactFetcher;

use super::{PLUGIN_PREFIX, REPO_BASE};

#[derive(Debug, Clone)]
pub struct RhelStrategy {
    series: String,
    version_major: String,
}

impl RhelStrategy {
    pub fn new(env: &HostEnvironment, series: &str) -> Self {
        Self {
            series: series.to_string(),
            version_major: env.version_major.clone(),
        }
    }

    pub fn release_url(&self) -> String {
        format!(
            "{REPO_BASE}/{series}/rhel/{major}/noarch/zabbix-release-latest-{series}.el{major}.noarch.rpm",
            series = self.series,
            major = self.version_major,
        )
    }

    pub fn register_repository(
        &self,
        runner: &dyn CommandRunner,
        fetcher: &dyn ArtifactFetcher,
        scratch: &Path,
    ) -> Result<(), String> {
        let dest = scratch.join("zabbix-release.rpm");
        fetcher
            .download(&self.release_url(), &dest)
            .map_err(|e| format!("release package download failed: {e}"))?;

        run_ok(
            runner,
            CommandSpec::new("rpm", &["-Uvh", "--replacepkgs"]).arg(&dest.to_string_lossy()),
        )?;
        run_ok(runner, CommandSpec::new("dnf", &["-q", "-y", "makecache"]))
    }

    pub fn install(
        &self,
        runner: &dyn CommandRunner,
        packages: &[String],
    ) -> io::Result<CommandOutput> {
        runner.run(&CommandSpec::new("dnf", &["-q", "-y", "install"]).args_from(packages))
    }

    pub fn plugin_query(&self) -> CommandSpec {
        CommandSpec::new(
            "dnf",
            &["-q", "repoquery", "--qf", "%{name}", "zabbix-agent2-plugin-*"],
        )
    }

    pub fn parse_plugin_listing(&self, stdout: &str) -> BTreeSet<String> {
        stdout
            .lines()
            .map(str::trim)
            .filter(|name| name.starts_with(PLUGIN_PREFIX))
            .map(str::to_string)
            .collect()
    }

    /// `dnf repoquery --location --latest-limit 1` prints the newest
    /// download URL for the package
    pub fn locate_artifact(&self, package: &str, runner: &dyn CommandRunner) -> Vec<String> {
        let spec = CommandSpec::new(
            "dnf",
            &["-q", "repoquery", "--location", "--latest-limit", "1"],
        )
        .arg(package);
        let Ok(out) = runner.run(&spec) else {
            return Vec::new();
        };
        if !out.success {
            return Vec::new();
        }
        out.stdout
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http"))
            .map(str::to_string)
            .collect()
    }

    pub fn install_local(
        &self,
        runner: &dyn CommandRunner,
        files: &[PathBuf],
    ) -> io::Result<CommandOutput> {
        let file_args: Vec<String> = files
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect();
        runner.run(&CommandSpec::new("rpm", &["-Uvh", "--replacepkgs"]).args_from(&file_args))
    }

    /// ODBC drivers for the database plugins; nice to have, never required
    pub fn optional_packages(&self) -> &'static [&'static str] {
        &["unixODBC"]
    }
}

fn run_ok(runner: &dyn CommandRunner, spec: CommandSpec) -> Result<(), String> {
    match runner.run(&spec) {
        Ok(out) if out.success => Ok(()),
        Ok(out) => Err(format!("{spec} failed: {}", out.error_line())),
        Err(e) => Err(format!("{spec} failed: {e}")),
    }
}
