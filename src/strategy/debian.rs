//! Debian-family strategy (Debian, Ubuntu, Raspbian and derivatives)
//!
//! Primary path: fetch the zabbix-release .deb for this distribution and
//! version, register it with dpkg, refresh the index and apt-get install.
//! Fallback artifact resolution goes through `apt-get download --print-uris`.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::fetch::ArtifactFetcher;
use crate::environ::HostEnvironment;

use super::{PLUGIN_PREFIX, REPO_BASE};

#[derive(Debug, Clone)]
pub struct DebianStrategy {
    series: String,
    distro_id: String,
    version_full: String,
}

impl DebianStrategy {
    pub fn new(env: &HostEnvironment, series: &str) -> Self {
        Self {
            series: series.to_string(),
            distro_id: env.distro_id.clone(),
            version_full: env.version_full.clone(),
        }
    }

    /// URL of the repository-registration package, parameterized by series,
    /// distribution and version
    pub fn release_url(&self) -> String {
        format!(
            "{REPO_BASE}/{series}/{distro}/pool/main/z/zabbix-release/zabbix-release_latest_{series}+{distro}{version}_all.deb",
            series = self.series,
            distro = self.distro_id,
            version = self.version_full,
        )
    }

    pub fn register_repository(
        &self,
        runner: &dyn CommandRunner,
        fetcher: &dyn ArtifactFetcher,
        scratch: &Path,
    ) -> Result<(), String> {
        let dest = scratch.join("zabbix-release.deb");
        fetcher
            .download(&self.release_url(), &dest)
            .map_err(|e| format!("release package download failed: {e}"))?;

        run_ok(
            runner,
            CommandSpec::new("dpkg", &["-i"]).arg(&dest.to_string_lossy()),
        )?;
        run_ok(
            runner,
            CommandSpec::new("apt-get", &["-q", "update"])
                .env("DEBIAN_FRONTEND", "noninteractive"),
        )
    }

    pub fn install(
        &self,
        runner: &dyn CommandRunner,
        packages: &[String],
    ) -> io::Result<CommandOutput> {
        runner.run(
            &CommandSpec::new("apt-get", &["-y", "-q", "install"])
                .env("DEBIAN_FRONTEND", "noninteractive")
                .args_from(packages),
        )
    }

    pub fn plugin_query(&self) -> CommandSpec {
        CommandSpec::new(
            "apt-cache",
            &["search", "--names-only", "^zabbix-agent2-plugin-"],
        )
    }

    /// apt-cache search prints "name - description" lines
    pub fn parse_plugin_listing(&self, stdout: &str) -> BTreeSet<String> {
        stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|name| name.starts_with(PLUGIN_PREFIX))
            .map(str::to_string)
            .collect()
    }

    /// `apt-get download --print-uris` prints one line per package:
    /// 'URL' filename size checksum
    pub fn locate_artifact(&self, package: &str, runner: &dyn CommandRunner) -> Vec<String> {
        let spec = CommandSpec::new("apt-get", &["-q", "download", "--print-uris"]).arg(package);
        let Ok(out) = runner.run(&spec) else {
            return Vec::new();
        };
        if !out.success {
            return Vec::new();
        }
        out.stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|token| token.trim_matches('\'').to_string())
            .filter(|url| url.starts_with("http"))
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
        runner.run(
            &CommandSpec::new("dpkg", &["-i", "--force-confnew"]).args_from(&file_args),
        )
    }
}

fn run_ok(runner: &dyn CommandRunner, spec: CommandSpec) -> Result<(), String> {
    match runner.run(&spec) {
        Ok(out) if out.success => Ok(()),
        Ok(out) => Err(format!("{spec} failed: {}", out.error_line())),
        Err(e) => Err(format!("{spec} failed: {e}")),
    }
}
