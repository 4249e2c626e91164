//! SUSE-family strategy (SLES, SLED, openSUSE)
//!
//! Primary path: fetch the zabbix-release .rpm, register it with rpm,
//! zypper refresh and zypper install. zypper cannot print download URLs,
//! so fallback resolution reads the packaged version from `zypper info`,
//! constructs the repository URL from the known layout and confirms it
//! with the fetcher's existence check.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::environ::{Arch, HostEnvironment};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::fetch::ArtifactFetcher;

use super::{PLUGIN_PREFIX, REPO_BASE};

#[derive(Debug, Clone)]
pub struct SuseStrategy {
    series: String,
    version_major: String,
    arch: Arch,
}

impl SuseStrategy {
    pub fn new(env: &HostEnvironment, series: &str) -> Self {
        Self {
            series: series.to_string(),
            version_major: env.version_major.clone(),
            arch: env.arch,
        }
    }

    pub fn release_url(&self) -> String {
        format!(
            "{REPO_BASE}/{series}/sles/{major}/noarch/zabbix-release-latest-{series}.sles{major}.noarch.rpm",
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
        run_ok(
            runner,
            CommandSpec::new("zypper", &["--non-interactive", "--quiet", "refresh"]),
        )
    }

    pub fn install(
        &self,
        runner: &dyn CommandRunner,
        packages: &[String],
    ) -> io::Result<CommandOutput> {
        runner.run(
            &CommandSpec::new("zypper", &["--non-interactive", "--quiet", "install", "-y"])
                .args_from(packages),
        )
    }

    pub fn plugin_query(&self) -> CommandSpec {
        CommandSpec::new(
            "zypper",
            &[
                "--non-interactive",
                "--quiet",
                "search",
                "--type",
                "package",
                "zabbix-agent2-plugin-",
            ],
        )
    }

    /// zypper search prints a table: `S | Name | Summary | Type`
    pub fn parse_plugin_listing(&self, stdout: &str) -> BTreeSet<String> {
        stdout
            .lines()
            .filter(|line| line.contains('|'))
            .filter_map(|line| line.split('|').nth(1))
            .map(str::trim)
            .filter(|name| name.starts_with(PLUGIN_PREFIX))
            .map(str::to_string)
            .collect()
    }

    /// Resolve the packaged version, construct the repository URL and
    /// confirm the artifact actually exists upstream
    pub fn locate_artifact(
        &self,
        package: &str,
        runner: &dyn CommandRunner,
        fetcher: &dyn ArtifactFetcher,
    ) -> Vec<String> {
        let spec = CommandSpec::new("zypper", &["--non-interactive", "--quiet", "info"])
            .arg(package);
        let Ok(out) = runner.run(&spec) else {
            return Vec::new();
        };
        if !out.success {
            return Vec::new();
        }

        let Some(version) = parse_info_version(&out.stdout) else {
            return Vec::new();
        };
        let url = format!(
            "{REPO_BASE}/{series}/sles/{major}/{arch}/{package}-{version}.{arch}.rpm",
            series = self.series,
            major = self.version_major,
            arch = self.arch.rpm(),
        );

        if fetcher.exists(&url) {
            vec![url]
        } else {
            Vec::new()
        }
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
}

/// Extract `Version : 7.0.13-1` from zypper info output
fn parse_info_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("Version"))
        .and_then(|line| line.split(':').nth(1))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn run_ok(runner: &dyn CommandRunner, spec: CommandSpec) -> Result<(), String> {
    match runner.run(&spec) {
        Ok(out) if out.success => Ok(()),
        Ok(out) => Err(format!("{spec} failed: {}", out.error_line())),
        Err(e) => Err(format!("{spec} failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::probe;
    use crate::test_fixtures::{FakeFetcher, FakeRunner, ok_output};

    fn strategy() -> SuseStrategy {
        let env = probe("ID=sles\nVERSION_ID=\"15.5\"\n", "x86_64").unwrap();
        SuseStrategy::new(&env, "7.0")
    }

    const INFO: &str = "Information for package zabbix-agent2:\n\
                        --------------------------------------\n\
                        Repository     : Zabbix Official Repository\n\
                        Name           : zabbix-agent2\n\
                        Version        : 7.0.13-release1.sles15\n\
                        Arch           : x86_64\n";

    #[test]
    fn test_release_url_uses_sles_layout() {
        assert_eq!(
            strategy().release_url(),
            "https://repo.zabbix.com/zabbix/7.0/sles/15/noarch/zabbix-release-latest-7.0.sles15.noarch.rpm"
        );
    }

    #[test]
    fn test_parse_info_version() {
        assert_eq!(
            parse_info_version(INFO).as_deref(),
            Some("7.0.13-release1.sles15")
        );
        assert_eq!(parse_info_version("no such package"), None);
    }

    #[test]
    fn test_locate_artifact_confirms_existence() {
        let runner = FakeRunner::new().on("zypper --non-interactive --quiet info", ok_output(INFO));
        let url = "https://repo.zabbix.com/zabbix/7.0/sles/15/x86_64/zabbix-agent2-7.0.13-release1.sles15.x86_64.rpm";
        let fetcher = FakeFetcher::new().with_existing(&[url]);

        assert_eq!(
            strategy().locate_artifact("zabbix-agent2", &runner, &fetcher),
            vec![url.to_string()]
        );
    }

    #[test]
    fn test_locate_artifact_empty_when_absent_upstream() {
        let runner = FakeRunner::new().on("zypper --non-interactive --quiet info", ok_output(INFO));
        let fetcher = FakeFetcher::new();

        assert!(
            strategy()
                .locate_artifact("zabbix-agent2", &runner, &fetcher)
                .is_empty()
        );
    }

    #[test]
    fn test_parse_plugin_listing_table() {
        let stdout = "S | Name                            | Summary                  | Type\n\
                      --+---------------------------------+--------------------------+--------\n\
                      \u{20} | zabbix-agent2-plugin-mongodb    | MongoDB monitoring       | package\n\
                      i | zabbix-agent2-plugin-postgresql | PostgreSQL monitoring    | package\n";
        let plugins = strategy().parse_plugin_listing(stdout);
        assert_eq!(plugins.len(), 2);
        assert!(plugins.contains("zabbix-agent2-plugin-postgresql"));
    }
}
