//! Windows strategy
//!
//! There is no repository mechanism: the primary path downloads the agent
//! MSI from the binaries CDN and installs it silently with msiexec. Plugin
//! discovery has no package index to query, so the plugin set is always
//! empty (the MSI bundles the stock plugins). Fallback resolution is the
//! same MSI location, confirmed with an existence check.

use std::io;
use std::path::{Path, PathBuf};

use crate::environ::{Arch, HostEnvironment};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::fetch::{ArtifactFetcher, filename_from_url};

use super::AGENT_PACKAGE;

/// Binaries CDN root for Windows agent builds
const CDN_BASE: &str = "https://cdn.zabbix.com/zabbix/binaries/stable";

#[derive(Debug, Clone)]
pub struct WindowsStrategy {
    version: String,
    arch: Arch,
}

impl WindowsStrategy {
    pub fn new(env: &HostEnvironment, series: &str) -> Self {
        // the CDN is addressed by full version; extend a bare series
        let version = if series.matches('.').count() >= 2 {
            series.to_string()
        } else {
            format!("{series}.0")
        };
        Self {
            version,
            arch: env.arch,
        }
    }

    pub fn msi_url(&self) -> String {
        let series = self
            .version
            .rsplit_once('.')
            .map(|(series, _)| series)
            .unwrap_or(&self.version);
        let arch = match self.arch {
            Arch::Aarch64 => "arm64",
            _ => "amd64",
        };
        format!(
            "{CDN_BASE}/{series}/{version}/zabbix_agent2-{version}-windows-{arch}-openssl.msi",
            version = self.version,
        )
    }

    pub fn register_repository(
        &self,
        _runner: &dyn CommandRunner,
        _fetcher: &dyn ArtifactFetcher,
        _scratch: &Path,
    ) -> Result<(), String> {
        // nothing to register; the MSI is fetched at install time
        Ok(())
    }

    pub fn install(
        &self,
        runner: &dyn CommandRunner,
        fetcher: &dyn ArtifactFetcher,
        scratch: &Path,
    ) -> io::Result<CommandOutput> {
        let url = self.msi_url();
        let dest = scratch.join(filename_from_url(&url));
        fetcher.download(&url, &dest)?;
        self.run_msiexec(runner, &dest)
    }

    pub fn locate_artifact(&self, package: &str, fetcher: &dyn ArtifactFetcher) -> Vec<String> {
        if package != AGENT_PACKAGE {
            return Vec::new();
        }
        let url = self.msi_url();
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
        let mut last = None;
        for file in files {
            let out = self.run_msiexec(runner, file)?;
            if !out.success {
                return Ok(out);
            }
            last = Some(out);
        }
        Ok(last.unwrap_or(CommandOutput {
            success: false,
            code: None,
            stdout: String::new(),
            stderr: "no artifacts to install".to_string(),
        }))
    }

    fn run_msiexec(&self, runner: &dyn CommandRunner, file: &Path) -> io::Result<CommandOutput> {
        runner.run(
            &CommandSpec::new("msiexec", &["/i"])
                .arg(&file.to_string_lossy())
                .arg("/qn")
                .arg("/norestart"),
        )
    }

    pub fn config_path(&self) -> PathBuf {
        PathBuf::from("C:\\Program Files\\Zabbix Agent 2\\zabbix_agent2.conf")
    }

    pub fn config_defaults(&self) -> crate::agent_config::ConfigDefaults {
        crate::agent_config::ConfigDefaults {
            pid_file: None,
            log_file: "C:\\Program Files\\Zabbix Agent 2\\zabbix_agent2.log",
            include: &["C:\\Program Files\\Zabbix Agent 2\\zabbix_agent2.d\\*.conf"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::{OsFamily, PackageManager};
    use crate::test_fixtures::{FakeFetcher, FakeRunner};
    use tempfile::TempDir;

    fn strategy(series: &str) -> WindowsStrategy {
        let env = HostEnvironment {
            family: OsFamily::Windows,
            distro_id: "windows".to_string(),
            version_full: String::new(),
            version_major: String::new(),
            codename: String::new(),
            arch: Arch::X86_64,
            package_manager: PackageManager::Msi,
        };
        WindowsStrategy::new(&env, series)
    }

    #[test]
    fn test_msi_url_from_full_version() {
        assert_eq!(
            strategy("7.0.13").msi_url(),
            "https://cdn.zabbix.com/zabbix/binaries/stable/7.0/7.0.13/zabbix_agent2-7.0.13-windows-amd64-openssl.msi"
        );
    }

    #[test]
    fn test_bare_series_is_extended() {
        assert_eq!(
            strategy("7.0").msi_url(),
            "https://cdn.zabbix.com/zabbix/binaries/stable/7.0/7.0.0/zabbix_agent2-7.0.0-windows-amd64-openssl.msi"
        );
    }

    #[test]
    fn test_locate_artifact_only_resolves_agent() {
        let fetcher = FakeFetcher::new().with_existing(&[&strategy("7.0.13").msi_url()]);
        let strategy = strategy("7.0.13");

        assert_eq!(strategy.locate_artifact("zabbix-agent2", &fetcher).len(), 1);
        assert!(
            strategy
                .locate_artifact("zabbix-agent2-plugin-mongodb", &fetcher)
                .is_empty()
        );
    }

    #[test]
    fn test_install_downloads_then_runs_msiexec() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::permissive();
        let fetcher = FakeFetcher::new();

        strategy("7.0.13")
            .install(&runner, &fetcher, temp.path())
            .unwrap();

        assert_eq!(fetcher.downloads().len(), 1);
        assert!(runner.ran("msiexec /i"));
    }
}
