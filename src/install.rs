//! Agent installation
//!
//! Runs the primary install path (repository registration plus one package
//! manager invocation) and, when that fails, the fallback path: resolve
//! direct artifact locations through the package index, download them to a
//! scratch directory and install them locally. Either way the run only
//! proceeds once the agent package is verified present.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, ZagentError};
use crate::exec::CommandRunner;
use crate::fetch::{ArtifactFetcher, filename_from_url};
use crate::strategy::PackageStrategy;
use crate::transcript::Transcript;

/// What to install: the agent plus the discovered plugin set
#[derive(Debug, Clone)]
pub struct PackagePlan {
    pub primary: String,
    pub plugins: BTreeSet<String>,
}

impl PackagePlan {
    pub fn new(primary: &str, plugins: BTreeSet<String>) -> Self {
        Self {
            primary: primary.to_string(),
            plugins,
        }
    }

    /// Primary package first, then plugins in set order
    pub fn packages(&self) -> Vec<String> {
        std::iter::once(self.primary.clone())
            .chain(self.plugins.iter().cloned())
            .collect()
    }
}

/// Which route produced the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPath {
    Primary,
    Fallback,
}

impl fmt::Display for InstallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallPath::Primary => write!(f, "primary"),
            InstallPath::Fallback => write!(f, "fallback"),
        }
    }
}

/// Successful installation result
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub path: InstallPath,
    pub artifacts: Vec<String>,
    /// Non-fatal degradations worth surfacing in the summary
    pub warnings: Vec<String>,
}

/// Executes the install plan through a strategy
pub struct Installer<'a> {
    strategy: &'a PackageStrategy,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn ArtifactFetcher,
}

impl<'a> Installer<'a> {
    pub fn new(
        strategy: &'a PackageStrategy,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn ArtifactFetcher,
    ) -> Self {
        Self {
            strategy,
            runner,
            fetcher,
        }
    }

    pub fn run(&self, plan: &PackagePlan, transcript: &mut Transcript) -> Result<InstallOutcome> {
        let scratch = tempfile::tempdir().map_err(|e| ZagentError::InstallFailed {
            message: format!("cannot create scratch directory: {e}"),
        })?;

        let mut outcome = match self.try_primary(plan, scratch.path(), transcript) {
            Some(outcome) => outcome,
            None => self.fall_back(plan, scratch.path(), transcript)?,
        };

        outcome.warnings.extend(self.install_optional(transcript));
        Ok(outcome)
    }

    /// Primary path; `None` means fall back
    fn try_primary(
        &self,
        plan: &PackagePlan,
        scratch: &std::path::Path,
        transcript: &mut Transcript,
    ) -> Option<InstallOutcome> {
        if let Err(reason) = self
            .strategy
            .register_repository(self.runner, self.fetcher, scratch)
        {
            transcript.warn(&format!("repository registration failed: {reason}"));
            return None;
        }

        let packages = plan.packages();
        match self
            .strategy
            .install(self.runner, self.fetcher, scratch, &packages)
        {
            Ok(out) if out.success => {}
            Ok(out) => {
                let status = out.code.map_or("killed".to_string(), |c| c.to_string());
                transcript.warn(&format!(
                    "primary install failed (exit {status}): {}",
                    out.error_line()
                ));
                return None;
            }
            Err(e) => {
                transcript.warn(&format!("primary install failed: {e}"));
                return None;
            }
        }

        if !self.strategy.is_installed(self.runner) {
            transcript.warn("primary install reported success but the agent package is absent");
            return None;
        }

        Some(InstallOutcome {
            path: InstallPath::Primary,
            artifacts: packages,
            warnings: Vec::new(),
        })
    }

    /// Fallback path: resolve, download and locally install artifacts
    fn fall_back(
        &self,
        plan: &PackagePlan,
        scratch: &std::path::Path,
        transcript: &mut Transcript,
    ) -> Result<InstallOutcome> {
        transcript.step("falling back to direct artifact installation");

        let mut downloaded: Vec<PathBuf> = Vec::new();
        let mut artifacts: Vec<String> = Vec::new();

        for package in plan.packages() {
            let locations = self
                .strategy
                .locate_artifact(&package, self.runner, self.fetcher);
            let Some(url) = locations.first() else {
                transcript.info(&format!("no artifact location for {package}, skipping"));
                continue;
            };

            let dest = scratch.join(filename_from_url(url));
            match self.fetcher.download(url, &dest) {
                Ok(()) => {
                    transcript.info(&format!("downloaded {url}"));
                    downloaded.push(dest);
                    artifacts.push(url.clone());
                }
                Err(e) => {
                    transcript.warn(&format!("download failed for {package}: {e}"));
                }
            }
        }

        if downloaded.is_empty() {
            return Err(ZagentError::InstallFailed {
                message: "no artifacts could be resolved for direct installation".to_string(),
            });
        }

        match self.strategy.install_local(self.runner, &downloaded) {
            Ok(out) if !out.success => {
                // individual conflicts are tolerated; the presence check decides
                transcript.warn(&format!("local install reported: {}", out.error_line()));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(ZagentError::InstallFailed {
                    message: format!("local install could not run: {e}"),
                });
            }
        }

        if !self.strategy.is_installed(self.runner) {
            return Err(ZagentError::InstallFailed {
                message: format!("{} absent after fallback installation", plan.primary),
            });
        }

        Ok(InstallOutcome {
            path: InstallPath::Fallback,
            artifacts,
            warnings: Vec::new(),
        })
    }

    /// Install auxiliary packages; failures are logged and returned as
    /// summary warnings, never fatal
    fn install_optional(&self, transcript: &mut Transcript) -> Vec<String> {
        let mut warnings = Vec::new();
        for package in self.strategy.optional_packages() {
            let scratch = std::env::temp_dir();
            let result = self.strategy.install(
                self.runner,
                self.fetcher,
                &scratch,
                &[(*package).to_string()],
            );
            let failed = match result {
                Ok(out) if out.success => false,
                Ok(out) => {
                    transcript.warn(&format!(
                        "optional package {package} failed: {}",
                        out.error_line()
                    ));
                    true
                }
                Err(e) => {
                    transcript.warn(&format!("optional package {package} failed: {e}"));
                    true
                }
            };
            if failed {
                warnings.push(format!("optional package {package} was not installed"));
            }
        }
        warnings
    }
}
