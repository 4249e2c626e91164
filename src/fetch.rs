//! Artifact fetching
//!
//! [`ArtifactFetcher`] is the transport seam for repository-registration
//! artifacts and fallback package downloads. [`HttpFetcher`] implements it
//! with `ureq` (plain blocking HTTP fits the strictly sequential run model)
//! using a small fixed retry count before a download counts as failed.

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Number of attempts before a download is treated as a hard failure
const ATTEMPTS: u32 = 3;

/// Pause between retry attempts
const RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Retrieves remote artifacts
pub trait ArtifactFetcher {
    /// Download `url` to `dest`, retrying transient failures
    fn download(&self, url: &str, dest: &Path) -> io::Result<()>;

    /// Check whether `url` resolves to an artifact without downloading it
    fn exists(&self, url: &str) -> bool;
}

/// Production fetcher over blocking HTTP
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout(Duration::from_secs(600))
            .build();
        Self { agent }
    }

    fn try_download(&self, url: &str, dest: &Path) -> io::Result<()> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| io::Error::other(format!("GET {url}: {e}")))?;

        let total = response
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok());

        let bar = match total {
            Some(len) => {
                let style = ProgressStyle::default_bar()
                    .template("  [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                    .unwrap()
                    .progress_chars("#>-");
                let bar = ProgressBar::new(len);
                bar.set_style(style);
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        bar.set_message(filename_from_url(url).to_string());

        let mut reader = bar.wrap_read(response.into_reader());
        let mut file = File::create(dest)?;
        io::copy(&mut reader, &mut file)?;
        bar.finish_and_clear();
        Ok(())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn download(&self, url: &str, dest: &Path) -> io::Result<()> {
        let mut last_error = None;
        for attempt in 1..=ATTEMPTS {
            match self.try_download(url, dest) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < ATTEMPTS {
                        std::thread::sleep(RETRY_PAUSE);
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| io::Error::other("download failed")))
    }

    fn exists(&self, url: &str) -> bool {
        self.agent.head(url).call().is_ok()
    }
}

/// Final path segment of a URL, for scratch-file naming and progress labels
pub fn filename_from_url(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("artifact")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://repo.zabbix.com/pool/zabbix-release_latest_all.deb"),
            "zabbix-release_latest_all.deb"
        );
    }

    #[test]
    fn test_filename_from_url_trailing_slash() {
        assert_eq!(filename_from_url("https://repo.zabbix.com/pool/"), "pool");
    }

    #[test]
    fn test_filename_from_url_degenerate() {
        assert_eq!(filename_from_url(""), "artifact");
    }
}
