//! Agent configuration rendering and writing
//!
//! The configuration is a flat `Key=Value` file rendered fully in memory
//! before anything touches disk, so a failed render can never leave a
//! partial file behind. An existing file is copied verbatim to a
//! timestamp-suffixed backup first; the backup is informational and never
//! blocks the overwrite. The write itself goes through a temp file in the
//! target directory plus an atomic rename.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::collector::CollectorSelection;
use crate::error::{Result, ZagentError};
use crate::settings::Settings;
use crate::transcript::Transcript;

/// Per-family path defaults baked into the rendered configuration
#[derive(Debug, Clone)]
pub struct ConfigDefaults {
    pub pid_file: Option<&'static str>,
    pub log_file: &'static str,
    pub include: &'static [&'static str],
}

/// Ordered agent configuration, deterministic for given inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    entries: Vec<(String, String)>,
}

impl AgentConfig {
    /// Assemble the configuration from the selected server, the run
    /// settings and the family defaults
    pub fn build(
        selection: &CollectorSelection,
        settings: &Settings,
        defaults: &ConfigDefaults,
    ) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut push = |key: &str, value: String| entries.push((key.to_string(), value));

        if let Some(pid_file) = defaults.pid_file {
            push("PidFile", pid_file.to_string());
        }
        push("LogFile", defaults.log_file.to_string());
        push("LogFileSize", "0".to_string());
        push("DebugLevel", settings.debug_level.to_string());
        push("Server", selection.host.clone());
        push("ServerActive", selection.to_string());
        push("ListenPort", settings.listen_port.to_string());
        push("HostnameItem", "system.hostname".to_string());
        push("HostMetadata", settings.host_metadata.clone());
        push("RefreshActiveChecks", "120".to_string());
        push("BufferSend", "5".to_string());
        push("BufferSize", "100".to_string());
        push("Timeout", "10".to_string());
        push("AllowKey", "system.run[*]".to_string());
        for include in defaults.include {
            push("Include", (*include).to_string());
        }

        Self { entries }
    }

    /// Render to the flat key=value format. Identical inputs produce
    /// byte-identical output.
    pub fn render(&self) -> String {
        let mut out = String::from("# Managed by zagent; re-provisioning overwrites this file.\n");
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Write the rendered configuration to `path`, backing up any existing
    /// file first. Returns the backup path when one was made.
    pub fn write(&self, path: &Path, transcript: &mut Transcript) -> Result<Option<PathBuf>> {
        let rendered = self.render();
        let backup = back_up_existing(path, transcript);

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| ZagentError::FileWriteFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            ZagentError::FileWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        temp.write_all(rendered.as_bytes())
            .map_err(|e| ZagentError::FileWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        temp.persist(path).map_err(|e| ZagentError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(backup)
    }
}

/// Copy a pre-existing file to a timestamp-suffixed sibling. Best-effort:
/// failure is noted and the overwrite proceeds.
fn back_up_existing(path: &Path, transcript: &mut Transcript) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }

    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let backup = PathBuf::from(format!("{}.{stamp}.bak", path.display()));
    match std::fs::copy(path, &backup) {
        Ok(_) => {
            transcript.info(&format!("existing configuration saved to {}", backup.display()));
            Some(backup)
        }
        Err(e) => {
            transcript.warn(&format!(
                "could not back up {}: {e}; overwriting anyway",
                path.display()
            ));
            None
        }
    }
}
