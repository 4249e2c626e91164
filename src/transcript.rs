//! Run transcript
//!
//! Every run appends timestamped lines to a well-known log file for
//! post-mortem review, while echoing styled status lines to the terminal.
//! Opening the transcript is best-effort: if the path is not writable the
//! run continues console-only.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use console::style;

/// Transcript sink for one provisioning run
pub struct Transcript {
    file: Option<File>,
}

impl Transcript {
    /// Open (or create) the transcript file in append mode
    pub fn open(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = OpenOptions::new().create(true).append(true).open(path).ok();
        if file.is_none() {
            eprintln!(
                "{} transcript not writable at {}, continuing without it",
                style("warning:").yellow().bold(),
                path.display()
            );
        }
        let mut transcript = Self { file };
        transcript.record("run", &format!("zagent {}", env!("CARGO_PKG_VERSION")));
        transcript
    }

    /// A transcript that only echoes to the console
    #[allow(dead_code)] // Used in tests
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Announce a pipeline stage
    pub fn step(&mut self, message: &str) {
        println!("{} {}", style("==>").cyan().bold(), style(message).bold());
        self.record("step", message);
    }

    /// Informational detail under the current stage
    pub fn info(&mut self, message: &str) {
        println!("    {message}");
        self.record("info", message);
    }

    /// Non-fatal degradation
    pub fn warn(&mut self, message: &str) {
        eprintln!("{} {}", style("warning:").yellow().bold(), message);
        self.record("warn", message);
    }

    fn record(&mut self, level: &str, message: &str) {
        if let Some(file) = self.file.as_mut() {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "{stamp} [{level}] {message}");
        }
    }
}
