//! Test fixtures and utilities for reducing test setup duplication.
//!
//! Scripted fakes for the three external seams (reachability probe, command
//! runner, artifact fetcher) so component and pipeline tests run without a
//! network, a package manager, or root.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::collector::ReachabilityProbe;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::fetch::ArtifactFetcher;

/// A successful command result with the given stdout
pub fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// A failed command result with the given stderr
pub fn fail_output(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Probe fake that records every host it is asked about
pub struct RecordingProbe {
    reachable: BTreeSet<String>,
    probed: RefCell<Vec<String>>,
}

impl RecordingProbe {
    pub fn reachable(hosts: &[&str]) -> Self {
        Self {
            reachable: hosts.iter().map(|h| (*h).to_string()).collect(),
            probed: RefCell::new(Vec::new()),
        }
    }

    /// Hosts probed, in order
    pub fn probed(&self) -> Vec<String> {
        self.probed.borrow().clone()
    }
}

impl ReachabilityProbe for RecordingProbe {
    fn is_reachable(&self, host: &str, _port: u16, _timeout: Duration) -> bool {
        self.probed.borrow_mut().push(host.to_string());
        self.reachable.contains(host)
    }
}

/// Command runner fake scripted by command-line prefix.
///
/// The first rule whose prefix matches the rendered command wins; unmatched
/// commands return the configured default. A rule scripted with a sequence
/// yields its outputs in order and then repeats the last one. Every
/// invocation is recorded.
pub struct FakeRunner {
    rules: Vec<(String, RefCell<Vec<CommandOutput>>)>,
    default: CommandOutput,
    calls: RefCell<Vec<String>>,
}

impl FakeRunner {
    /// A runner where every unmatched command fails
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: fail_output(1, "unscripted command"),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// A runner where every unmatched command succeeds with empty output
    pub fn permissive() -> Self {
        Self {
            rules: Vec::new(),
            default: ok_output(""),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn on(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.rules.push((prefix.to_string(), RefCell::new(vec![output])));
        self
    }

    /// Script successive outputs for a command prefix
    pub fn on_seq(mut self, prefix: &str, outputs: Vec<CommandOutput>) -> Self {
        self.rules.push((prefix.to_string(), RefCell::new(outputs)));
        self
    }

    /// Rendered command lines, in invocation order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Whether any recorded command starts with `prefix`
    pub fn ran(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        let rendered = spec.to_string();
        self.calls.borrow_mut().push(rendered.clone());
        let output = self
            .rules
            .iter()
            .find(|(prefix, _)| rendered.starts_with(prefix))
            .map(|(_, outputs)| {
                let mut outputs = outputs.borrow_mut();
                if outputs.len() > 1 {
                    outputs.remove(0)
                } else {
                    outputs[0].clone()
                }
            })
            .unwrap_or_else(|| self.default.clone());
        Ok(output)
    }
}

/// Fetcher fake: `exists` answers from a fixed set, `download` writes a
/// placeholder file unless the URL is scripted to fail
pub struct FakeFetcher {
    existing: BTreeSet<String>,
    failing: BTreeSet<String>,
    downloads: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            existing: BTreeSet::new(),
            failing: BTreeSet::new(),
            downloads: RefCell::new(Vec::new()),
        }
    }

    pub fn with_existing(mut self, urls: &[&str]) -> Self {
        self.existing = urls.iter().map(|u| (*u).to_string()).collect();
        self
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// URLs downloaded, in order
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl ArtifactFetcher for FakeFetcher {
    fn download(&self, url: &str, dest: &Path) -> io::Result<()> {
        self.downloads.borrow_mut().push(url.to_string());
        if self.failing.contains(url) {
            return Err(io::Error::other(format!("scripted failure for {url}")));
        }
        std::fs::write(dest, b"artifact")
    }

    fn exists(&self, url: &str) -> bool {
        self.existing.contains(url)
    }
}
