//! Command execution seam
//!
//! All package-manager and service-manager interaction goes through
//! [`CommandRunner`] so the orchestration logic can be exercised against
//! scripted fakes. [`SystemRunner`] is the production implementation over
//! `std::process::Command` with captured output.

use std::fmt;
use std::io;
use std::process::Command;

/// A fully-specified external command invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            envs: Vec::new(),
        }
    }

    /// Add an environment variable for the child process
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// Append an argument
    pub fn arg(mut self, value: &str) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Append arguments
    pub fn args_from(mut self, values: &[String]) -> Self {
        self.args.extend(values.iter().cloned());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a completed command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// The most useful single line for an error message
    pub fn error_line(&self) -> String {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no output")
            .to_string()
    }
}

/// Executes external commands
pub trait CommandRunner {
    /// Run to completion, capturing output. `Err` means the command could
    /// not be spawned at all; a non-zero exit is an `Ok` with `success: false`.
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Production runner over `std::process::Command`
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        for (key, value) in &spec.envs {
            command.env(key, value);
        }

        let output = command.output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("apt-get", &["-y", "install"]).arg("zabbix-agent2");
        assert_eq!(spec.to_string(), "apt-get -y install zabbix-agent2");
    }

    #[test]
    fn test_command_spec_env_and_args_from() {
        let spec = CommandSpec::new("apt-get", &["install"])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .args_from(&["a".to_string(), "b".to_string()]);
        assert_eq!(spec.envs.len(), 1);
        assert_eq!(spec.args, vec!["install", "a", "b"]);
    }

    #[test]
    fn test_error_line_prefers_stderr() {
        let output = CommandOutput {
            success: false,
            code: Some(1),
            stdout: "context\n".to_string(),
            stderr: "\nE: Unable to locate package\n".to_string(),
        };
        assert_eq!(output.error_line(), "E: Unable to locate package");
    }

    #[test]
    fn test_error_line_without_output() {
        let output = CommandOutput {
            success: false,
            code: Some(2),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(output.error_line(), "no output");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_output() {
        let spec = CommandSpec::new("sh", &["-c", "echo out; echo err >&2"]);
        let output = SystemRunner.run(&spec).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_nonzero_exit_is_ok() {
        let spec = CommandSpec::new("sh", &["-c", "exit 3"]);
        let output = SystemRunner.run(&spec).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
    }

    #[test]
    fn test_system_runner_missing_program_is_err() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-zagent", &[]);
        assert!(SystemRunner.run(&spec).is_err());
    }
}
