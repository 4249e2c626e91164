//! Run preconditions
//!
//! Checked before any network or mutating action: the process must be
//! elevated and the host must have enough free disk for package downloads.
//! Both checks shell out through the command runner so they are scriptable
//! in tests.

use crate::error::{Result, ZagentError};
use crate::exec::{CommandRunner, CommandSpec};

/// Minimum free space at /var for package downloads and caches
const MIN_FREE_KB: u64 = 200 * 1024;

/// Verify elevated privileges and free disk space
pub fn check(runner: &dyn CommandRunner) -> Result<()> {
    check_privileges(runner)?;
    check_disk_space(runner)
}

fn check_privileges(runner: &dyn CommandRunner) -> Result<()> {
    if cfg!(windows) {
        // net session only succeeds from an elevated shell
        let spec = CommandSpec::new("net", &["session"]);
        let elevated = runner.run(&spec).map(|out| out.success).unwrap_or(false);
        if !elevated {
            return Err(ZagentError::PreconditionFailed {
                reason: "an elevated shell is required".to_string(),
            });
        }
        return Ok(());
    }

    let spec = CommandSpec::new("id", &["-u"]);
    let uid = runner
        .run(&spec)
        .map_err(|e| ZagentError::PreconditionFailed {
            reason: format!("cannot determine effective uid: {e}"),
        })?;
    if uid.stdout.trim() != "0" {
        return Err(ZagentError::PreconditionFailed {
            reason: "root privileges are required".to_string(),
        });
    }
    Ok(())
}

fn check_disk_space(runner: &dyn CommandRunner) -> Result<()> {
    if cfg!(windows) {
        // msiexec manages its own cache; no portable df equivalent
        return Ok(());
    }

    let spec = CommandSpec::new("df", &["-Pk", "/var"]);
    let Ok(out) = runner.run(&spec) else {
        // df missing is not worth failing the run over
        return Ok(());
    };
    if !out.success {
        return Ok(());
    }

    if let Some(available_kb) = parse_df_available_kb(&out.stdout) {
        if available_kb < MIN_FREE_KB {
            return Err(ZagentError::PreconditionFailed {
                reason: format!(
                    "insufficient free disk space: {available_kb} KB available, {MIN_FREE_KB} KB required"
                ),
            });
        }
    }
    Ok(())
}

/// POSIX `df -Pk` output, second line: filesystem blocks used available ...
fn parse_df_available_kb(text: &str) -> Option<u64> {
    text.lines()
        .nth(1)
        .and_then(|line| line.split_whitespace().nth(3))
        .and_then(|s| s.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FakeRunner, ok_output};

    const DF: &str = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
                      /dev/sda1         51474912  30000000  21474912      59% /var\n";

    const DF_FULL: &str = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
                           /dev/sda1         51474912  51374912    100000     100% /var\n";

    #[test]
    fn test_parse_df_available() {
        assert_eq!(parse_df_available_kb(DF), Some(21_474_912));
        assert_eq!(parse_df_available_kb("garbage"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_check_passes_for_root_with_space() {
        let runner = FakeRunner::new()
            .on("id -u", ok_output("0\n"))
            .on("df -Pk /var", ok_output(DF));
        assert!(check(&runner).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_check_rejects_non_root() {
        let runner = FakeRunner::new()
            .on("id -u", ok_output("1000\n"))
            .on("df -Pk /var", ok_output(DF));

        let err = check(&runner).unwrap_err();
        assert!(matches!(err, ZagentError::PreconditionFailed { .. }));
        assert!(err.to_string().contains("root"));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_rejects_full_disk() {
        let runner = FakeRunner::new()
            .on("id -u", ok_output("0\n"))
            .on("df -Pk /var", ok_output(DF_FULL));

        let err = check(&runner).unwrap_err();
        assert!(err.to_string().contains("disk space"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unparseable_df_is_tolerated() {
        let runner = FakeRunner::new()
            .on("id -u", ok_output("0\n"))
            .on("df -Pk /var", ok_output("something unexpected"));
        assert!(check(&runner).is_ok());
    }
}
