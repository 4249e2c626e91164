//! Plugin package discovery
//!
//! Asks the family's package index for every package matching the agent's
//! plugin naming convention. Discovery is an enhancement: any failure
//! (missing index, query error, no results) degrades to an empty set and
//! the run continues with the bare agent.

use std::collections::BTreeSet;

use crate::exec::CommandRunner;
use crate::strategy::PackageStrategy;
use crate::transcript::Transcript;

/// Discover installable plugin packages, best-effort
pub fn discover_plugins(
    strategy: &PackageStrategy,
    runner: &dyn CommandRunner,
    transcript: &mut Transcript,
) -> BTreeSet<String> {
    let Some(query) = strategy.plugin_query() else {
        return BTreeSet::new();
    };

    match runner.run(&query) {
        Ok(out) if out.success => strategy.parse_plugin_listing(&out.stdout),
        Ok(out) => {
            transcript.warn(&format!(
                "plugin discovery failed ({}); continuing without plugins",
                out.error_line()
            ));
            BTreeSet::new()
        }
        Err(e) => {
            transcript.warn(&format!(
                "plugin discovery failed ({e}); continuing without plugins"
            ));
            BTreeSet::new()
        }
    }
}
