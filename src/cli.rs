//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::Parser;
use std::path::PathBuf;

/// zagent - Zabbix Agent 2 provisioner
///
/// Provision, configure and verify Zabbix Agent 2 on the host it runs on.
#[derive(Parser, Debug)]
#[command(
    name = "zagent",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Zabbix Agent 2 provisioner",
    long_about = "zagent selects the first reachable Zabbix server from a candidate list, \
                  installs Zabbix Agent 2 (plus any discoverable plugin packages) through \
                  the native package manager with a direct-download fallback, writes the \
                  agent configuration, and brings the service to a verified running state.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  zagent --servers zbx1.example.com,zbx2.example.com\n    \
                  zagent --servers 10.0.0.5 --host-metadata db-tier\n    \
                  ZAGENT_SERVERS=zbx.example.com zagent --json\n\n\
                  \x1b[1m\x1b[32mDocumentation:\x1b[0m\n    \
                  https://github.com/asyrjasalo/zagent"
)]
pub struct Cli {
    /// Candidate Zabbix servers, probed in order (comma-separated)
    #[arg(
        long,
        short = 's',
        env = "ZAGENT_SERVERS",
        value_delimiter = ',',
        default_value = "zabbix",
        value_name = "HOST"
    )]
    pub servers: Vec<String>,

    /// Server trapper port used for the liveness probe and ServerActive
    #[arg(long, env = "ZAGENT_SERVER_PORT", default_value_t = 10051)]
    pub server_port: u16,

    /// Agent listen port (defaults to the server port minus one)
    #[arg(long, env = "ZAGENT_LISTEN_PORT", value_name = "PORT")]
    pub listen_port: Option<u16>,

    /// Agent DebugLevel (0-5)
    #[arg(long, env = "ZAGENT_DEBUG_LEVEL", default_value_t = 3)]
    pub debug_level: u8,

    /// HostMetadata tag used by the server for auto-registration
    #[arg(long, env = "ZAGENT_HOST_METADATA", default_value = "zagent")]
    pub host_metadata: String,

    /// Zabbix release series to install (e.g. 7.0)
    #[arg(long, env = "ZAGENT_VERSION", default_value = "7.0", value_name = "SERIES")]
    pub agent_version: String,

    /// Agent configuration file (defaults to the family's standard path)
    #[arg(long, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// Run transcript file
    #[arg(long, value_name = "PATH", default_value = "/var/log/zagent.log")]
    pub log_file: PathBuf,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::try_parse_from(["zagent"]).unwrap();
        assert_eq!(cli.servers, vec!["zabbix"]);
        assert_eq!(cli.server_port, 10051);
        assert_eq!(cli.listen_port, None);
        assert_eq!(cli.debug_level, 3);
        assert_eq!(cli.host_metadata, "zagent");
        assert_eq!(cli.agent_version, "7.0");
        assert!(!cli.json);
    }

    #[test]
    fn test_cli_parsing_server_list() {
        let cli = Cli::try_parse_from(["zagent", "--servers", "zbx1,zbx2,zbx3"]).unwrap();
        assert_eq!(cli.servers, vec!["zbx1", "zbx2", "zbx3"]);
    }

    #[test]
    fn test_cli_parsing_short_server_flag() {
        let cli = Cli::try_parse_from(["zagent", "-s", "10.0.0.5"]).unwrap();
        assert_eq!(cli.servers, vec!["10.0.0.5"]);
    }

    #[test]
    fn test_cli_parsing_ports() {
        let cli = Cli::try_parse_from([
            "zagent",
            "--server-port",
            "10551",
            "--listen-port",
            "10550",
        ])
        .unwrap();
        assert_eq!(cli.server_port, 10551);
        assert_eq!(cli.listen_port, Some(10550));
    }

    #[test]
    fn test_cli_parsing_invalid_port() {
        assert!(Cli::try_parse_from(["zagent", "--server-port", "not-a-port"]).is_err());
    }

    #[test]
    fn test_cli_parsing_config_override() {
        let cli = Cli::try_parse_from(["zagent", "--config-path", "/tmp/agent.conf"]).unwrap();
        assert_eq!(cli.config_path, Some(PathBuf::from("/tmp/agent.conf")));
    }

    #[test]
    fn test_cli_parsing_json_flag() {
        let cli = Cli::try_parse_from(["zagent", "--json"]).unwrap();
        assert!(cli.json);
    }
}
