//! zagent - Zabbix Agent 2 provisioner
//!
//! A single-binary tool that brings one host under monitoring: it selects a
//! live Zabbix server, installs Zabbix Agent 2 through the host's package
//! manager (with a direct-download fallback), writes the agent
//! configuration and verifies the service is running.

use clap::Parser;

mod agent_config;
mod cli;
mod collector;
mod environ;
mod error;
mod exec;
mod fetch;
mod install;
mod orchestrate;
mod plugins;
mod preflight;
mod service;
mod settings;
mod strategy;
#[cfg(test)]
mod test_fixtures;
mod transcript;

use cli::Cli;
use settings::Settings;

fn main() {
    let cli = Cli::parse();
    let settings = Settings::from_cli(cli);

    match orchestrate::run(&settings) {
        Ok(summary) => {
            if settings.json {
                println!("{}", summary.to_json());
            } else {
                summary.print_human();
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
