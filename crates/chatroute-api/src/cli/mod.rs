//! CLI command definitions for the `chatroute` binary.

pub mod ask;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Route chat messages across LLM providers with key rotation and offline fallback.
#[derive(Parser)]
#[command(name = "chatroute", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Path to the router config file.
    #[arg(long, global = true, env = "CHATROUTE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the chosen verbosity; `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,chatroute=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Send one message through the router and print the reply.
    Ask {
        /// The user's message.
        message: String,

        /// Module the message comes from (e.g. home, clientes, vendas).
        #[arg(short, long, default_value = "home")]
        module: String,

        /// Tenant id forwarded with the request.
        #[arg(long, default_value = "")]
        tenant: String,

        /// User id forwarded with the request.
        #[arg(long, default_value = "")]
        user: String,
    },

    /// Show configured providers and credential health.
    Status {
        /// Send a minimal prompt with each live credential.
        #[arg(long)]
        probe: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_defaults_to_home_module() {
        let cli = Cli::try_parse_from(["chatroute", "ask", "Oi"]).unwrap();
        match cli.command {
            Commands::Ask { message, module, .. } => {
                assert_eq!(message, "Oi");
                assert_eq!(module, "home");
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_verbosity_filters() {
        let cli = Cli::try_parse_from(["chatroute", "-vv", "status"]).unwrap();
        assert_eq!(cli.log_filter(), "trace");
        let cli = Cli::try_parse_from(["chatroute", "--quiet", "status", "--probe"]).unwrap();
        assert_eq!(cli.log_filter(), "error");
    }
}
