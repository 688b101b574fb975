use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "transcript-relay",
    about = "Transcript Relay - Serve YouTube transcripts as JSON through rotating authenticated proxies",
    version,
    long_about = "An HTTP relay that fetches YouTube transcripts on behalf of clients such as browser extensions. Each request is routed through a proxy picked at random from a list downloaded once at startup."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a YAML config file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// URL serving host:port:username:password proxy lines
    #[arg(long, global = true, env = "PROXY_LIST_URL", value_name = "URL", hide_env_values = true)]
    pub proxy_url: Option<String>,

    /// Address to bind
    #[arg(long, global = true, value_name = "IP")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Download the proxy list and print the parsed endpoints
    Proxies,
}

impl Cli {
    /// Subcommand to run, falling back to `serve`
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
