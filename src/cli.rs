use clap::{Args, Parser, Subcommand};
use std::{net::IpAddr, path::PathBuf};

/// Command line interface for the service control panel.
#[derive(Parser, Debug)]
#[command(
    name = "svcpanel",
    version,
    about = "Start, stop, and watch one managed service over ubus",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    /// Path to the panel config TOML (defaults to ~/.config/svcpanel/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Query the service once and show state and available controls.")]
    Status,
    #[command(about = "Start the service and wait for it to come up.")]
    Start,
    #[command(about = "Stop the service and wait for it to go down.")]
    Stop,
    #[command(about = "Restart the service and wait for it to come back up.")]
    Restart,
    #[command(
        about = "Keep the panel open and print every state change.",
        long_about = "Polls the service on the heartbeat interval and prints the panel whenever the observed state, lock, or controls change. Exit with Ctrl-C."
    )]
    Watch,
    #[command(
        about = "Serve the panel over HTTP.",
        long_about = "Exposes the panel state, action endpoints, and a server-sent event stream of panel changes."
    )]
    Serve(ServeOpts),
    #[command(about = "Print the URL of the service's own web interface.")]
    WebUi,
}

#[derive(Args, Debug, Clone)]
pub struct ServeOpts {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// TCP port for the HTTP interface.
    #[arg(long, default_value_t = 9060)]
    pub port: u16,
}
