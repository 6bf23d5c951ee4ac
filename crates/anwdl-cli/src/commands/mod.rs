//! CLI command definitions and dispatch.

pub mod access_tk;
pub mod regen_rsa;
pub mod restart;
pub mod start;
pub mod stop;

use clap::{Parser, Subcommand};

/// anwdlctl — ephemeral VM session server control.
#[derive(Parser, Debug)]
#[command(name = "anwdlctl", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the YAML configuration file.
    #[arg(long, global = true, default_value = "anwdl.yaml")]
    pub config: String,

    /// Emit a `{status, message, data}` JSON envelope instead of plain text.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the session server in the foreground.
    Start(start::StartArgs),
    /// Signal a running server to stop.
    Stop(stop::StopArgs),
    /// Signal a running server to restart.
    Restart(restart::RestartArgs),
    /// Manage access tokens gating the HTTP/binary surfaces.
    AccessTk(access_tk::AccessTkArgs),
    /// Regenerate the server's RSA identity.
    RegenRsa(regen_rsa::RegenRsaArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Start(args) => start::execute(&cli.config, cli.json, args),
        Command::Stop(args) => stop::execute(cli.json, args),
        Command::Restart(args) => restart::execute(cli.json, args),
        Command::AccessTk(args) => access_tk::execute(&cli.config, cli.json, args),
        Command::RegenRsa(args) => regen_rsa::execute(&cli.config, cli.json, args),
    }
}
