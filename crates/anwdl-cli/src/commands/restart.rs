//! `anwdlctl restart` — signal a running server to restart.
//!
//! See [`crate::commands::stop`]'s module doc: there is no resident daemon
//! yet for this command to reach.

use clap::Args;

use crate::output;

/// Arguments for the `restart` command.
#[derive(Args, Debug)]
pub struct RestartArgs {}

/// Executes the `restart` command.
///
/// # Errors
///
/// Returns an error if the running server cannot be signalled.
pub fn execute(json: bool, _args: RestartArgs) -> anyhow::Result<()> {
    tracing::info!("restart requested");
    output::emit(
        json,
        false,
        "no resident daemon to signal; stop the foreground `start` process and run it again",
        serde_json::json!({}),
    );
    Ok(())
}
