//! `anwdlctl stop` — signal a running server to stop.
//!
//! This binary only runs a server in the foreground (`start`); there is no
//! resident daemon process for `stop`/`restart` to reach out to yet, so
//! these remain thin placeholders naming the intended interface.

use clap::Args;

use crate::output;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the running server cannot be signalled.
pub fn execute(json: bool, _args: StopArgs) -> anyhow::Result<()> {
    tracing::info!("stop requested");
    output::emit(
        json,
        false,
        "no resident daemon to signal; interrupt the foreground `start` process instead",
        serde_json::json!({}),
    );
    Ok(())
}
