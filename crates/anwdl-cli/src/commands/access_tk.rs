//! `anwdlctl access-tk` — manage access tokens gating the HTTP/binary
//! surfaces, a thin wrapper over `anwdl-accesstoken`'s store.

use clap::{Args, Subcommand};

use anwdl_accesstoken::AccessTokenStore;
use anwdl_common::config::ServerConfig;

use crate::output;

/// Arguments for the `access-tk` command.
#[derive(Args, Debug)]
pub struct AccessTkArgs {
    /// Sub-action to perform.
    #[command(subcommand)]
    pub action: AccessTkAction,
}

/// Access-token sub-actions.
#[derive(Subcommand, Debug)]
pub enum AccessTkAction {
    /// Issues a new access token.
    Add {
        /// Issue the token already disabled.
        #[arg(long)]
        disabled: bool,
    },
    /// Re-enables a disabled token.
    Enable {
        /// Entry id to enable.
        entry_id: i64,
    },
    /// Disables a token without deleting it.
    Disable {
        /// Entry id to disable.
        entry_id: i64,
    },
    /// Permanently removes a token.
    Remove {
        /// Entry id to remove.
        entry_id: i64,
    },
    /// Lists every stored token entry.
    List,
}

/// Executes an `access-tk` sub-action.
///
/// # Errors
///
/// Returns an error if the configuration or the token store cannot be opened,
/// or if the requested entry does not exist.
pub fn execute(config_path: &str, json: bool, args: AccessTkArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(config_path)?;
    let config = ServerConfig::from_yaml(&text)?;
    let Some(db_path) = config.access_token.database_path else {
        anyhow::bail!("access_token.database_path is not set in the configuration");
    };
    let store = AccessTokenStore::open(db_path)?;

    match args.action {
        AccessTkAction::Add { disabled } => {
            let (entry_id, created_at, token) = store.add_entry(disabled)?;
            output::emit(
                json,
                true,
                "access token issued",
                serde_json::json!({ "entry_id": entry_id, "created_at": created_at, "token": token }),
            );
        }
        AccessTkAction::Enable { entry_id } => {
            store.enable_entry(entry_id)?;
            output::emit(json, true, "access token enabled", serde_json::json!({ "entry_id": entry_id }));
        }
        AccessTkAction::Disable { entry_id } => {
            store.disable_entry(entry_id)?;
            output::emit(json, true, "access token disabled", serde_json::json!({ "entry_id": entry_id }));
        }
        AccessTkAction::Remove { entry_id } => {
            store.delete_entry(entry_id)?;
            output::emit(json, true, "access token removed", serde_json::json!({ "entry_id": entry_id }));
        }
        AccessTkAction::List => {
            let entries = store.list_entries()?;
            let data = serde_json::json!(entries
                .into_iter()
                .map(|(entry_id, created_at, enabled)| {
                    serde_json::json!({ "entry_id": entry_id, "created_at": created_at, "enabled": enabled })
                })
                .collect::<Vec<_>>());
            output::emit(json, true, "access tokens listed", data);
        }
    }
    Ok(())
}
