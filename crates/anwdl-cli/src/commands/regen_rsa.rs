//! `anwdlctl regen-rsa` — regenerate the server's RSA identity.

use std::fs;
use std::os::unix::fs::PermissionsExt;

use clap::Args;

use anwdl_common::config::ServerConfig;
use anwdl_crypto::RsaWrapper;

use crate::output;

/// Arguments for the `regen-rsa` command.
#[derive(Args, Debug)]
pub struct RegenRsaArgs {}

/// Executes the `regen-rsa` command: generates a fresh keypair and
/// overwrites the path named by `server.rsa_key_path`.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, no key path is
/// configured, key generation fails, or the file cannot be written.
pub fn execute(config_path: &str, json: bool, _args: RegenRsaArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(config_path)?;
    let config = ServerConfig::from_yaml(&text)?;

    let Some(key_path) = config.server.rsa_key_path.clone() else {
        anyhow::bail!("server.rsa_key_path is not set in the configuration");
    };

    let rsa = RsaWrapper::generate(config.server.rsa_key_size)?;
    fs::write(&key_path, rsa.to_private_pem()?)?;
    fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600))?;

    tracing::info!(path = %key_path, "regenerated RSA identity");
    output::emit(
        json,
        true,
        "RSA identity regenerated",
        serde_json::json!({ "path": key_path }),
    );
    Ok(())
}
