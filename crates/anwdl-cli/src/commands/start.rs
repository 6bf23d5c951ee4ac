//! `anwdlctl start` — load configuration, bring up the hypervisor driver,
//! and run the session server in the foreground.

use std::fs;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use clap::Args;

use anwdl_accesstoken::AccessTokenStore;
use anwdl_common::config::ServerConfig;
use anwdl_crypto::RsaWrapper;
use anwdl_server::Engine;
use anwdl_virt::{HypervisorDriver, LibvirtDriver};

use crate::output;

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {}

/// Loads `config.server.rsa_key_path` if present, else generates and
/// persists a fresh keypair, else (no path configured at all) generates an
/// ephemeral one that is never written to disk.
fn load_or_generate_rsa(config: &ServerConfig) -> anyhow::Result<RsaWrapper> {
    let Some(key_path) = &config.server.rsa_key_path else {
        tracing::warn!("server.rsa_key_path is not set; generating an ephemeral key for this run");
        return Ok(RsaWrapper::generate(config.server.rsa_key_size)?);
    };

    if fs::metadata(key_path).is_ok() {
        let pem = fs::read_to_string(key_path)?;
        tracing::info!(path = %key_path, "loaded RSA identity");
        return Ok(RsaWrapper::from_private_pem(&pem)?);
    }

    let rsa = RsaWrapper::generate(config.server.rsa_key_size)?;
    fs::write(key_path, rsa.to_private_pem()?)?;
    fs::set_permissions(key_path, fs::Permissions::from_mode(0o600))?;
    tracing::info!(path = %key_path, "generated and persisted RSA identity");
    Ok(rsa)
}

fn build_hypervisor(_config: &ServerConfig) -> anyhow::Result<Arc<dyn HypervisorDriver>> {
    Ok(Arc::new(LibvirtDriver::new()))
}

/// Executes the `start` command: runs the binary-protocol server, and the
/// HTTP surface alongside it if `web_server` is configured, until interrupted.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the RSA identity
/// cannot be loaded/generated, the hypervisor cannot be reached, the access
/// token store cannot be opened, or either listener cannot be bound.
pub fn execute(config_path: &str, json: bool, _args: StartArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(config_path)?;
    let config = ServerConfig::from_yaml(&text)?;

    let rsa = load_or_generate_rsa(&config)?;
    let hypervisor = build_hypervisor(&config)?;
    let access_tokens = match &config.access_token.database_path {
        Some(path) => Some(AccessTokenStore::open(path)?),
        None => None,
    };

    let engine = Arc::new(Engine::new(&config, rsa, hypervisor, access_tokens)?);

    let handler_engine = Arc::clone(&engine);
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, shutting down");
        handler_engine.stop(false);
    })?;

    if let Some(web_config) = config.web_server.clone() {
        let web_engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(error) => {
                    tracing::error!(%error, "failed to start HTTP runtime");
                    return;
                }
            };
            if let Err(error) = runtime.block_on(anwdl_web::serve(&web_config, web_engine)) {
                tracing::error!(%error, "HTTP surface exited with an error");
            }
        });
    }

    let bind = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&bind)?;
    tracing::info!(%bind, "binary protocol listener bound");

    output::emit(json, true, "server starting", serde_json::json!({ "bind_address": bind }));

    engine.accept_loop(listener)?;
    Ok(())
}
