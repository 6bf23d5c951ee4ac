//! Binds and runs the HTTP/REST surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anwdl_common::config::WebServerConfig;
use anwdl_server::Engine;

use crate::error::{WebError, WebResult};
use crate::routes::build_router;

/// Runs the HTTP/REST surface on `config`'s bind address until the listener
/// itself errors. TLS is used when `config.enable_tls` is set.
pub async fn serve(config: &WebServerConfig, engine: Arc<Engine>) -> WebResult<()> {
    let app = build_router(engine);
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|_| WebError::InvalidBindAddress(config.bind_address.clone()))?;

    if config.enable_tls {
        let cert_path = config
            .tls_cert_path
            .as_deref()
            .ok_or(WebError::MissingTlsMaterial)?;
        let key_path = config
            .tls_key_path
            .as_deref()
            .ok_or(WebError::MissingTlsMaterial)?;
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(WebError::Tls)?;
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .map_err(WebError::Io)
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(WebError::Io)?;
        axum::serve(listener, app).await.map_err(WebError::Io)
    }
}
