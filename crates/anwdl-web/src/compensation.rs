//! Compensates for a `Create` response that never finished reaching the
//! client: the equivalent of the original implementation's `end()` error
//! path in `_create_deferred_http_request_handle`, which tore down a
//! freshly-provisioned container rather than leave the client holding
//! credentials it never actually received.
//!
//! axum builds a response body independently of whether it is ever fully
//! written to the socket; a disconnected client simply causes the body
//! stream to be dropped without being polled to completion. `CompensationGuard`
//! rides along inside that stream and only stands down once the stream has
//! been drained, so a dropped-without-finishing stream triggers teardown.

use std::sync::Arc;
use std::task::Poll;

use bytes::Bytes;
use serde_json::Map;
use uuid::Uuid;

use anwdl_protocol::{Request, Verb};
use anwdl_server::Engine;

/// Tears down a container on `Drop` unless [`CompensationGuard::mark_delivered`]
/// was called first.
pub struct CompensationGuard {
    engine: Arc<Engine>,
    container_uuid: Uuid,
    client_token: String,
    delivered: bool,
}

impl CompensationGuard {
    /// Arms a guard for a container that was just provisioned.
    #[must_use]
    pub fn new(engine: Arc<Engine>, container_uuid: Uuid, client_token: String) -> Self {
        Self {
            engine,
            container_uuid,
            client_token,
            delivered: false,
        }
    }

    /// Disarms the guard: the response reached the client, nothing to undo.
    pub fn mark_delivered(&mut self) {
        self.delivered = true;
    }
}

impl Drop for CompensationGuard {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        let engine = Arc::clone(&self.engine);
        let mut parameters = Map::new();
        parameters.insert(
            "container_uuid".to_string(),
            serde_json::json!(self.container_uuid.to_string()),
        );
        parameters.insert(
            "client_token".to_string(),
            serde_json::json!(self.client_token.clone()),
        );
        let request = Request {
            verb: Verb::Destroy,
            parameters,
        };
        let container_uuid = self.container_uuid;
        tracing::warn!(
            %container_uuid,
            "CREATE response never reached the client, tearing down the container"
        );
        std::thread::spawn(move || {
            let _ = engine.handle_request(&request);
        });
    }
}

/// Wraps `payload` in a one-shot response body that disarms `guard` once the
/// body has been fully drained by the HTTP layer.
pub fn compensating_body(payload: Vec<u8>, guard: CompensationGuard) -> axum::body::Body {
    let mut payload = Some(Bytes::from(payload));
    let mut guard = Some(guard);
    let stream = futures::stream::poll_fn(move |_cx| -> Poll<Option<std::io::Result<Bytes>>> {
        if let Some(chunk) = payload.take() {
            Poll::Ready(Some(Ok(chunk)))
        } else {
            if let Some(mut g) = guard.take() {
                g.mark_delivered();
            }
            Poll::Ready(None)
        }
    });
    axum::body::Body::from_stream(stream)
}
