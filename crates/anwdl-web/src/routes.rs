//! Route table: the same three verbs the binary protocol serves, addressed
//! by the uppercased last path segment instead of a frame's verb field.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::{Map, Value};

use anwdl_common::constants::APP_NAME;
use anwdl_protocol::{make_response, Request, Response as ProtoResponse, Verb};
use anwdl_server::Engine;

use crate::compensation::{compensating_body, CompensationGuard};

/// Builds the router: a banner at `/`, and every verb at its own path.
pub fn build_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(root_handler).post(root_handler))
        .route("/{*rest}", get(verb_handler).post(verb_handler))
        .with_state(engine)
}

async fn root_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn verb_handler(
    State(engine): State<Arc<Engine>>,
    Path(rest): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() != 1 {
        return bad_request("a request path must name exactly one verb");
    }

    let Ok(verb) = segments[0].to_ascii_uppercase().parse::<Verb>() else {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(make_response(
                false,
                "unknown verb",
                Map::new(),
                Some("path".to_string()),
            )),
        )
            .into_response();
    };

    let mut parameters = Map::new();
    for (key, value) in form {
        parameters.insert(key, Value::String(value));
    }
    let request = Request { verb, parameters };

    let blocking_engine = Arc::clone(&engine);
    let response = match tokio::task::spawn_blocking(move || blocking_engine.handle_request(&request)).await {
        Ok(response) => response,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(make_response(
                    false,
                    "internal error",
                    Map::new(),
                    Some("handler panicked".to_string()),
                )),
            )
                .into_response();
        }
    };

    if verb == Verb::Create && response.success {
        return build_compensating_response(engine, &response);
    }

    axum::Json(response).into_response()
}

fn bad_request(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(make_response(
            false,
            "bad request",
            Map::new(),
            Some(reason.to_string()),
        )),
    )
        .into_response()
}

/// Wraps a successful `CREATE` response in a body that tears down the
/// container if it never finishes reaching the client.
fn build_compensating_response(engine: Arc<Engine>, response: &ProtoResponse) -> Response {
    let (Some(uuid_str), Some(token)) = (
        response.data.get("container_uuid").and_then(Value::as_str),
        response.data.get("client_token").and_then(Value::as_str),
    ) else {
        return axum::Json(response.clone()).into_response();
    };
    let Ok(container_uuid) = uuid_str.parse() else {
        return axum::Json(response.clone()).into_response();
    };
    let Ok(payload) = serde_json::to_vec(response) else {
        return axum::Json(response.clone()).into_response();
    };

    let guard = CompensationGuard::new(engine, container_uuid, token.to_string());
    let body = compensating_body(payload, guard);

    match Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(body)
    {
        Ok(resp) => resp,
        Err(_) => axum::Json(response.clone()).into_response(),
    }
}
