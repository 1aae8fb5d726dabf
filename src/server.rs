//! HTTP front: `GET /?url=...` relays a table, `GET /health` answers ok.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::proxy::{self, DataProxy, ErrorKind, Reply};
use crate::request::Output;
use crate::response::{ErrorBody, ErrorDetail, JSONP_CONTENT_TYPE};

pub fn router(proxy: DataProxy) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(Arc::new(proxy))
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let proxy = DataProxy::new(config.proxy.clone())?;
    let listener = TcpListener::bind(config.address()).await?;
    log::info!(
        "Serving on {} (max length {} bytes)",
        listener.local_addr()?,
        config.proxy.max_length
    );
    axum::serve(listener, router(proxy)).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn index(
    State(proxy): State<Arc<DataProxy>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let output = Output::from_query(&query).unwrap_or_default();
    let reply =
        tokio::task::spawn_blocking(move || proxy.respond(&query)).await;

    match reply {
        Ok(reply) => into_response(reply),
        Err(err) => {
            log::error!("proxy task failed: {}", err);
            into_response(task_failure(&output))
        }
    }
}

fn task_failure(output: &Output) -> Reply {
    let body = ErrorBody {
        error: ErrorDetail {
            title: "Internal error".into(),
            msg: "The request could not be completed".into(),
        },
    };
    proxy::error_reply(body, ErrorKind::Internal, output)
}

/// JSONP consumers cannot see status codes, so their errors stay `200`.
fn into_response(reply: Reply) -> Response {
    let jsonp = reply.rendered.content_type == JSONP_CONTENT_TYPE;
    let status = match reply.error {
        Some(kind) if !jsonp => status_code(kind),
        _ => StatusCode::OK,
    };
    (
        status,
        [(header::CONTENT_TYPE, reply.rendered.content_type)],
        reply.rendered.body,
    )
        .into_response()
}

fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
