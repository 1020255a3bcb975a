//! WebSocket admission endpoint.
//!
//! Handles the HTTP → WebSocket upgrade and the connection lifecycle:
//! 1. Extract credential and tenant slug from the request
//! 2. Run admission; reject with `401 {"error": ...}` and no upgrade on failure
//! 3. Upgrade, create the client and register it with the hub
//! 4. Queue the `connected` confirmation
//! 5. Run both pumps until disconnect

use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{future, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::domain::realtime::Message;

use super::authenticator::{AuthResult, Authenticator};
use super::client::{self, Client, ClientSettings};
use super::frame::{Frame, TransportError};
use super::hub::Hub;

/// Header carrying the tenant slug when it is not in the query string.
pub const TENANT_HEADER: &str = "x-tenant-slug";

/// Shared state for the realtime routes.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Hub,
    pub authenticator: Authenticator,
    pub settings: ClientSettings,
    /// Cookie consulted for the credential after the `Authorization` header.
    pub cookie_name: Arc<str>,
}

impl WebSocketState {
    pub fn new(hub: Hub, authenticator: Authenticator, settings: ClientSettings) -> Self {
        Self {
            hub,
            authenticator,
            settings,
            cookie_name: Arc::from("auth_token"),
        }
    }

    pub fn with_cookie_name(mut self, name: impl AsRef<str>) -> Self {
        self.cookie_name = Arc::from(name.as_ref());
        self
    }
}

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
    pub tenant: Option<String>,
}

/// Response body for `/ws/stats`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubStats {
    pub total_clients: usize,
    pub active_tenants: usize,
    pub dropped_messages: u64,
}

/// Credential lookup: `Authorization: Bearer`, then cookie, then `?token=`.
fn credential(headers: &HeaderMap, params: &ConnectParams, cookie_name: &str) -> String {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer
        .map(str::to_string)
        .or_else(|| cookie(headers, cookie_name))
        .or_else(|| params.token.clone().filter(|t| !t.is_empty()))
        .unwrap_or_default()
}

/// The auth scheme is case-insensitive (RFC 9110 §11.1).
fn bearer_token(value: &str) -> Option<&str> {
    let scheme = value.get(..7)?;
    if scheme.eq_ignore_ascii_case("Bearer ") {
        value.get(7..)
    } else {
        None
    }
}

/// Tenant lookup: `?tenant=`, then the `X-Tenant-Slug` header.
fn tenant_slug(headers: &HeaderMap, params: &ConnectParams) -> String {
    params
        .tenant
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get(TENANT_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
        })
        .unwrap_or_default()
        .to_string()
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?token=...&tenant=slug`
///
/// Admission runs before the upgrade is looked at, so a rejected request
/// never gets a socket.
pub async fn ws_handler(
    State(state): State<WebSocketState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let token = credential(&headers, &params, &state.cookie_name);
    let slug = tenant_slug(&headers, &params);

    let admitted = match state.authenticator.authenticate(&token, &slug).await {
        Ok(result) => result,
        Err(e) => {
            tracing::info!(tenant = %slug, error = %e, "WebSocket admission rejected");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let Some(ws) = ws else {
        return (
            StatusCode::UPGRADE_REQUIRED,
            Json(serde_json::json!({ "error": "websocket upgrade required" })),
        )
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, admitted, state))
}

/// Run an admitted connection until it closes.
async fn handle_socket(socket: WebSocket, admitted: AuthResult, state: WebSocketState) {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(TransportError::io)
        .with(|frame: Frame| future::ready(Ok::<_, TransportError>(to_ws(frame))));
    let stream = stream.map(|result| result.map(from_ws).map_err(TransportError::io));

    let (client, queue) = Client::new(
        admitted.tenant_id,
        admitted.user_id,
        state.settings.queue_capacity,
    );
    let client_id = client.id();
    state.hub.register(client.clone()).await;

    match Message::connected(admitted.tenant_id, admitted.user_id) {
        Ok(connected) => {
            client.send(Arc::new(connected));
        }
        Err(e) => tracing::error!(client_id = %client_id, error = %e, "Failed to build connected message"),
    }

    tracing::debug!(
        client_id = %client_id,
        tenant_id = %admitted.tenant_id,
        user_id = %admitted.user_id,
        "WebSocket connection established"
    );

    client::run(client, queue, state.hub.clone(), sink, stream, state.settings).await;

    tracing::debug!(client_id = %client_id, "WebSocket connection closed");
}

fn to_ws(frame: Frame) -> WsMessage {
    match frame {
        Frame::Text(text) => WsMessage::Text(text),
        Frame::Binary(bytes) => WsMessage::Binary(bytes),
        Frame::Ping(bytes) => WsMessage::Ping(bytes),
        Frame::Pong(bytes) => WsMessage::Pong(bytes),
        Frame::Close(code) => WsMessage::Close(code.map(|code| CloseFrame {
            code,
            reason: "".into(),
        })),
    }
}

fn from_ws(message: WsMessage) -> Frame {
    match message {
        WsMessage::Text(text) => Frame::Text(text),
        WsMessage::Binary(bytes) => Frame::Binary(bytes),
        WsMessage::Ping(bytes) => Frame::Ping(bytes),
        WsMessage::Pong(bytes) => Frame::Pong(bytes),
        WsMessage::Close(frame) => Frame::Close(frame.map(|f| f.code)),
    }
}

/// Diagnostics: `GET /ws/stats`.
pub async fn stats_handler(State(state): State<WebSocketState>) -> Json<HubStats> {
    Json(HubStats {
        total_clients: state.hub.total_client_count().await,
        active_tenants: state.hub.active_tenants().await.len(),
        dropped_messages: state.hub.dropped_messages().await,
    })
}

/// Create axum router for the realtime endpoints.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router())
///     .with_state(ws_state);
/// ```
pub fn websocket_router() -> Router<WebSocketState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/stats", get(stats_handler))
}
