//! VoxLink WebSocket Relay Server
//!
//! A development stand-in for the hosted channel service. It speaks the part
//! of the Pusher protocol (version 7) VoxLink clients use and relays client
//! events between the subscribers of a channel.
//!
//! ## Protocol
//!
//! ```json
//! { "event": "pusher:connection_established", "data": "{\"socket_id\":\"1.2\",\"activity_timeout\":120}" }
//! { "event": "pusher:subscribe", "data": { "channel": "private-cs410", "auth": "key:sig" } }
//! { "event": "pusher_internal:subscription_succeeded", "channel": "private-cs410", "data": "{}" }
//! { "event": "client-receive", "channel": "private-cs410", "data": { ... } }
//! ```
//!
//! Auth signatures are not checked.

mod relay;

use axum::{
    Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use relay::{Connection, RelayState};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const DEFAULT_PORT: u16 = 3030;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voxlink_server=info,tower_http=info".into()),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    info!("VoxLink relay listening on {}", addr);
    info!("Channel endpoint: ws://localhost:{}/app/<key>", port);

    if let Err(e) = axum::serve(listener, app(Arc::new(RelayState::new()))).await {
        error!("Server error: {}", e);
    }
}

fn app(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/app/{key}", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "VoxLink Relay Server - Connect via WebSocket at /app/<key>"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(key): Path<String>,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    info!("Upgrade for app key {}", key);
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_text(sender: &mut SplitSink<WebSocket, Message>, text: String) -> bool {
    sender.send(Message::Text(text.into())).await.is_ok()
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<String>();
    let mut conn = Connection::new(state, outbox);
    info!("New connection: {}", conn.socket_id());

    let Some(established) = conn.established() else {
        return;
    };
    if !send_text(&mut sender, established).await {
        return;
    }

    'connection: loop {
        tokio::select! {
            // Handle incoming frames from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        for reply in conn.handle_text(text.as_str()) {
                            if !send_text(&mut sender, reply).await {
                                break 'connection;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary and websocket-level ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn.socket_id(), e);
                        break;
                    }
                }
            }

            // Frames relayed from other subscribers
            Some(frame) = inbox.recv() => {
                if !send_text(&mut sender, frame).await {
                    break;
                }
            }
        }
    }

    conn.close();
    info!("Connection closed: {}", conn.socket_id());
}
