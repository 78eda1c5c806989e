use anyhow::Context;
use axum::{
    extract::{
        connect_info::ConnectInfo,
        ws::{Message, WebSocket},
        Json, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::json;
use std::{future::Future, net::SocketAddr};
use tokio::{
    net::TcpListener,
    signal,
    sync::mpsc::{self, UnboundedReceiver},
};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{debug, error, info, warn};

use crate::relay::appstate::AppState;
use crate::relay::client::Client;

/// Builds the application routes.
///
/// * `/ws` - the websocket endpoint every browser tab connects to.
/// * `/status` - version and number of open rooms.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(status))
        .with_state(state)
        // Set up the tracing layer to log incoming requests.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
}

/// Start the WebSocket server.
///
/// Binds `listen_addr:port` and serves until ctrl-c or SIGTERM.
///
/// # Arguments
///
/// * `port` - The port number to listen on.
/// * `listen_addr` - The IP address to listen on.
/// * `state` - The room registry shared by all connections.
pub async fn start_ws(port: u16, listen_addr: &str, state: AppState) -> anyhow::Result<()> {
    debug!("Server configured to accept connections on host {listen_addr}...");
    debug!("Server configured to listen connections on port {port}...");

    let addr = format!("{}:{}", listen_addr, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to listen on: {addr}"))?;
    info!("Listening on: {}", listener.local_addr()?);

    serve(listener, state, shutdown_signal()).await
}

/// Serves the routes on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("server stopped unexpectedly")
}

/// Handler for the WebSocket route.
///
/// This function upgrades the connection to a WebSocket and handles the socket.
///
/// # Arguments
///
/// * `ws` - The WebSocketUpgrade struct containing the upgrade request.
/// * `addr` - The remote address of the connecting peer.
/// * `state` - The shared room registry.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    debug!("Upgrading connection from {}", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Handles the WebSocket connection.
///
/// The socket is split: a writer task owns the sink and drains the client's
/// outbound channel, while this task reads frames and hands them to the
/// `Client`. When the stream ends the client leaves every room it joined.
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (sink, mut receiver) = socket.split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_socket(sink, outbound_rx));

    let mut client = Client::new(outbound);
    info!(connection_id = %client.connection_id(), %addr, "connection opened");
    client.greet();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(message) => client.handle_message(&state, message).await,
            Err(error) => {
                warn!(connection_id = %client.connection_id(), "Failed to read message from client: {}", error);
                break;
            }
        }
    }

    client.handle_close(&state).await;
    info!(connection_id = %client.connection_id(), %addr, "connection closed");
    writer.abort();
}

async fn write_socket(mut sink: SplitSink<WebSocket, Message>, mut outbound: UnboundedReceiver<Message>) {
    while let Some(message) = outbound.recv().await {
        if let Err(error) = sink.send(message).await {
            error!("Failed to send message to the client: {}", error);
            break;
        }
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");

    let response = json!({
        "data": {
            "version": version,
            "rooms": state.room_count().await,
        },
        "message": "Service is running..."
    });
    (StatusCode::OK, Json(response))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                error!("Failed to install signal handler: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}
