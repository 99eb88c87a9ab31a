//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::sim::{SessionCommand, SESSION_CHANNEL_CAPACITY};
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::server_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Subscribe before registering so the session sees its own roster broadcast
    let broadcast_rx = state.sim.subscribe();
    let (outbox_tx, outbox_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);

    let connect = SessionCommand::Connect {
        session_id,
        outbox: outbox_tx,
    };
    if state.sim.command_tx.send(connect).await.is_err() {
        error!(session_id = %session_id, "Simulation is not running");
        return;
    }

    run_session(
        session_id,
        &state,
        ws_sink,
        ws_stream,
        outbox_rx,
        broadcast_rx,
    )
    .await;

    // Cleanup on disconnect
    let _ = state
        .sim
        .command_tx
        .send(SessionCommand::Disconnect { session_id })
        .await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: Uuid,
    state: &AppState,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    outbox_rx: mpsc::Receiver<ServerMsg>,
    broadcast_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = SessionRateLimiter::new(state.config.input_rate_limit);

    // Writer task: directed + broadcast messages -> WebSocket
    let writer_handle = tokio::spawn(write_loop(session_id, ws_sink, outbox_rx, broadcast_rx));

    // Reader loop: WebSocket -> simulation
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                match ClientMsg::parse(&text) {
                    Ok(msg) => {
                        let command = SessionCommand::Message {
                            session_id,
                            msg,
                            received_at: server_millis(),
                        };
                        if state.sim.command_tx.send(command).await.is_err() {
                            debug!(session_id = %session_id, "Command channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "Dropping client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

async fn write_loop(
    session_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbox_rx: mpsc::Receiver<ServerMsg>,
    mut broadcast_rx: broadcast::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            direct = outbox_rx.recv() => match direct {
                Some(msg) => msg,
                None => {
                    debug!(session_id = %session_id, "Session queue closed");
                    break;
                }
            },
            broadcast = broadcast_rx.recv() => match broadcast {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        session_id = %session_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                    // Continue - don't disconnect for lag
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Broadcast channel closed");
                    break;
                }
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
