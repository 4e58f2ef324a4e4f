use super::protocol::{ClientMessage, LightUpdateMessage, ReplyMessage};
use super::{color, dispatch, ApiState};
use crate::controller::LightUpdate;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// GET /ws/color - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle WebSocket connection lifecycle
///
/// Client requests go through the same operations as the HTTP routes and
/// get a `success`/`error` reply. Every applied light change, from any
/// client, is pushed as a `light_update` message.
async fn handle_socket(mut socket: WebSocket, state: ApiState) {
    let mut updates = state.controller.subscribe();
    info!("WebSocket connection established");

    loop {
        tokio::select! {
            // Handle incoming client messages
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(&state, &text).await;
                        if let Err(e) = send_json(&mut socket, &reply).await {
                            error!(error = %e, "Failed to send reply");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Forward applied light changes
            result = updates.recv() => {
                match result {
                    Ok(update) => {
                        if let Err(e) = send_update(&mut socket, update).await {
                            error!(error = %e, "Failed to send light update");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "WebSocket lagged, skipped updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Light update channel closed");
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Run one client request and build its reply
async fn handle_client_message(state: &ApiState, text: &str) -> ReplyMessage {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "Unparseable client message");
            return ReplyMessage::error(format!("Invalid message: {}", e));
        }
    };

    let response = match msg {
        ClientMessage::SetColor { fields } => {
            let data = Value::Object(fields);
            dispatch(state, move |controller| color::set_color(controller, &data)).await
        }
        ClientMessage::Toggle { fields } => {
            let data = Value::Object(fields);
            dispatch(state, move |controller| color::toggle(controller, &data)).await
        }
    };

    ReplyMessage::from(response)
}

async fn send_update(socket: &mut WebSocket, update: LightUpdate) -> anyhow::Result<()> {
    send_json(socket, &LightUpdateMessage::from(update)).await
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, msg: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
