use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::extract::FromRequest;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use xssnake_core::ClientId;
use xssnake_core::net::messages::{ClientMessage, PingMsg, RoomErrorMsg, ServerMessage};
use xssnake_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message, encode_server_message};
use xssnake_core::room::RoomError;

use crate::rate_limit::RateLimiter;
use crate::room::ClientSender;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The first frame must be a match request.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let request = match decode_client_message(&first_msg) {
        Ok(ClientMessage::RoomMatch(request)) => request,
        Ok(other) => {
            tracing::debug!(message = ?other, "Expected a match request first; closing");
            return;
        },
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable first frame; closing");
            return;
        },
    };

    let client_id = state.next_client_id();
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.client_message_buffer);
    let joined = {
        let mut rooms = state.rooms.write().await;
        rooms.join(client_id, &request, tx.clone(), Instant::now())
    };
    let joined = match joined {
        Ok(joined) => joined,
        Err(error) => {
            tracing::info!(client_id, error = %error, "Match request refused");
            send_room_error(&mut ws_sender, error).await;
            return;
        },
    };
    tracing::info!(client_id, room = %joined.key, seat = joined.seat, "Client connected");

    let writer = spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, client_id, &tx).await;

    // Client disconnected. Its seat may outlive the socket until the round ends.
    state.rooms.write().await.disconnect(client_id, Instant::now());
    writer.abort();

    tracing::info!(client_id, room = %joined.key, "Client disconnected");
}

async fn send_room_error(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    error: RoomError,
) {
    let msg = ServerMessage::RoomError(RoomErrorMsg { error });
    match encode_server_message(&msg) {
        Ok(data) => {
            if let Err(e) = ws_sender.send(Message::Binary(data.into())).await {
                tracing::warn!(error = %e, "Failed to send room error");
            }
        },
        Err(e) => tracing::warn!(error = %e, "Failed to encode room error"),
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    })
}

/// Reads client frames until the socket closes, pinging on the side so
/// the room has a round-trip estimate for each seat.
async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    client_id: ClientId,
    tx: &ClientSender,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);
    let ping_period = Duration::from_millis(state.config.game.ping_interval_ms.max(1));
    let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
    let mut pings = PingTracker::default();

    loop {
        let msg = tokio::select! {
            msg = ws_receiver.next() => msg,
            _ = ping.tick() => {
                if let Some(sent_at_ms) = send_ping(state, client_id, tx) {
                    pings.sent(sent_at_ms);
                }
                continue;
            },
        };
        let data = match msg {
            Some(Ok(Message::Binary(d))) => d,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(client_id, "Rate limited");
            continue;
        }

        if data.len() > MAX_MESSAGE_SIZE || data.is_empty() {
            continue;
        }

        let msg = match decode_client_message(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(client_id, error = %e, "Dropping undecodable frame");
                continue;
            },
        };

        match msg {
            ClientMessage::SnakeUpdate(update) => {
                let mut rooms = state.rooms.write().await;
                rooms.snake_update(client_id, &update, Instant::now());
            },
            ClientMessage::Chat(chat) => {
                let mut rooms = state.rooms.write().await;
                rooms.chat(client_id, &chat.content);
            },
            ClientMessage::Pong(pong) => {
                let Some(sample) = pings.answer(pong.sent_at_ms, state.uptime_ms()) else {
                    tracing::debug!(client_id, "Dropping pong for no outstanding ping");
                    continue;
                };
                let mut rooms = state.rooms.write().await;
                rooms.record_rtt(client_id, sample);
            },
            ClientMessage::RoomMatch(_) => {
                tracing::debug!(client_id, "Ignoring repeated match request");
            },
        }
    }
}

/// Queues a ping and returns its timestamp, or `None` if it was not sent.
fn send_ping(state: &AppState, client_id: ClientId, tx: &ClientSender) -> Option<u64> {
    let sent_at_ms = state.uptime_ms();
    let msg = ServerMessage::Ping(PingMsg { sent_at_ms });
    match encode_server_message(&msg) {
        Ok(data) => {
            if tx.try_send(Bytes::from(data)).is_err() {
                tracing::debug!(client_id, "Ping skipped; outbound queue full");
                return None;
            }
            Some(sent_at_ms)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode ping");
            None
        },
    }
}

/// The one ping a connection may answer. RTT samples are measured from the
/// server's own send time; echoes that do not match it are ignored.
#[derive(Debug, Default)]
struct PingTracker {
    outstanding: Option<u64>,
}

impl PingTracker {
    fn sent(&mut self, at_ms: u64) {
        self.outstanding = Some(at_ms);
    }

    fn answer(&mut self, echoed_ms: u64, now_ms: u64) -> Option<u64> {
        let sent = self.outstanding.filter(|&sent| sent == echoed_ms)?;
        self.outstanding = None;
        Some(now_ms.saturating_sub(sent))
    }
}
