use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use xssnake_core::config::GameTuning;
use xssnake_core::net::messages::{ClientMessage, RoomMatchMsg, ServerMessage};
use xssnake_core::net::protocol::{
    decode_server_message, encode_client_message, flatten_server_message,
};
use xssnake_core::room::MatchOptions;

use xssnake_server::config::ServerConfig;
use xssnake_server::state::AppState;
use xssnake_server::{build_app, spawn_ticker};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _server: tokio::task::JoinHandle<()>,
    _ticker: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Countdowns finish on the first tick.
    pub async fn instant_start() -> Self {
        Self::with_tuning(GameTuning {
            countdown_secs: 0,
            ..GameTuning::default()
        })
        .await
    }

    pub async fn with_tuning(game: GameTuning) -> Self {
        Self::from_config(ServerConfig {
            game,
            ..ServerConfig::default()
        })
        .await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let tick_rate_hz = config.tick_rate_hz;
        let (app, state) = build_app(config);
        let ticker = spawn_ticker(Arc::clone(&state.rooms), tick_rate_hz);
        let app_state = state.clone();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state: app_state,
            _server: handle,
            _ticker: ticker,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub fn match_request(name: &str, capacity: i64) -> ClientMessage {
    ClientMessage::RoomMatch(RoomMatchMsg {
        name: name.to_string(),
        options: MatchOptions {
            capacity: Some(capacity),
            ..MatchOptions::default()
        },
        room_key: None,
    })
}

pub fn key_request(name: &str, key: &str) -> ClientMessage {
    ClientMessage::RoomMatch(RoomMatchMsg {
        name: name.to_string(),
        options: MatchOptions::default(),
        room_key: Some(key.to_string()),
    })
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next frame, unwrapping batches into individual events.
pub async fn ws_read_server_msgs(stream: &mut WsStream) -> Vec<ServerMessage> {
    let data = ws_read_raw(stream).await;
    flatten_server_message(decode_server_message(&data).unwrap())
}

/// Reads until a message satisfies `want`, skipping everything else.
pub async fn ws_read_until<F>(stream: &mut WsStream, mut want: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        for msg in ws_read_server_msgs(stream).await {
            if want(&msg) {
                return msg;
            }
        }
    }
}

/// True once the server closes the socket within `timeout_ms`.
pub async fn ws_closed_within(stream: &mut WsStream, timeout_ms: u64) -> bool {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                _ => continue,
            }
        }
    })
    .await
    .is_ok()
}
