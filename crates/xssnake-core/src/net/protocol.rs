use serde::{Deserialize, Serialize};

use super::messages::{
    ChatMsg, ChatRelayMsg, ClientMessage, DespawnMsg, GameCountdownMsg, GameStartMsg,
    MatchEndMsg, MessageType, NoticeMsg, PingMsg, PongMsg, RoomErrorMsg, RoomIndexMsg,
    RoomMatchMsg, ScoreUpdateMsg, ServerMessage, SnakeActionMsg, SnakeCrashMsg, SnakeSizeMsg,
    SnakeSpeedMsg, SnakeStateMsg, SnakeUpdateMsg, SpawnMsg,
};

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::RoomMatch(m) => encode_message(MessageType::RoomMatch, m),
        ClientMessage::SnakeUpdate(m) => encode_message(MessageType::SnakeUpdate, m),
        ClientMessage::Chat(m) => encode_message(MessageType::Chat, m),
        ClientMessage::Pong(m) => encode_message(MessageType::Pong, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ServerMessage::RoomIndex(m) => encode_message(msg_type, m),
        ServerMessage::RoomError(m) => encode_message(msg_type, m),
        ServerMessage::Notice(m) => encode_message(msg_type, m),
        ServerMessage::ChatRelay(m) => encode_message(msg_type, m),
        ServerMessage::GameCountdown(m) => encode_message(msg_type, m),
        ServerMessage::GameStart(m) => encode_message(msg_type, m),
        ServerMessage::SnakeState(m) => encode_message(msg_type, m),
        ServerMessage::SnakeCrash(m) => encode_message(msg_type, m),
        ServerMessage::SnakeSize(m) => encode_message(msg_type, m),
        ServerMessage::SnakeSpeed(m) => encode_message(msg_type, m),
        ServerMessage::SnakeAction(m) => encode_message(msg_type, m),
        ServerMessage::Spawn(m) => encode_message(msg_type, m),
        ServerMessage::Despawn(m) => encode_message(msg_type, m),
        ServerMessage::ScoreUpdate(m) => encode_message(msg_type, m),
        ServerMessage::MatchEnd(m) => encode_message(msg_type, m),
        ServerMessage::Ping(m) => encode_message(msg_type, m),
        ServerMessage::Combined(batch) => encode_message(msg_type, batch),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::RoomMatch => Ok(ClientMessage::RoomMatch(
            decode_payload::<RoomMatchMsg>(data)?,
        )),
        MessageType::SnakeUpdate => Ok(ClientMessage::SnakeUpdate(decode_payload::<
            SnakeUpdateMsg,
        >(data)?)),
        MessageType::Chat => Ok(ClientMessage::Chat(decode_payload::<ChatMsg>(data)?)),
        MessageType::Pong => Ok(ClientMessage::Pong(decode_payload::<PongMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg = match decode_message_type(data)? {
        MessageType::RoomIndex => ServerMessage::RoomIndex(decode_payload::<RoomIndexMsg>(data)?),
        MessageType::RoomError => ServerMessage::RoomError(decode_payload::<RoomErrorMsg>(data)?),
        MessageType::Notice => ServerMessage::Notice(decode_payload::<NoticeMsg>(data)?),
        MessageType::ChatRelay => ServerMessage::ChatRelay(decode_payload::<ChatRelayMsg>(data)?),
        MessageType::GameCountdown => {
            ServerMessage::GameCountdown(decode_payload::<GameCountdownMsg>(data)?)
        },
        MessageType::GameStart => ServerMessage::GameStart(decode_payload::<GameStartMsg>(data)?),
        MessageType::SnakeState => {
            ServerMessage::SnakeState(decode_payload::<SnakeStateMsg>(data)?)
        },
        MessageType::SnakeCrash => {
            ServerMessage::SnakeCrash(decode_payload::<SnakeCrashMsg>(data)?)
        },
        MessageType::SnakeSize => ServerMessage::SnakeSize(decode_payload::<SnakeSizeMsg>(data)?),
        MessageType::SnakeSpeed => {
            ServerMessage::SnakeSpeed(decode_payload::<SnakeSpeedMsg>(data)?)
        },
        MessageType::SnakeAction => {
            ServerMessage::SnakeAction(decode_payload::<SnakeActionMsg>(data)?)
        },
        MessageType::Spawn => ServerMessage::Spawn(decode_payload::<SpawnMsg>(data)?),
        MessageType::Despawn => ServerMessage::Despawn(decode_payload::<DespawnMsg>(data)?),
        MessageType::ScoreUpdate => {
            ServerMessage::ScoreUpdate(decode_payload::<ScoreUpdateMsg>(data)?)
        },
        MessageType::MatchEnd => ServerMessage::MatchEnd(decode_payload::<MatchEndMsg>(data)?),
        MessageType::Ping => ServerMessage::Ping(decode_payload::<PingMsg>(data)?),
        MessageType::Combined => {
            ServerMessage::Combined(decode_payload::<Vec<ServerMessage>>(data)?)
        },
        _ => return Err(ProtocolError::UnknownMessageType(data[0])),
    };
    Ok(msg)
}

/// Flattens a message into its individual events, unwrapping `Combined` batches.
pub fn flatten_server_message(msg: ServerMessage) -> Vec<ServerMessage> {
    match msg {
        ServerMessage::Combined(batch) => batch
            .into_iter()
            .flat_map(flatten_server_message)
            .collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::CrashKind;
    use crate::grid::{Coord, Direction};
    use crate::net::messages::{Notice, SpawnKind};
    use crate::room::{MatchOptions, RoomError};

    #[test]
    fn roundtrip_room_match() {
        let msg = ClientMessage::RoomMatch(RoomMatchMsg {
            name: "Alice".to_string(),
            options: MatchOptions {
                capacity: Some(2),
                ..MatchOptions::default()
            },
            room_key: None,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::RoomMatch as u8);
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_snake_update() {
        let msg = ClientMessage::SnakeUpdate(SnakeUpdateMsg {
            parts: vec![Coord::new(5, 5), Coord::new(5, 6)],
            direction: Direction::Down,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn roundtrip_notice() {
        let msg = ServerMessage::Notice(NoticeMsg {
            notice: Notice::Crash {
                seat: 1,
                kind: CrashKind::Opponent,
                opponent: Some(0),
                draw: true,
            },
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn roundtrip_room_error() {
        let msg = ServerMessage::RoomError(RoomErrorMsg {
            error: RoomError::Full,
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn combined_wraps_a_batch() {
        let msg = ServerMessage::Combined(vec![
            ServerMessage::Despawn(DespawnMsg { id: 0 }),
            ServerMessage::SnakeSize(SnakeSizeMsg { seat: 1, size: 7 }),
            ServerMessage::ScoreUpdate(ScoreUpdateMsg { seat: 1, points: 3 }),
        ]);
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::Combined as u8);
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
        let flat = flatten_server_message(decoded);
        assert_eq!(flat.len(), 3);
        assert!(matches!(flat[2], ServerMessage::ScoreUpdate(_)));
    }

    #[test]
    fn server_type_is_not_a_client_message() {
        let encoded = encode_server_message(&ServerMessage::Spawn(SpawnMsg {
            id: 0,
            kind: SpawnKind::Apple,
            at: Coord::new(3, 4),
        }))
        .unwrap();
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::UnknownMessageType(0x1B))
        ));
    }

    #[test]
    fn decode_empty_message() {
        assert!(matches!(
            decode_client_message(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn decode_unknown_type() {
        assert!(matches!(
            decode_message_type(&[0xFF, 0x00]),
            Err(ProtocolError::UnknownMessageType(0xFF))
        ));
    }

    #[test]
    fn decode_garbage_payload() {
        let data = [MessageType::SnakeUpdate as u8, 0xC1, 0xC1];
        assert!(matches!(
            decode_client_message(&data),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn bad_direction_is_rejected() {
        // A direction value outside 0..=3 must not decode.
        #[derive(Serialize)]
        struct Raw {
            parts: Vec<(i16, i16)>,
            direction: u8,
        }
        let encoded = encode_message(
            MessageType::SnakeUpdate,
            &Raw {
                parts: vec![(1, 1)],
                direction: 9,
            },
        )
        .unwrap();
        assert!(decode_client_message(&encoded).is_err());
    }

    #[test]
    fn oversized_payload_rejected() {
        let msg = ServerMessage::ChatRelay(ChatRelayMsg {
            seat: 0,
            name: "x".to_string(),
            content: "y".repeat(MAX_MESSAGE_SIZE + 1),
        });
        assert!(matches!(
            encode_server_message(&msg),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }
}
