#[allow(dead_code)]
mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;

use xssnake_core::config::GameTuning;
use xssnake_core::net::messages::{
    ChatMsg, ClientMessage, Notice, NoticeMsg, PongMsg, ServerMessage,
};
use xssnake_core::room::RoomError;

use common::{
    TestServer, key_request, match_request, ws_closed_within, ws_connect, ws_read_server_msgs,
    ws_read_until, ws_send_client_msg,
};

#[tokio::test]
async fn match_request_opens_room() {
    let server = TestServer::new().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 3)).await;

    let msgs = ws_read_server_msgs(&mut alice).await;
    match &msgs[0] {
        ServerMessage::RoomIndex(index) => {
            assert_eq!(index.seat, 0);
            assert_eq!(index.capacity, 3);
            assert_eq!(index.key.len(), 5);
            assert_eq!(index.names, vec!["Alice".to_string()]);
            assert_eq!(index.points, vec![0]);
        },
        other => panic!("Expected RoomIndex, got: {other:?}"),
    }
}

#[tokio::test]
async fn second_client_is_matched_into_same_room() {
    let server = TestServer::new().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 3)).await;
    let first = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;

    let mut bob = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut bob, &match_request("Bob", 3)).await;
    let second = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::RoomIndex(_))).await;

    let (ServerMessage::RoomIndex(first), ServerMessage::RoomIndex(second)) = (first, second)
    else {
        unreachable!()
    };
    assert_eq!(first.key, second.key);
    assert_eq!(second.seat, 1);
    assert_eq!(second.names, vec!["Alice".to_string(), "Bob".to_string()]);

    let notice = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Notice(_))).await;
    assert_eq!(
        notice,
        ServerMessage::Notice(NoticeMsg {
            notice: Notice::Join {
                seat: 1,
                name: "Bob".to_string(),
            },
        })
    );
}

#[tokio::test]
async fn full_room_counts_down_and_starts() {
    let server = TestServer::instant_start().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    let mut bob = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 2)).await;
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;
    ws_send_client_msg(&mut bob, &match_request("Bob", 2)).await;

    for stream in [&mut alice, &mut bob] {
        let countdown =
            ws_read_until(stream, |m| matches!(m, ServerMessage::GameCountdown(_))).await;
        let ServerMessage::GameCountdown(countdown) = countdown else {
            unreachable!()
        };
        assert_eq!(countdown.secs, 0);
        assert_eq!(countdown.snakes.len(), 2);

        let start = ws_read_until(stream, |m| matches!(m, ServerMessage::GameStart(_))).await;
        let ServerMessage::GameStart(start) = start else {
            unreachable!()
        };
        assert_eq!(start.round, 1);
    }
}

#[tokio::test]
async fn join_by_key_errors_are_reported() {
    let server = TestServer::new().await;

    let mut invalid = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut invalid, &key_request("Eve", "NOPE!")).await;
    let msgs = ws_read_server_msgs(&mut invalid).await;
    match &msgs[0] {
        ServerMessage::RoomError(e) => assert_eq!(e.error, RoomError::Invalid),
        other => panic!("Expected RoomError, got: {other:?}"),
    }
    assert!(ws_closed_within(&mut invalid, 2000).await);

    let mut missing = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut missing, &key_request("Eve", "zzzzz")).await;
    let msgs = ws_read_server_msgs(&mut missing).await;
    match &msgs[0] {
        ServerMessage::RoomError(e) => assert_eq!(e.error, RoomError::NotFound),
        other => panic!("Expected RoomError, got: {other:?}"),
    }
}

#[tokio::test]
async fn full_room_refuses_join_by_key() {
    let server = TestServer::new().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    let mut bob = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 2)).await;
    let index = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;
    let ServerMessage::RoomIndex(index) = index else {
        unreachable!()
    };
    ws_send_client_msg(&mut bob, &match_request("Bob", 2)).await;
    ws_read_until(&mut bob, |m| matches!(m, ServerMessage::GameCountdown(_))).await;

    let mut carol = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut carol, &key_request("Carol", &index.key)).await;
    let msgs = ws_read_server_msgs(&mut carol).await;
    match &msgs[0] {
        ServerMessage::RoomError(e) => assert_eq!(e.error, RoomError::Full),
        other => panic!("Expected RoomError, got: {other:?}"),
    }
}

#[tokio::test]
async fn first_frame_must_be_match_request() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;
    let chat = ClientMessage::Chat(ChatMsg {
        content: "hello?".to_string(),
    });
    ws_send_client_msg(&mut stream, &chat).await;
    assert!(ws_closed_within(&mut stream, 2000).await);
}

#[tokio::test]
async fn chat_is_relayed_to_other_seats() {
    let server = TestServer::new().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    let mut bob = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 3)).await;
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;
    ws_send_client_msg(&mut bob, &match_request("Bob", 3)).await;
    ws_read_until(&mut bob, |m| matches!(m, ServerMessage::RoomIndex(_))).await;

    let chat = ClientMessage::Chat(ChatMsg {
        content: "  good luck  ".to_string(),
    });
    ws_send_client_msg(&mut bob, &chat).await;

    let relay = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::ChatRelay(_))).await;
    let ServerMessage::ChatRelay(relay) = relay else {
        unreachable!()
    };
    assert_eq!(relay.seat, 1);
    assert_eq!(relay.name, "Bob");
    assert_eq!(relay.content, "good luck");
}

#[tokio::test]
async fn leaving_before_the_round_frees_the_seat() {
    let server = TestServer::new().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    let mut bob = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 3)).await;
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;
    ws_send_client_msg(&mut bob, &match_request("Bob", 3)).await;
    ws_read_until(&mut bob, |m| matches!(m, ServerMessage::RoomIndex(_))).await;

    bob.send(Message::Close(None)).await.unwrap();

    let notice = ws_read_until(&mut alice, |m| {
        matches!(
            m,
            ServerMessage::Notice(n) if matches!(n.notice, Notice::Disconnect { .. })
        )
    })
    .await;
    let ServerMessage::Notice(notice) = notice else {
        unreachable!()
    };
    assert_eq!(
        notice.notice,
        Notice::Disconnect {
            seat: 1,
            name: "Bob".to_string(),
        }
    );
    let index = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;
    let ServerMessage::RoomIndex(index) = index else {
        unreachable!()
    };
    assert_eq!(index.names, vec!["Alice".to_string()]);
}

#[tokio::test]
async fn opponent_leaving_mid_round_ends_it() {
    let server = TestServer::instant_start().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    let mut bob = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 2)).await;
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;
    ws_send_client_msg(&mut bob, &match_request("Bob", 2)).await;
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::GameStart(_))).await;

    bob.send(Message::Close(None)).await.unwrap();

    // The round ends at once and the survivor takes the knockout bonus.
    let mut score = None;
    let mut round_over = false;
    while score.is_none() || !round_over {
        for msg in ws_read_server_msgs(&mut alice).await {
            match msg {
                ServerMessage::ScoreUpdate(update) => score = Some(update),
                ServerMessage::Notice(n) if matches!(n.notice, Notice::NewRound { .. }) => {
                    round_over = true;
                },
                _ => {},
            }
        }
    }
    let score = score.unwrap();
    assert_eq!(score.seat, 0);
    assert_eq!(score.points, GameTuning::default().knockout_points);
}

#[tokio::test]
async fn pings_arrive_on_interval() {
    let server = TestServer::with_tuning(GameTuning {
        ping_interval_ms: 50,
        ..GameTuning::default()
    })
    .await;
    let mut alice = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 3)).await;

    let ping = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Ping(_))).await;
    let ServerMessage::Ping(ping) = ping else {
        unreachable!()
    };
    let pong = ClientMessage::Pong(PongMsg {
        sent_at_ms: ping.sent_at_ms,
    });
    ws_send_client_msg(&mut alice, &pong).await;

    // The connection stays healthy and keeps pinging.
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Ping(_))).await;
}

#[tokio::test]
async fn forged_pong_does_not_inflate_rtt() {
    let server = TestServer::with_tuning(GameTuning {
        ping_interval_ms: 200,
        ..GameTuning::default()
    })
    .await;
    let mut alice = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 3)).await;
    let index = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;
    let ServerMessage::RoomIndex(index) = index else {
        unreachable!()
    };
    let rtt = |server: &TestServer| {
        let rooms = Arc::clone(&server.state.rooms);
        let key = index.key.clone();
        async move { rooms.read().await.room(&key).unwrap().clients()[0].rtt_ms() }
    };

    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Ping(_))).await;
    let forged = ClientMessage::Pong(PongMsg { sent_at_ms: 0 });
    ws_send_client_msg(&mut alice, &forged).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rtt(&server).await, 0);

    let ping = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::Ping(_))).await;
    let ServerMessage::Ping(ping) = ping else {
        unreachable!()
    };
    let pong = ClientMessage::Pong(PongMsg {
        sent_at_ms: ping.sent_at_ms,
    });
    ws_send_client_msg(&mut alice, &pong).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rtt(&server).await < 200);
}

#[tokio::test]
async fn health_reports_rooms_and_players() {
    let server = TestServer::new().await;
    let mut alice = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut alice, &match_request("Alice", 3)).await;
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomIndex(_))).await;

    let mut http = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    http.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    http.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    let body = &response[response.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["connections"]["websocket"], 1);
    assert_eq!(json["rooms"]["active"], 1);
    assert_eq!(json["rooms"]["players"], 1);
}
