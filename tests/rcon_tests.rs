// RCON client tests against an in-process fake Source server

use bytes::BytesMut;
use gamewarden::rcon::{
    self, Packet, RconError, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND,
    SERVERDATA_RESPONSE_VALUE,
};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const PASSWORD: &str = "letmein";

async fn write_packet(stream: &mut TcpStream, packet: &Packet) {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf);
    stream.write_all(&buf).await.unwrap();
}

/// Writes a packet in 3-byte slices with yields in between, forcing the
/// client to reassemble across reads.
async fn write_packet_chunked(stream: &mut TcpStream, packet: &Packet) {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf);
    for chunk in buf.chunks(3) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
    }
}

async fn read_packet(stream: &mut TcpStream, buf: &mut BytesMut) -> Option<Packet> {
    loop {
        if let Some(packet) = Packet::decode(buf).unwrap() {
            return Some(packet);
        }
        let n = stream.read_buf(buf).await.unwrap();
        if n == 0 {
            return None;
        }
    }
}

/// Fake Source server: authenticates against PASSWORD, answers any command
/// with its body split over `fragments` packets, and acks the empty sentinel.
async fn spawn_fake_server(fragments: usize, chunked: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();
        while let Some(packet) = read_packet(&mut stream, &mut buf).await {
            match packet.ptype {
                SERVERDATA_AUTH => {
                    if packet.body == PASSWORD {
                        // Real servers echo an empty response before the ack
                        write_packet(
                            &mut stream,
                            &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, ""),
                        )
                        .await;
                        write_packet(
                            &mut stream,
                            &Packet::new(packet.id, SERVERDATA_AUTH_RESPONSE, ""),
                        )
                        .await;
                    } else {
                        write_packet(&mut stream, &Packet::new(-1, SERVERDATA_AUTH_RESPONSE, ""))
                            .await;
                        return;
                    }
                }
                SERVERDATA_EXECCOMMAND if packet.body.is_empty() => {
                    // Sentinel: everything before it has been flushed
                    write_packet(
                        &mut stream,
                        &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, ""),
                    )
                    .await;
                }
                SERVERDATA_EXECCOMMAND => {
                    let reply = format!("ack:{}", packet.body);
                    let per_fragment = reply.len().div_ceil(fragments);
                    for piece in reply.as_bytes().chunks(per_fragment.max(1)) {
                        let fragment = Packet::new(
                            packet.id,
                            SERVERDATA_RESPONSE_VALUE,
                            String::from_utf8_lossy(piece).into_owned(),
                        );
                        if chunked {
                            write_packet_chunked(&mut stream, &fragment).await;
                        } else {
                            write_packet(&mut stream, &fragment).await;
                        }
                    }
                }
                _ => {}
            }
        }
    });
    addr
}

#[tokio::test]
async fn execute_round_trip() {
    let addr = spawn_fake_server(1, false).await;
    let response = rcon::execute(&addr.ip().to_string(), addr.port(), PASSWORD, "status")
        .await
        .unwrap();
    assert_eq!(response, "ack:status");
}

#[tokio::test]
async fn multi_packet_reply_is_concatenated_in_order() {
    let addr = spawn_fake_server(4, false).await;
    let response = rcon::execute(
        &addr.ip().to_string(),
        addr.port(),
        PASSWORD,
        "cvarlist with a reasonably long output",
    )
    .await
    .unwrap();
    assert_eq!(response, "ack:cvarlist with a reasonably long output");
}

#[tokio::test]
async fn fragmented_tcp_stream_is_reassembled() {
    let addr = spawn_fake_server(3, true).await;
    let response = rcon::execute(&addr.ip().to_string(), addr.port(), PASSWORD, "status")
        .await
        .unwrap();
    assert_eq!(response, "ack:status");
}

#[tokio::test]
async fn wrong_password_surfaces_auth_failure() {
    let addr = spawn_fake_server(1, false).await;
    let err = rcon::execute(&addr.ip().to_string(), addr.port(), "wrong", "status")
        .await
        .unwrap_err();
    assert!(matches!(err, RconError::AuthFailed));
}

#[tokio::test]
async fn connection_closed_mid_exchange_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and hang up without answering the auth request
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let err = rcon::execute(&addr.ip().to_string(), addr.port(), PASSWORD, "status")
        .await
        .unwrap_err();
    assert!(matches!(err, RconError::Transport(_)));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    // Bind-then-drop to find a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = rcon::execute(&addr.ip().to_string(), addr.port(), PASSWORD, "status")
        .await
        .unwrap_err();
    assert!(matches!(err, RconError::Transport(_)));
}
