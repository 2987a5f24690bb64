// Source-engine RCON client. Binary little-endian length-prefixed packets
// over one TCP connection per execute() call; sessions are never reused.

use bytes::{Buf, BufMut, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Hard deadline for the full connect + auth + command round trip.
pub const RCON_TIMEOUT: Duration = Duration::from_secs(15);

/// Smallest legal wire size: request id + type + empty body + two NULs.
const MIN_PACKET_SIZE: i32 = 10;

pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_AUTH: i32 = 3;

#[derive(Debug, Error)]
pub enum RconError {
    #[error("RCON authentication rejected; check the configured password")]
    AuthFailed,
    #[error(
        "no RCON response within {}s; the server may be overloaded or still starting up",
        RCON_TIMEOUT.as_secs()
    )]
    Timeout,
    #[error("RCON connection error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("malformed RCON packet: {0}")]
    Protocol(String),
}

/// One wire packet. `size` is not stored: it is derived on encode and
/// consumed on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub ptype: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, ptype: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            ptype,
            body: body.into(),
        }
    }

    /// Value of the wire size field: everything after the leading size int32.
    pub fn wire_size(&self) -> usize {
        4 + 4 + self.body.len() + 2
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(4 + self.wire_size());
        buf.put_i32_le(self.wire_size() as i32);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.ptype);
        buf.put_slice(self.body.as_bytes());
        buf.put_bytes(0, 2);
    }

    /// Pops one complete packet off the front of `buf`. Returns Ok(None) when
    /// more bytes are needed; the partial packet stays in the buffer. Multiple
    /// packets in one read are drained by repeated calls.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Packet>, RconError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let size = (&buf[..4]).get_i32_le();
        if size < MIN_PACKET_SIZE {
            return Err(RconError::Protocol(format!(
                "size field {size} below minimum {MIN_PACKET_SIZE}"
            )));
        }
        let size = size as usize;
        if buf.len() < 4 + size {
            return Ok(None);
        }

        buf.advance(4);
        let mut frame = buf.split_to(size);
        let id = frame.get_i32_le();
        let ptype = frame.get_i32_le();
        let body_len = frame.len().saturating_sub(2); // trailing NUL pair
        let body = String::from_utf8_lossy(&frame[..body_len]).into_owned();
        Ok(Some(Packet { id, ptype, body }))
    }
}

/// Transient per-call state: the request-id counter and the reassembly buffer.
struct Session {
    next_id: i32,
    buf: BytesMut,
}

impl Session {
    fn new() -> Self {
        Self {
            next_id: 1,
            buf: BytesMut::with_capacity(4096),
        }
    }

    fn next_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Reads until one full packet is available. A read returning zero bytes
    /// mid-exchange is a transport error.
    async fn read_packet(&mut self, stream: &mut TcpStream) -> Result<Packet, RconError> {
        loop {
            if let Some(packet) = Packet::decode(&mut self.buf)? {
                return Ok(packet);
            }
            let n = stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(RconError::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-exchange",
                )));
            }
        }
    }
}

async fn send_packet(stream: &mut TcpStream, packet: &Packet) -> Result<(), RconError> {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf);
    stream.write_all(&buf).await?;
    Ok(())
}

/// One blocking round trip: connect, authenticate, run `command`, return the
/// accumulated output. Every failure path drops (closes) the socket.
pub async fn execute(
    host: &str,
    port: u16,
    password: &str,
    command: &str,
) -> Result<String, RconError> {
    match timeout(RCON_TIMEOUT, run_command(host, port, password, command)).await {
        Ok(result) => result,
        Err(_) => Err(RconError::Timeout),
    }
}

async fn run_command(
    host: &str,
    port: u16,
    password: &str,
    command: &str,
) -> Result<String, RconError> {
    let mut stream = TcpStream::connect((host, port)).await?;
    let mut session = Session::new();

    let auth_id = session.next_id();
    send_packet(&mut stream, &Packet::new(auth_id, SERVERDATA_AUTH, password)).await?;

    loop {
        let packet = session.read_packet(&mut stream).await?;
        if packet.id == -1 {
            // No further packets are sent; the stream drops here.
            return Err(RconError::AuthFailed);
        }
        if packet.id == auth_id && packet.ptype == SERVERDATA_AUTH_RESPONSE {
            break;
        }
        // Servers may echo an empty RESPONSE_VALUE before the auth ack.
    }
    debug!(host, port, "RCON authenticated");

    // The reply to command_id may span several packets. The empty sentinel is
    // answered only after the server has flushed all of them, so its response
    // marks end-of-output.
    let command_id = session.next_id();
    let sentinel_id = session.next_id();
    send_packet(
        &mut stream,
        &Packet::new(command_id, SERVERDATA_EXECCOMMAND, command),
    )
    .await?;
    send_packet(
        &mut stream,
        &Packet::new(sentinel_id, SERVERDATA_EXECCOMMAND, ""),
    )
    .await?;

    let mut output = String::new();
    loop {
        let packet = session.read_packet(&mut stream).await?;
        if packet.id == sentinel_id {
            break;
        }
        if packet.id == command_id {
            output.push_str(&packet.body);
        }
    }
    Ok(output.trim().to_string())
}
