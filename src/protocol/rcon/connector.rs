//! RCON TCP connection and authentication.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::common::error::{BackendError, BackendResult};
use crate::protocol::rcon::codec::{new_rcon_framed, RconFramed};
use crate::protocol::rcon::packet::{packet_type, server_type_name, RconPacket, AUTH_FAILED_ID};

/// An authenticated RCON session.
pub struct RconConnection<S> {
    framed: RconFramed<S>,
    next_id: i32,
}

impl RconConnection<TcpStream> {
    /// Connect to an RCON server and authenticate.
    pub async fn connect(host: &str, port: u16, password: &str) -> BackendResult<Self> {
        debug!("Connecting to RCON at {}:{}", host, port);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| BackendError::ConnectFailed {
                host: host.to_string(),
                port,
                source: e,
            })?;
        stream.set_nodelay(true)?;

        Self::authenticate(stream, password).await
    }
}

impl<S> RconConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the auth exchange over an already connected stream.
    pub async fn authenticate(stream: S, password: &str) -> BackendResult<Self> {
        let mut framed = new_rcon_framed(stream);
        let auth_id = 1;

        framed.send(RconPacket::auth(auth_id, password)).await?;

        loop {
            let packet = framed.next().await.ok_or(BackendError::ConnectionClosed)??;
            debug!(
                "RCON auth reply {} (id {})",
                server_type_name(packet.kind),
                packet.id
            );

            match packet.kind {
                // Some servers send an empty RESPONSE_VALUE ahead of the result
                packet_type::RESPONSE_VALUE => continue,
                packet_type::AUTH_RESPONSE if packet.id == AUTH_FAILED_ID => {
                    return Err(BackendError::AuthFailed);
                }
                packet_type::AUTH_RESPONSE if packet.id == auth_id => {
                    return Ok(Self {
                        framed,
                        next_id: auth_id + 1,
                    });
                }
                _ => {
                    return Err(BackendError::InvalidPacket {
                        message: format!(
                            "unexpected auth reply type {} id {}",
                            packet.kind, packet.id
                        ),
                    });
                }
            }
        }
    }

    /// Run one console command and return its output.
    pub async fn execute(&mut self, command: &str) -> BackendResult<String> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.framed.send(RconPacket::exec(id, command)).await?;

        loop {
            let packet = self
                .framed
                .next()
                .await
                .ok_or(BackendError::ConnectionClosed)??;

            if packet.id == id && packet.kind == packet_type::RESPONSE_VALUE {
                return Ok(packet.body);
            }
            debug!(
                "Skipping RCON packet {} (id {}) while waiting for id {}",
                server_type_name(packet.kind),
                packet.id,
                id
            );
        }
    }

    /// Flush and shut down the write side.
    pub async fn close(mut self) -> BackendResult<()> {
        self.framed.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Read one raw packet written by the client.
    async fn read_packet(server: &mut DuplexStream) -> (i32, i32, String) {
        let size = server.read_i32_le().await.unwrap() as usize;
        let mut rest = vec![0u8; size];
        server.read_exact(&mut rest).await.unwrap();
        let id = i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let kind = i32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
        let body = String::from_utf8(rest[8..size - 2].to_vec()).unwrap();
        (id, kind, body)
    }

    async fn write_packet(server: &mut DuplexStream, id: i32, kind: i32, body: &str) {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((10 + body.len()) as i32).to_le_bytes());
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&kind.to_le_bytes());
        buf.extend_from_slice(body.as_bytes());
        buf.extend_from_slice(&[0, 0]);
        server.write_all(&buf).await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_and_execute() {
        let (client_stream, mut server) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            let (id, kind, body) = read_packet(&mut server).await;
            assert_eq!(kind, packet_type::AUTH);
            assert_eq!(body, "hunter2");
            write_packet(&mut server, id, packet_type::RESPONSE_VALUE, "").await;
            write_packet(&mut server, id, packet_type::AUTH_RESPONSE, "").await;

            let (id, kind, body) = read_packet(&mut server).await;
            assert_eq!(kind, packet_type::EXEC_COMMAND);
            assert_eq!(body, "/time");
            write_packet(&mut server, id, packet_type::RESPONSE_VALUE, "2 hours").await;
        });

        let mut connection = RconConnection::authenticate(client_stream, "hunter2")
            .await
            .unwrap();
        let output = connection.execute("/time").await.unwrap();
        assert_eq!(output, "2 hours");
        connection.close().await.unwrap();

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let (client_stream, mut server) = tokio::io::duplex(4096);

        tokio::spawn(async move {
            let _ = read_packet(&mut server).await;
            write_packet(&mut server, AUTH_FAILED_ID, packet_type::AUTH_RESPONSE, "").await;
        });

        let result = RconConnection::authenticate(client_stream, "wrong").await;
        assert!(matches!(result, Err(BackendError::AuthFailed)));
    }

    #[tokio::test]
    async fn test_server_hangs_up_mid_command() {
        let (client_stream, mut server) = tokio::io::duplex(4096);

        tokio::spawn(async move {
            let (id, _, _) = read_packet(&mut server).await;
            write_packet(&mut server, id, packet_type::AUTH_RESPONSE, "").await;
            let _ = read_packet(&mut server).await;
            drop(server);
        });

        let mut connection = RconConnection::authenticate(client_stream, "pw")
            .await
            .unwrap();
        let result = connection.execute("/players").await;
        assert!(matches!(result, Err(BackendError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = RconConnection::connect("127.0.0.1", port, "pw").await;
        assert!(matches!(result, Err(BackendError::ConnectFailed { .. })));
    }
}
