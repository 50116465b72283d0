//! Source RCON packet definitions.

/// RCON packet types.
///
/// `AUTH_RESPONSE` and `EXEC_COMMAND` share a value; direction tells them apart.
pub mod packet_type {
    /// Server -> Client: command output
    pub const RESPONSE_VALUE: i32 = 0;
    /// Client -> Server: run a console command
    pub const EXEC_COMMAND: i32 = 2;
    /// Server -> Client: result of an auth attempt
    pub const AUTH_RESPONSE: i32 = 2;
    /// Client -> Server: password
    pub const AUTH: i32 = 3;
}

/// Request id the server answers with when the password is wrong.
pub const AUTH_FAILED_ID: i32 = -1;

/// Bytes counted by the size field besides the body: id, type, two NULs.
pub const PACKET_OVERHEAD: usize = 4 + 4 + 2;

/// Largest packet the protocol lets a client send, size field excluded.
pub const MAX_OUTBOUND_PACKET: usize = 4096;

/// Largest packet accepted from the server, size field excluded.
pub const MAX_INBOUND_PACKET: usize = 4 * 1024 * 1024;

/// A single RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl RconPacket {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn auth(id: i32, password: &str) -> Self {
        Self::new(id, packet_type::AUTH, password)
    }

    pub fn exec(id: i32, command: &str) -> Self {
        Self::new(id, packet_type::EXEC_COMMAND, command)
    }

    /// Value of the size field for this packet.
    pub fn wire_size(&self) -> usize {
        PACKET_OVERHEAD + self.body.len()
    }
}

/// Get a human-readable name for a packet type as sent by the server.
pub fn server_type_name(kind: i32) -> &'static str {
    match kind {
        packet_type::RESPONSE_VALUE => "SERVERDATA_RESPONSE_VALUE",
        packet_type::AUTH_RESPONSE => "SERVERDATA_AUTH_RESPONSE",
        _ => "UNKNOWN",
    }
}
