//! RCON framing codec.
//!
//! Wire layout, all integers little-endian:
//! `size: i32 | id: i32 | type: i32 | body | 0x00 | 0x00`
//! where `size` counts everything after itself.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::common::error::BackendError;
use crate::protocol::rcon::packet::{
    RconPacket, MAX_INBOUND_PACKET, MAX_OUTBOUND_PACKET, PACKET_OVERHEAD,
};

/// Codec for RCON packets.
#[derive(Debug, Default)]
pub struct RconCodec;

impl Decoder for RconCodec {
    type Item = RconPacket;
    type Error = BackendError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let size = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if size < PACKET_OVERHEAD as i32 || size as usize > MAX_INBOUND_PACKET {
            return Err(BackendError::InvalidPacket {
                message: format!("bad packet size {}", size),
            });
        }
        let size = size as usize;

        if src.len() < 4 + size {
            src.reserve(4 + size - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut frame = src.split_to(size);
        let id = frame.get_i32_le();
        let kind = frame.get_i32_le();

        // Body runs up to the first NUL; the trailing empty string is ignored
        let body_end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
        let body = String::from_utf8_lossy(&frame[..body_end]).into_owned();

        Ok(Some(RconPacket { id, kind, body }))
    }
}

impl Encoder<RconPacket> for RconCodec {
    type Error = BackendError;

    fn encode(&mut self, item: RconPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.body.as_bytes().contains(&0) {
            return Err(BackendError::InvalidPacket {
                message: "body contains a NUL byte".to_string(),
            });
        }

        let size = item.wire_size();
        if size > MAX_OUTBOUND_PACKET {
            return Err(BackendError::InvalidPacket {
                message: format!(
                    "packet of {} bytes exceeds the {} byte limit",
                    size, MAX_OUTBOUND_PACKET
                ),
            });
        }

        dst.reserve(4 + size);
        dst.put_i32_le(size as i32);
        dst.put_i32_le(item.id);
        dst.put_i32_le(item.kind);
        dst.put_slice(item.body.as_bytes());
        dst.put_u8(0);
        dst.put_u8(0);

        Ok(())
    }
}

/// A framed RCON connection.
pub type RconFramed<S> = Framed<S, RconCodec>;

/// Create a new framed RCON connection from a stream.
pub fn new_rcon_framed<S: AsyncRead + AsyncWrite>(stream: S) -> RconFramed<S> {
    Framed::new(stream, RconCodec)
}
