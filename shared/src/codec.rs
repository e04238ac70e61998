//! Stream-level framing: reading and writing whole packets over a byte
//! stream, plus a `tokio_util` codec for cancel-safe framed reads.

use bytes::{Buf, BytesMut};
use std::io::IoSlice;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};
use crate::packet::{Packet, HEADER_LENGTH, MAX_PACKET_LENGTH};
use crate::transport::{read_full, write_full_vectored};

/// Reads exactly one packet.
///
/// EOF before the first header byte is [`ProtocolError::Closed`]; EOF
/// anywhere later is a short read.
pub async fn read_packet<R>(reader: &mut R, validate: bool) -> Result<Packet>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LENGTH];
    let n = read_full(reader, &mut header).await?;
    if n == 0 {
        return Err(ProtocolError::Closed);
    }
    if n < HEADER_LENGTH {
        return Err(ProtocolError::ShortRead {
            expected: HEADER_LENGTH,
            actual: n,
        });
    }
    let event = Packet::decode_header(u32::from_be_bytes(header))?;

    let mut payload = vec![0u8; event.payload_len()];
    let n = read_full(reader, &mut payload).await?;
    if n < payload.len() {
        return Err(ProtocolError::ShortRead {
            expected: event.packet_len(),
            actual: HEADER_LENGTH + n,
        });
    }

    let packet = Packet::decode_payload(event, &mut payload.as_slice());
    if validate {
        packet.validate()?;
    }
    Ok(packet)
}

/// Writes one packet, header and payload as two segments of a single
/// vectored write sequence.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = (packet.event() as u32).to_be_bytes();
    let mut payload = BytesMut::with_capacity(packet.event().payload_len());
    packet.encode_payload(&mut payload);

    let expected = HEADER_LENGTH + payload.len();
    let mut bufs = [IoSlice::new(&header), IoSlice::new(&payload)];
    let written = write_full_vectored(writer, &mut bufs).await?;
    if written < expected {
        return Err(ProtocolError::ShortWrite {
            expected,
            actual: written,
        });
    }
    writer.flush().await?;
    Ok(())
}

/// Framing codec. Decoding only checks framing; callers run
/// [`Packet::validate`] themselves so a bad field can be answered
/// instead of dropping the connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlsCodec;

impl Decoder for GlsCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < HEADER_LENGTH {
            src.reserve(MAX_PACKET_LENGTH);
            return Ok(None);
        }

        let raw = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        let event = Packet::decode_header(raw)?;
        let len = event.packet_len();
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(len);
        frame.advance(HEADER_LENGTH);
        Ok(Some(Packet::decode_payload(event, &mut frame)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => {
                let expected = if src.len() < HEADER_LENGTH {
                    HEADER_LENGTH
                } else {
                    let raw = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
                    Packet::decode_header(raw)?.packet_len()
                };
                Err(ProtocolError::ShortRead {
                    expected,
                    actual: src.len(),
                })
            }
        }
    }
}

impl Encoder<Packet> for GlsCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        packet.encode_into(dst);
        Ok(())
    }
}
