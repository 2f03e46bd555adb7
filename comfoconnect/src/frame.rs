//! Outer frame encoding: a 4-byte big-endian length prefix around a
//! protobuf-encoded [`comfoconnect_proto::GatewayEnvelope`].

use crate::error::TransportError;
use comfoconnect_proto::GatewayEnvelope;
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default ceiling on a frame's declared length (spec §4.1).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 64 * 1024;

/// Read exactly one length-prefixed frame from `reader`.
///
/// Returns the raw envelope bytes, not yet protobuf-decoded. A `None`
/// return means a clean EOF was observed before any bytes of a new frame
/// arrived; any other short read is an [`TransportError::UnexpectedEof`].
pub async fn read_frame<R>(
    reader: &mut R,
    max_len: u32,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];

    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TransportError::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf);

    if len == 0 || len > max_len {
        return Err(TransportError::FrameTooLarge {
            declared: len,
            max: max_len,
        });
    }

    let mut payload = vec![0u8; len as usize];

    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => TransportError::UnexpectedEof,
            _ => TransportError::Io(e),
        })?;

    Ok(Some(payload))
}

/// Write one length-prefixed frame to `writer` in a single logical write.
///
/// Callers are responsible for serializing access to `writer` (spec §3:
/// "only one writer may hold the transport write-half at a time").
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::FrameTooLarge {
            declared: u32::MAX,
            max: DEFAULT_MAX_FRAME_LEN,
        })?
        .to_be_bytes();

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len);
    frame.extend_from_slice(payload);

    writer.write_all(&frame).await.map_err(TransportError::Io)
}

/// Decode a raw frame payload into a [`GatewayEnvelope`].
pub fn decode_envelope(buf: &[u8]) -> Result<GatewayEnvelope, TransportError> {
    GatewayEnvelope::decode(buf).map_err(TransportError::MalformedEnvelope)
}

/// Encode a [`GatewayEnvelope`] into its raw frame payload.
pub fn encode_envelope(envelope: &GatewayEnvelope) -> Vec<u8> {
    envelope.encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use comfoconnect_proto::{GatewayOperation, OperationType};
    use std::io::Cursor;

    fn sample_envelope() -> GatewayEnvelope {
        GatewayEnvelope {
            src: vec![0xaa; 16],
            dst: vec![0xbb; 16],
            operation: Some(GatewayOperation {
                r#type: OperationType::KeepAlive as i32,
                reference: 42,
            }),
            payload: Vec::new(),
        }
    }

    #[tokio::test]
    async fn round_trips_a_well_formed_frame() {
        let envelope = sample_envelope();
        let encoded = encode_envelope(&envelope);

        let mut wire = Vec::new();
        write_frame(&mut wire, &encoded).await.unwrap();

        let mut cursor = Cursor::new(wire);
        let decoded_payload = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap()
            .expect("frame present");

        let decoded = decode_envelope(&decoded_payload).unwrap();

        assert_eq!(decoded, envelope);
    }

    #[tokio::test]
    async fn rejects_a_frame_declaring_zero_length() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&0u32.to_be_bytes());

        let mut cursor = Cursor::new(wire);
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::FrameTooLarge { declared: 0, .. }));
    }

    #[tokio::test]
    async fn rejects_a_frame_over_the_configured_ceiling() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(DEFAULT_MAX_FRAME_LEN + 1).to_be_bytes());

        let mut cursor = Cursor::new(wire);
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn clean_eof_before_any_frame_bytes_is_not_an_error() {
        let mut cursor = Cursor::new(Vec::<u8>::new());

        let frame = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).await.unwrap();

        assert!(frame.is_none());
    }
}
