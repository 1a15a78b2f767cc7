//! Fixed-size wire encoding of [`Frame`]s.
//!
//! ```text
//!  0       4    5      7                 7+P   8+P
//!  ┌───────┬────┬──────┬─────────────────┬─────┐
//!  │  seq  │kind│ len  │ payload (P, pad)│ crc │
//!  └───────┴────┴──────┴─────────────────┴─────┘
//! ```
//!
//! All integers are big-endian. `P` is the configured payload size; shorter
//! payloads are zero-padded so every block on the wire has the same length.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use gbn_lab_abstract::{ArqConfig, Frame, FrameKind, ProtocolError, crc8};

use crate::seq::SeqSpace;

const HEADER_LEN: usize = 4 + 1 + 2;
const TRAILER_LEN: usize = 1;

/// Checksum of `payload`.
pub fn compute_checksum(payload: &[u8]) -> u8 {
    crc8(payload)
}

/// True iff the checksum carried by `frame` matches its payload.
pub fn verify(frame: &Frame) -> bool {
    frame.verify()
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    payload_size: usize,
    space: SeqSpace,
}

impl FrameCodec {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            payload_size: config.payload_size,
            space: SeqSpace::new(config.sequence_space),
        }
    }

    /// Length of every encoded block.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_size + TRAILER_LEN
    }

    /// # Panics
    ///
    /// Panics in debug mode if the payload is larger than the configured
    /// payload size. Endpoints never build such frames.
    pub fn encode(&self, frame: &Frame) -> Bytes {
        debug_assert!(
            frame.len() <= self.payload_size,
            "payload of {} bytes exceeds payload size {}",
            frame.len(),
            self.payload_size
        );
        let len = frame.len().min(self.payload_size);
        let mut buf = BytesMut::with_capacity(self.frame_len());
        buf.put_u32(frame.seq());
        buf.put_u8(frame.kind().to_byte());
        buf.put_u16(len as u16);
        buf.put_slice(&frame.payload()[..len]);
        buf.put_bytes(0, self.payload_size - len);
        buf.put_u8(frame.checksum());
        buf.freeze()
    }

    /// Parse one block. Checksum mismatches are not errors here; the
    /// receiver decides what to do with a damaged frame.
    pub fn decode(&self, block: &[u8]) -> Result<Frame, ProtocolError> {
        if block.len() != self.frame_len() {
            return Err(ProtocolError::FrameLength {
                expected: self.frame_len(),
                actual: block.len(),
            });
        }
        let mut buf = block;
        let seq = buf.get_u32();
        let kind_byte = buf.get_u8();
        let len = buf.get_u16() as usize;

        let kind = FrameKind::from_byte(kind_byte).ok_or(ProtocolError::UnknownKind(kind_byte))?;
        if !self.space.contains(seq) {
            return Err(ProtocolError::SequenceOutOfRange {
                seq,
                space: self.space.modulus(),
            });
        }
        if len > self.payload_size {
            return Err(ProtocolError::PayloadOverflow {
                len,
                max: self.payload_size,
            });
        }

        let payload = buf[..len].to_vec();
        buf.advance(self.payload_size);
        let checksum = buf.get_u8();
        Ok(Frame::from_parts(seq, kind, payload, checksum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new(&ArqConfig {
            payload_size: 8,
            ..Default::default()
        })
    }

    #[test]
    fn blocks_have_fixed_length() {
        let codec = codec();
        assert_eq!(codec.encode(&Frame::data(1, b"ab".to_vec())).len(), 16);
        assert_eq!(codec.encode(&Frame::ack(1)).len(), 16);
        assert_eq!(codec.frame_len(), 16);
    }

    #[test]
    fn layout_is_big_endian_and_padded() {
        let codec = codec();
        let frame = Frame::data(5, vec![0xAA, 0xBB]);
        let block = codec.encode(&frame);
        assert_eq!(&block[..7], &[0, 0, 0, 5, 0, 0, 2]);
        assert_eq!(&block[7..9], &[0xAA, 0xBB]);
        assert!(block[9..15].iter().all(|b| *b == 0));
        assert_eq!(block[15], compute_checksum(&[0xAA, 0xBB]));
    }

    #[test]
    fn decode_restores_frame_and_keeps_damaged_checksum() {
        let codec = codec();
        let frame = Frame::data(3, b"payload".to_vec());
        let damaged = frame.with_flipped_bit(4).expect("in range");

        let decoded = codec.decode(&codec.encode(&damaged)).expect("well formed");
        assert_eq!(decoded, damaged);
        assert!(!verify(&decoded));

        let ack = codec.decode(&codec.encode(&Frame::ack(7))).expect("well formed");
        assert!(ack.is_ack());
        assert_eq!(ack.seq(), 7);
        assert!(verify(&ack));
    }

    #[test]
    fn rejects_wrong_length() {
        let codec = codec();
        let block = codec.encode(&Frame::ack(0));
        assert_eq!(
            codec.decode(&block[..10]),
            Err(ProtocolError::FrameLength {
                expected: 16,
                actual: 10
            })
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        let codec = codec();
        let mut block = codec.encode(&Frame::ack(0)).to_vec();
        block[4] = 9;
        assert_eq!(codec.decode(&block), Err(ProtocolError::UnknownKind(9)));
    }

    #[test]
    fn rejects_sequence_outside_space() {
        let codec = codec();
        let mut block = codec.encode(&Frame::data(0, vec![1])).to_vec();
        block[3] = 8;
        assert_eq!(
            codec.decode(&block),
            Err(ProtocolError::SequenceOutOfRange { seq: 8, space: 8 })
        );
    }

    #[test]
    fn rejects_oversized_length_field() {
        let codec = codec();
        let mut block = codec.encode(&Frame::data(0, vec![1])).to_vec();
        block[6] = 9;
        assert_eq!(
            codec.decode(&block),
            Err(ProtocolError::PayloadOverflow { len: 9, max: 8 })
        );
    }
}
