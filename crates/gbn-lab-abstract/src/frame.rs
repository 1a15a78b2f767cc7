use serde::{Deserialize, Serialize};

use crate::checksum::crc8;

/// Discriminator carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Data,
    Ack,
}

impl FrameKind {
    pub fn to_byte(self) -> u8 {
        match self {
            FrameKind::Data => 0,
            FrameKind::Ack => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(FrameKind::Data),
            1 => Some(FrameKind::Ack),
            _ => None,
        }
    }
}

/// A link-layer frame.
///
/// Frames are values: once built they are never mutated in place. The
/// checksum is taken over the payload when the frame is created, so a copy
/// whose payload was damaged in transit still carries the original checksum
/// and fails [`Frame::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    seq: u32,
    kind: FrameKind,
    payload: Vec<u8>,
    checksum: u8,
}

impl Frame {
    /// Build a DATA frame, computing its checksum.
    pub fn data(seq: u32, payload: Vec<u8>) -> Self {
        let checksum = crc8(&payload);
        Self {
            seq,
            kind: FrameKind::Data,
            payload,
            checksum,
        }
    }

    /// Build a pure ACK frame acknowledging `ack_seq`.
    pub fn ack(ack_seq: u32) -> Self {
        Self {
            seq: ack_seq,
            kind: FrameKind::Ack,
            payload: Vec::new(),
            checksum: crc8(&[]),
        }
    }

    /// Reassemble a frame from decoded fields without recomputing the checksum.
    pub fn from_parts(seq: u32, kind: FrameKind, payload: Vec<u8>, checksum: u8) -> Self {
        Self {
            seq,
            kind,
            payload,
            checksum,
        }
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn is_ack(&self) -> bool {
        self.kind == FrameKind::Ack
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Recompute the checksum over the carried payload and compare.
    pub fn verify(&self) -> bool {
        crc8(&self.payload) == self.checksum
    }

    /// Copy of this frame with payload bit `bit` (counted from the first
    /// byte's least significant bit) inverted. The checksum is kept as is.
    ///
    /// Returns `None` when `bit` lies outside the payload.
    pub fn with_flipped_bit(&self, bit: usize) -> Option<Self> {
        let byte = bit / 8;
        if byte >= self.payload.len() {
            return None;
        }
        let mut payload = self.payload.clone();
        payload[byte] ^= 1 << (bit % 8);
        Some(Self {
            payload,
            ..self.clone()
        })
    }
}
