use thiserror::Error;

use crate::frame::FrameKind;

/// Rejected configuration. Raised once at startup, never at runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("window_size must be at least 1")]
    ZeroWindow,
    #[error("sequence_space ({space}) must be larger than window_size ({window})")]
    SequenceSpaceTooSmall { space: u32, window: u32 },
    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,
    #[error("payload_size must be between 1 and {max}, got {size}")]
    PayloadSize { size: usize, max: usize },
    #[error("{name} must lie in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("min_latency ({min}) exceeds max_latency ({max})")]
    Latency { min: u64, max: u64 },
}

/// A peer broke the framing or the protocol. There is no recovery path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameLength { expected: usize, actual: usize },
    #[error("unknown frame kind byte {0:#04x}")]
    UnknownKind(u8),
    #[error("sequence number {seq} outside sequence space {space}")]
    SequenceOutOfRange { seq: u32, space: u32 },
    #[error("declared payload length {len} exceeds payload size {max}")]
    PayloadOverflow { len: usize, max: usize },
    #[error("{role} received an unexpected {kind:?} frame")]
    UnexpectedKind { role: &'static str, kind: FrameKind },
}
