use serde::Serialize;

/// Structured protocol event handed to whoever observes a run.
///
/// Protocol code only constructs these; formatting and storage belong to
/// the driver (simulator trace, tracing logs, CLI output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArqEvent {
    /// Sender handed a DATA frame to the channel.
    FrameSent { seq: u32, retransmission: bool },
    /// Channel lost a DATA frame.
    FrameDropped { seq: u32 },
    /// Channel flipped payload bit `bit` of a DATA frame.
    FrameCorrupted { seq: u32, bit: usize },
    /// Receiver accepted an in-order DATA frame.
    FrameReceived { seq: u32, len: usize },
    /// Receiver discarded a DATA frame whose checksum did not match.
    FrameDiscardedCorrupt { seq: u32 },
    /// Receiver discarded a DATA frame that was not the one it expected.
    FrameDiscardedOutOfOrder { seq: u32, expected: u32 },
    /// Receiver handed an ACK to the channel.
    AckSent { ack: u32 },
    /// Channel lost an ACK.
    AckDropped { ack: u32 },
    /// Sender processed an ACK. `base` is the window base afterwards;
    /// `advanced` is false for stale or duplicate ACKs.
    AckReceived { ack: u32, base: u32, advanced: bool },
    /// Base timer expired; `frames` DATA frames are about to be resent.
    Timeout { base: u32, frames: usize },
}

impl ArqEvent {
    /// Short lowercase name used in logs and scenario assertions.
    pub fn name(&self) -> &'static str {
        match self {
            ArqEvent::FrameSent { .. } => "frame_sent",
            ArqEvent::FrameDropped { .. } => "frame_dropped",
            ArqEvent::FrameCorrupted { .. } => "frame_corrupted",
            ArqEvent::FrameReceived { .. } => "frame_received",
            ArqEvent::FrameDiscardedCorrupt { .. } => "frame_discarded_corrupt",
            ArqEvent::FrameDiscardedOutOfOrder { .. } => "frame_discarded_out_of_order",
            ArqEvent::AckSent { .. } => "ack_sent",
            ArqEvent::AckDropped { .. } => "ack_dropped",
            ArqEvent::AckReceived { .. } => "ack_received",
            ArqEvent::Timeout { .. } => "timeout",
        }
    }

    pub fn is_retransmission(&self) -> bool {
        matches!(
            self,
            ArqEvent::FrameSent {
                retransmission: true,
                ..
            }
        )
    }
}
