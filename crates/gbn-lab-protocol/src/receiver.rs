use gbn_lab_abstract::{
    ArqConfig, ArqEvent, Frame, FrameKind, LinkContext, LinkProtocol, LinkStats, ProtocolError,
};

use crate::seq::SeqSpace;

/// Go-Back-N receiver: accepts frames strictly in order and ACKs cumulatively.
///
/// Holds no buffer and no timer; `expected_seq` is its whole state.
#[derive(Debug)]
pub struct GbnReceiver {
    space: SeqSpace,
    expected_seq: u32,
    stats: LinkStats,
}

impl GbnReceiver {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            space: SeqSpace::new(config.sequence_space),
            expected_seq: 0,
            stats: LinkStats::default(),
        }
    }

    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Last sequence number accepted in order (`expected_seq - 1`).
    pub fn last_accepted(&self) -> u32 {
        self.space.prev(self.expected_seq)
    }

    /// Handle an inbound DATA frame.
    pub fn on_data(&mut self, ctx: &mut dyn LinkContext, frame: Frame) {
        if !frame.verify() {
            ctx.emit(ArqEvent::FrameDiscardedCorrupt { seq: frame.seq() });
            self.send_ack(ctx, self.last_accepted());
            return;
        }
        if frame.seq() != self.expected_seq {
            ctx.emit(ArqEvent::FrameDiscardedOutOfOrder {
                seq: frame.seq(),
                expected: self.expected_seq,
            });
            self.send_ack(ctx, self.last_accepted());
            return;
        }

        ctx.emit(ArqEvent::FrameReceived {
            seq: frame.seq(),
            len: frame.len(),
        });
        ctx.deliver_data(frame.payload());
        self.stats.frames_delivered += 1;
        self.expected_seq = self.space.next(self.expected_seq);
        self.send_ack(ctx, frame.seq());
    }

    pub fn send_ack(&mut self, ctx: &mut dyn LinkContext, ack_seq: u32) {
        ctx.emit(ArqEvent::AckSent { ack: ack_seq });
        ctx.send_frame(Frame::ack(ack_seq));
        self.stats.frames_sent += 1;
    }
}

impl LinkProtocol for GbnReceiver {
    fn on_frame(&mut self, ctx: &mut dyn LinkContext, frame: Frame) -> Result<(), ProtocolError> {
        match frame.kind() {
            FrameKind::Data => {
                self.on_data(ctx, frame);
                Ok(())
            }
            kind => Err(ProtocolError::UnexpectedKind {
                role: "receiver",
                kind,
            }),
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn LinkContext, _timer_id: u32) {}

    fn stats(&self) -> LinkStats {
        self.stats
    }
}
