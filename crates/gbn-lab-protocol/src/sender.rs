//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] keeps up to `window_size` DATA frames in flight. ACKs are
//! cumulative: an ACK for `k` confirms every outstanding frame up to and
//! including `k`. A single timer guards the window base; when it expires the
//! whole outstanding window is sent again in order.
//!
//! ```text
//!      base              next_seq
//!       │                   │
//!  ─────┼───────────────────┼──────────────▶ seq space (mod N)
//!       │ <── in flight ──▶ │ <── usable ──▶
//! ```
//!
//! The state machine performs no I/O; frames, timers and events go through
//! the [`LinkContext`] it is driven with.

use std::collections::VecDeque;

use gbn_lab_abstract::{
    ArqConfig, ArqEvent, Frame, FrameKind, LinkContext, LinkProtocol, LinkStats, ProtocolError,
};

use crate::seq::SeqSpace;

/// Id of the single retransmission timer.
pub const RETRANSMIT_TIMER: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Nothing in flight.
    Idle,
    /// Some frames in flight, room for more.
    Sending,
    /// `window_size` frames in flight.
    WindowFull,
    /// Stream closed and every frame acknowledged.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running { deadline: u64 },
}

#[derive(Debug)]
pub struct GbnSender {
    config: ArqConfig,
    space: SeqSpace,
    /// Oldest unacknowledged sequence number.
    base: u32,
    /// Sequence number of the next new frame.
    next_seq: u32,
    /// In-flight frames, front is `base`.
    outstanding: VecDeque<Frame>,
    /// Application chunks not yet framed.
    pending: VecDeque<Vec<u8>>,
    timer: TimerState,
    closed: bool,
    stats: LinkStats,
}

impl GbnSender {
    /// `config` must already be validated.
    pub fn new(config: ArqConfig) -> Self {
        let space = SeqSpace::new(config.sequence_space);
        let window = config.window_size as usize;
        Self {
            config,
            space,
            base: 0,
            next_seq: 0,
            outstanding: VecDeque::with_capacity(window),
            pending: VecDeque::new(),
            timer: TimerState::Stopped,
            closed: false,
            stats: LinkStats::default(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn in_flight(&self) -> usize {
        self.outstanding.len()
    }

    pub fn pending_chunks(&self) -> usize {
        self.pending.len()
    }

    pub fn timer(&self) -> TimerState {
        self.timer
    }

    pub fn is_window_full(&self) -> bool {
        self.outstanding.len() >= self.config.window_size as usize
    }

    pub fn state(&self) -> SenderState {
        if self.outstanding.is_empty() {
            if self.closed && self.pending.is_empty() {
                SenderState::Done
            } else {
                SenderState::Idle
            }
        } else if self.is_window_full() {
            SenderState::WindowFull
        } else {
            SenderState::Sending
        }
    }

    /// Frame and transmit the next pending chunk.
    ///
    /// Returns `false` without side effects when the window is full or no
    /// data is waiting.
    pub fn send_next(&mut self, ctx: &mut dyn LinkContext) -> bool {
        if self.is_window_full() {
            return false;
        }
        let Some(payload) = self.pending.pop_front() else {
            return false;
        };

        let frame = Frame::data(self.next_seq, payload);
        ctx.emit(ArqEvent::FrameSent {
            seq: frame.seq(),
            retransmission: false,
        });
        ctx.send_frame(frame.clone());
        self.stats.frames_sent += 1;
        self.outstanding.push_back(frame);

        if self.timer == TimerState::Stopped {
            self.start_timer(ctx);
        }
        self.next_seq = self.space.next(self.next_seq);
        true
    }

    /// Send as many pending chunks as the window allows.
    pub fn fill_window(&mut self, ctx: &mut dyn LinkContext) {
        while self.send_next(ctx) {}
    }

    /// Process a cumulative ACK for `ack_seq`.
    ///
    /// ACKs outside `[base, next_seq)` are stale or duplicates and leave the
    /// state untouched. Returns the number of newly acknowledged frames.
    pub fn on_ack(&mut self, ctx: &mut dyn LinkContext, ack_seq: u32) -> usize {
        let in_flight = self.outstanding.len() as u32;
        if !self.space.in_window(ack_seq, self.base, in_flight) {
            ctx.emit(ArqEvent::AckReceived {
                ack: ack_seq,
                base: self.base,
                advanced: false,
            });
            return 0;
        }

        let acked = self.space.distance(self.base, ack_seq) as usize + 1;
        self.outstanding.drain(..acked);
        self.base = self.space.next(ack_seq);
        ctx.emit(ArqEvent::AckReceived {
            ack: ack_seq,
            base: self.base,
            advanced: true,
        });

        if self.outstanding.is_empty() {
            self.stop_timer(ctx);
        } else {
            self.start_timer(ctx);
        }
        self.fill_window(ctx);
        acked
    }

    /// Base timer expired: resend every outstanding frame in order.
    pub fn on_timeout(&mut self, ctx: &mut dyn LinkContext) {
        if self.outstanding.is_empty() {
            self.timer = TimerState::Stopped;
            return;
        }
        self.stats.timeouts += 1;
        ctx.emit(ArqEvent::Timeout {
            base: self.base,
            frames: self.outstanding.len(),
        });
        for frame in &self.outstanding {
            ctx.emit(ArqEvent::FrameSent {
                seq: frame.seq(),
                retransmission: true,
            });
            ctx.send_frame(frame.clone());
            self.stats.frames_sent += 1;
            self.stats.retransmissions += 1;
        }
        self.start_timer(ctx);
    }

    /// Split `data` into payload-sized chunks and queue them.
    pub fn enqueue(&mut self, data: &[u8]) {
        for chunk in data.chunks(self.config.payload_size) {
            self.pending.push_back(chunk.to_vec());
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    fn start_timer(&mut self, ctx: &mut dyn LinkContext) {
        ctx.start_timer(self.config.timeout_ms, RETRANSMIT_TIMER);
        self.timer = TimerState::Running {
            deadline: ctx.now() + self.config.timeout_ms,
        };
    }

    fn stop_timer(&mut self, ctx: &mut dyn LinkContext) {
        if let TimerState::Running { .. } = self.timer {
            ctx.cancel_timer(RETRANSMIT_TIMER);
            self.timer = TimerState::Stopped;
        }
    }
}

impl LinkProtocol for GbnSender {
    fn on_frame(&mut self, ctx: &mut dyn LinkContext, frame: Frame) -> Result<(), ProtocolError> {
        match frame.kind() {
            FrameKind::Ack => {
                self.on_ack(ctx, frame.seq());
                Ok(())
            }
            kind => Err(ProtocolError::UnexpectedKind {
                role: "sender",
                kind,
            }),
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn LinkContext, timer_id: u32) {
        if timer_id == RETRANSMIT_TIMER {
            self.on_timeout(ctx);
        }
    }

    fn on_app_data(&mut self, ctx: &mut dyn LinkContext, data: &[u8]) {
        self.enqueue(data);
        self.fill_window(ctx);
    }

    fn on_app_close(&mut self, _ctx: &mut dyn LinkContext) {
        self.close();
    }

    fn is_done(&self) -> bool {
        self.state() == SenderState::Done
    }

    fn stats(&self) -> LinkStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{RecordingContext, TimerOp};

    fn config(window_size: u32, sequence_space: u32) -> ArqConfig {
        ArqConfig {
            window_size,
            sequence_space,
            timeout_ms: 100,
            payload_size: 1,
        }
    }

    fn sender_with(window: u32, space: u32, chunks: usize) -> (GbnSender, RecordingContext) {
        let mut sender = GbnSender::new(config(window, space));
        let mut ctx = RecordingContext::default();
        let data: Vec<u8> = (0..chunks as u8).collect();
        sender.on_app_data(&mut ctx, &data);
        (sender, ctx)
    }

    #[test]
    fn starts_idle() {
        let sender = GbnSender::new(config(4, 8));
        assert_eq!(sender.state(), SenderState::Idle);
        assert_eq!(sender.timer(), TimerState::Stopped);
        assert!(!sender.is_done());
    }

    #[test]
    fn fills_window_and_stops_when_full() {
        let (sender, ctx) = sender_with(4, 8, 6);
        assert_eq!(ctx.sent_seqs(), vec![0, 1, 2, 3]);
        assert_eq!(sender.state(), SenderState::WindowFull);
        assert_eq!(sender.pending_chunks(), 2);
        assert_eq!(sender.next_seq(), 4);
        // Timer started exactly once, by the first frame.
        assert_eq!(ctx.timer_ops, vec![TimerOp::Start(100, RETRANSMIT_TIMER)]);
    }

    #[test]
    fn send_next_refuses_when_window_full() {
        let (mut sender, mut ctx) = sender_with(2, 3, 3);
        ctx.clear();
        assert!(!sender.send_next(&mut ctx));
        assert!(ctx.sent.is_empty());
    }

    #[test]
    fn cumulative_ack_slides_window_and_refills() {
        let (mut sender, mut ctx) = sender_with(4, 8, 6);
        ctx.clear();

        assert_eq!(sender.on_ack(&mut ctx, 1), 2);
        assert_eq!(sender.base(), 2);
        assert_eq!(ctx.sent_seqs(), vec![4, 5]);
        assert_eq!(sender.in_flight(), 4);
        assert_eq!(
            ctx.timer_ops,
            vec![TimerOp::Start(100, RETRANSMIT_TIMER)],
            "timer restarted for the new base"
        );
    }

    #[test]
    fn final_ack_stops_timer() {
        let (mut sender, mut ctx) = sender_with(4, 8, 3);
        ctx.clear();
        sender.on_ack(&mut ctx, 2);
        assert_eq!(sender.base(), 3);
        assert_eq!(sender.state(), SenderState::Idle);
        assert_eq!(sender.timer(), TimerState::Stopped);
        assert_eq!(ctx.timer_ops, vec![TimerOp::Cancel(RETRANSMIT_TIMER)]);

        sender.on_app_close(&mut ctx);
        assert_eq!(sender.state(), SenderState::Done);
        assert!(sender.is_done());
    }

    #[test]
    fn closing_with_frames_in_flight_is_not_done() {
        let (mut sender, mut ctx) = sender_with(4, 8, 2);
        sender.on_app_close(&mut ctx);
        assert_eq!(sender.state(), SenderState::Sending);
        sender.on_ack(&mut ctx, 1);
        assert_eq!(sender.state(), SenderState::Done);
    }

    #[test]
    fn duplicate_ack_is_idempotent() {
        let (mut once, mut ctx_once) = sender_with(4, 8, 4);
        once.on_ack(&mut ctx_once, 1);

        let (mut twice, mut ctx_twice) = sender_with(4, 8, 4);
        twice.on_ack(&mut ctx_twice, 1);
        ctx_twice.clear();
        assert_eq!(twice.on_ack(&mut ctx_twice, 1), 0);

        assert_eq!(twice.base(), once.base());
        assert_eq!(twice.next_seq(), once.next_seq());
        assert_eq!(twice.in_flight(), once.in_flight());
        assert_eq!(twice.timer(), once.timer());
        assert!(ctx_twice.sent.is_empty());
        assert!(ctx_twice.timer_ops.is_empty());
        assert_eq!(
            ctx_twice.events,
            vec![ArqEvent::AckReceived {
                ack: 1,
                base: 2,
                advanced: false
            }]
        );
    }

    #[test]
    fn ack_outside_outstanding_range_is_ignored() {
        let (mut sender, mut ctx) = sender_with(4, 8, 4);
        // Receiver's initial re-ACK of "nothing yet" is seq_space - 1.
        assert_eq!(sender.on_ack(&mut ctx, 7), 0);
        // Not yet sent.
        assert_eq!(sender.on_ack(&mut ctx, 5), 0);
        assert_eq!(sender.base(), 0);
        assert_eq!(sender.in_flight(), 4);
    }

    #[test]
    fn timeout_retransmits_whole_window_in_order() {
        let (mut sender, mut ctx) = sender_with(4, 8, 4);
        sender.on_ack(&mut ctx, 0);
        ctx.clear();

        sender.on_timer(&mut ctx, RETRANSMIT_TIMER);
        assert_eq!(ctx.sent_seqs(), vec![1, 2, 3]);
        assert!(ctx.sent.iter().all(Frame::verify));
        assert_eq!(ctx.timer_ops, vec![TimerOp::Start(100, RETRANSMIT_TIMER)]);
        assert_eq!(
            ctx.events[0],
            ArqEvent::Timeout { base: 1, frames: 3 }
        );
        assert!(ctx.events[1..].iter().all(ArqEvent::is_retransmission));

        let stats = sender.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.retransmissions, 3);
        assert_eq!(stats.frames_sent, 7);
    }

    #[test]
    fn timeout_with_empty_window_does_nothing() {
        let mut sender = GbnSender::new(config(4, 8));
        let mut ctx = RecordingContext::default();
        sender.on_timer(&mut ctx, RETRANSMIT_TIMER);
        assert!(ctx.sent.is_empty());
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn sequence_numbers_wrap_and_base_follows() {
        let (mut sender, mut ctx) = sender_with(2, 3, 7);
        let mut bases = vec![sender.base()];
        let mut ack = 0;
        while sender.in_flight() > 0 {
            sender.on_ack(&mut ctx, ack);
            bases.push(sender.base());
            ack = (ack + 1) % 3;
        }
        assert_eq!(ctx.sent_seqs(), vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(bases, vec![0, 1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn rejects_data_frames() {
        let mut sender = GbnSender::new(config(4, 8));
        let mut ctx = RecordingContext::default();
        assert_eq!(
            sender.on_frame(&mut ctx, Frame::data(0, vec![1])),
            Err(ProtocolError::UnexpectedKind {
                role: "sender",
                kind: FrameKind::Data
            })
        );
    }

    #[test]
    fn chunks_application_data_by_payload_size() {
        let mut sender = GbnSender::new(ArqConfig {
            payload_size: 4,
            ..config(8, 9)
        });
        let mut ctx = RecordingContext::default();
        sender.on_app_data(&mut ctx, b"abcdefghij");
        let payloads: Vec<&[u8]> = ctx.sent.iter().map(Frame::payload).collect();
        assert_eq!(payloads, vec![&b"abcd"[..], &b"efgh"[..], &b"ij"[..]]);
    }
}
