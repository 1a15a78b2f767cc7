//! A [`LinkContext`] that just records what an endpoint asked for.
//!
//! Useful for driving a state machine by hand, one event at a time.

use gbn_lab_abstract::{ArqEvent, Frame, LinkContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    /// `(delay_ms, timer_id)`
    Start(u64, u32),
    Cancel(u32),
}

#[derive(Debug, Default)]
pub struct RecordingContext {
    pub now: u64,
    pub sent: Vec<Frame>,
    pub timer_ops: Vec<TimerOp>,
    pub delivered: Vec<Vec<u8>>,
    pub events: Vec<ArqEvent>,
}

impl RecordingContext {
    /// Sequence numbers of the recorded outbound frames, in send order.
    pub fn sent_seqs(&self) -> Vec<u32> {
        self.sent.iter().map(Frame::seq).collect()
    }

    /// Forget everything recorded so far, keeping the clock.
    pub fn clear(&mut self) {
        self.sent.clear();
        self.timer_ops.clear();
        self.delivered.clear();
        self.events.clear();
    }
}

impl LinkContext for RecordingContext {
    fn send_frame(&mut self, frame: Frame) {
        self.sent.push(frame);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.timer_ops.push(TimerOp::Start(delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.timer_ops.push(TimerOp::Cancel(timer_id));
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.delivered.push(data.to_vec());
    }

    fn emit(&mut self, event: ArqEvent) {
        self.events.push(event);
    }

    fn now(&self) -> u64 {
        self.now
    }
}
