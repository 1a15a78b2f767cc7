use serde::Serialize;

use crate::error::ProtocolError;
use crate::event::ArqEvent;
use crate::frame::Frame;

/// Capabilities a driver offers to a protocol endpoint.
///
/// Every call is a request; the driver decides when and how it happens
/// (virtual clock in the simulator, tokio tasks on the live link).
pub trait LinkContext {
    /// Hand a frame to the unreliable channel. Fault injection happens there.
    fn send_frame(&mut self, frame: Frame);

    /// Arm timer `timer_id` to fire after `delay_ms`.
    /// A timer that is already running under the same id is replaced.
    fn start_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Disarm a timer. Cancelling an idle timer is a no-op.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Pass payload bytes up to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Report a protocol event.
    fn emit(&mut self, event: ArqEvent);

    /// Current time in ms.
    fn now(&self) -> u64;
}

/// One end of the link: a sender or a receiver state machine.
pub trait LinkProtocol {
    /// Called once before any other event.
    fn init(&mut self, _ctx: &mut dyn LinkContext) {}

    /// A frame arrived from the channel.
    fn on_frame(&mut self, ctx: &mut dyn LinkContext, frame: Frame) -> Result<(), ProtocolError>;

    /// A timer armed through [`LinkContext::start_timer`] expired.
    fn on_timer(&mut self, ctx: &mut dyn LinkContext, timer_id: u32);

    /// The application wants `data` delivered reliably.
    fn on_app_data(&mut self, _ctx: &mut dyn LinkContext, _data: &[u8]) {}

    /// The application will not hand over any more data.
    fn on_app_close(&mut self, _ctx: &mut dyn LinkContext) {}

    /// True once the endpoint has nothing left to do.
    fn is_done(&self) -> bool {
        false
    }

    /// Transmission counters, when the endpoint keeps any.
    fn stats(&self) -> LinkStats {
        LinkStats::default()
    }
}

/// Counters kept by an endpoint over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub frames_sent: u32,
    pub retransmissions: u32,
    pub timeouts: u32,
    pub frames_delivered: u32,
}
