//! Go-Back-N protocol core: sequence arithmetic, wire codec, fault
//! injection, and the sender/receiver state machines.

pub mod codec;
pub mod fault;
pub mod receiver;
pub mod recording;
pub mod sender;
pub mod seq;

use gbn_lab_abstract::{ArqConfig, LinkProtocol};

pub use codec::{FrameCodec, compute_checksum, verify};
pub use fault::{FaultInjector, FaultOutcome};
pub use receiver::GbnReceiver;
pub use sender::{GbnSender, RETRANSMIT_TIMER, SenderState, TimerState};
pub use seq::SeqSpace;

pub fn gbn_sender(config: &ArqConfig) -> Box<dyn LinkProtocol + Send> {
    Box::new(GbnSender::new(config.clone()))
}

pub fn gbn_receiver(config: &ArqConfig) -> Box<dyn LinkProtocol + Send> {
    Box::new(GbnReceiver::new(config))
}
