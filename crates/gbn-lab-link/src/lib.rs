//! Concurrent Go-Back-N link: the sender and the receiver run as separate
//! tokio tasks and share nothing but a [`Channel`].

pub mod channel;
pub mod driver;

use gbn_lab_abstract::SimConfig;
use gbn_lab_protocol::{FaultInjector, gbn_receiver, gbn_sender};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

pub use channel::{Channel, ChannelError, MemoryChannel};
pub use driver::{LinkDriver, LinkError, LinkOutcome, Role, TimedEvent};

/// Both sides of one finished transfer.
#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub sender: LinkOutcome,
    pub receiver: LinkOutcome,
}

impl LinkReport {
    pub fn delivered_bytes(&self) -> Vec<u8> {
        self.receiver.delivered.concat()
    }
}

/// Send `message` from a GBN sender task to a GBN receiver task over an
/// in-memory channel, with faults drawn from `config.faults`.
///
/// The two directions use independent random streams.
pub async fn run_link(config: &SimConfig, message: &[u8]) -> Result<LinkReport, LinkError> {
    let data_faults = FaultInjector::new(config.faults.clone());
    let mut ack_config = config.faults.clone();
    ack_config.seed = ack_config.seed.wrapping_add(1);
    let ack_faults = FaultInjector::new(ack_config);
    run_link_with(config, message, data_faults, ack_faults).await
}

/// Like [`run_link`], with caller-supplied injectors for the DATA direction
/// (`data_faults`) and the ACK direction (`ack_faults`).
pub async fn run_link_with(
    config: &SimConfig,
    message: &[u8],
    data_faults: FaultInjector,
    ack_faults: FaultInjector,
) -> Result<LinkReport, LinkError> {
    let (sender_end, receiver_end) = MemoryChannel::pair();
    let (app_tx, app_rx) = mpsc::unbounded_channel();

    let sender = LinkDriver::new(Role::Sender, gbn_sender(&config.arq), sender_end, &config.arq)
        .with_faults(data_faults)
        .with_app_input(app_rx);
    let receiver = LinkDriver::new(
        Role::Receiver,
        gbn_receiver(&config.arq),
        receiver_end,
        &config.arq,
    )
    .with_faults(ack_faults);

    let sender = tokio::spawn(sender.run());
    let receiver = tokio::spawn(receiver.run());

    // The sender task is alive until it has seen the close, so this only
    // fails if it already returned with an error, which the join reports.
    let _ = app_tx.send(message.to_vec());
    drop(app_tx);

    let sender = sender.await??;
    let receiver = receiver.await??;
    info!(
        "Link finished: {} frames sent, {} retransmissions, {} chunks delivered",
        sender.stats.frames_sent,
        sender.stats.retransmissions,
        receiver.delivered.len()
    );
    if !sender.completed {
        return Err(LinkError::Incomplete);
    }
    Ok(LinkReport { sender, receiver })
}
