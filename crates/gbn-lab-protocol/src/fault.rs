//! Fault injection applied by every channel before a frame goes out.
//!
//! Each outbound frame gets independent Bernoulli trials: first a drop
//! (probability depends on the frame kind), then, for surviving DATA frames,
//! a single-bit payload corruption. Scripted one-shot faults are checked
//! before the random trials so tests can force exact outcomes.

use gbn_lab_abstract::{ArqEvent, FaultConfig, Frame, FrameKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// What the channel should do with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultOutcome {
    /// Deliver unchanged.
    Clean(Frame),
    /// Deliver a copy with payload bit `bit` flipped.
    Corrupted { frame: Frame, bit: usize },
    /// Never deliver.
    Dropped(Frame),
}

impl FaultOutcome {
    /// Frame to put on the wire, if any.
    pub fn into_delivered(self) -> Option<Frame> {
        match self {
            FaultOutcome::Clean(frame) | FaultOutcome::Corrupted { frame, .. } => Some(frame),
            FaultOutcome::Dropped(_) => None,
        }
    }

    /// Event describing the injected fault. Clean frames produce none.
    pub fn event(&self) -> Option<ArqEvent> {
        match self {
            FaultOutcome::Clean(_) => None,
            FaultOutcome::Corrupted { frame, bit } => Some(ArqEvent::FrameCorrupted {
                seq: frame.seq(),
                bit: *bit,
            }),
            FaultOutcome::Dropped(frame) => Some(match frame.kind() {
                FrameKind::Data => ArqEvent::FrameDropped { seq: frame.seq() },
                FrameKind::Ack => ArqEvent::AckDropped { ack: frame.seq() },
            }),
        }
    }
}

#[derive(Debug)]
pub struct FaultInjector<R = StdRng> {
    config: FaultConfig,
    rng: R,
    drop_data_once: Vec<u32>,
    drop_ack_once: Vec<u32>,
    corrupt_data_once: Vec<u32>,
}

impl FaultInjector<StdRng> {
    /// Injector driven by a `StdRng` seeded from `config.seed`.
    pub fn new(config: FaultConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> FaultInjector<R> {
    pub fn with_rng(config: FaultConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            drop_data_once: Vec::new(),
            drop_ack_once: Vec::new(),
            corrupt_data_once: Vec::new(),
        }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Drop the first DATA frame carrying `seq`.
    pub fn script_drop_data(&mut self, seq: u32) {
        self.drop_data_once.push(seq);
    }

    /// Drop the first ACK carrying `ack`.
    pub fn script_drop_ack(&mut self, ack: u32) {
        self.drop_ack_once.push(ack);
    }

    /// Flip one payload bit of the first DATA frame carrying `seq`.
    pub fn script_corrupt_data(&mut self, seq: u32) {
        self.corrupt_data_once.push(seq);
    }

    /// Run the full drop-then-corrupt pipeline on one outbound frame.
    pub fn apply(&mut self, frame: Frame) -> FaultOutcome {
        if self.maybe_drop(&frame) {
            return FaultOutcome::Dropped(frame);
        }
        match self.maybe_corrupt(&frame) {
            Some((damaged, bit)) => FaultOutcome::Corrupted {
                frame: damaged,
                bit,
            },
            None => FaultOutcome::Clean(frame),
        }
    }

    /// Decide whether `frame` is lost.
    pub fn maybe_drop(&mut self, frame: &Frame) -> bool {
        let (scripted, probability) = match frame.kind() {
            FrameKind::Data => (&mut self.drop_data_once, self.config.loss_probability),
            FrameKind::Ack => (&mut self.drop_ack_once, self.config.ack_loss_probability),
        };
        if take_scripted(scripted, frame.seq()) {
            return true;
        }
        self.rng.random::<f64>() < probability
    }

    /// Decide whether `frame` is damaged, returning the damaged copy and the
    /// flipped bit. ACK frames and empty payloads are never touched.
    pub fn maybe_corrupt(&mut self, frame: &Frame) -> Option<(Frame, usize)> {
        if frame.kind() != FrameKind::Data || frame.is_empty() {
            return None;
        }
        let scripted = take_scripted(&mut self.corrupt_data_once, frame.seq());
        if !scripted && self.rng.random::<f64>() >= self.config.corruption_probability {
            return None;
        }
        let bit = self.rng.random_range(0..frame.len() * 8);
        frame.with_flipped_bit(bit).map(|damaged| (damaged, bit))
    }
}

fn take_scripted(scripted: &mut Vec<u32>, seq: u32) -> bool {
    match scripted.iter().position(|s| *s == seq) {
        Some(pos) => {
            scripted.remove(pos);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certain(loss: f64, ack_loss: f64, corruption: f64) -> FaultInjector {
        FaultInjector::new(FaultConfig {
            loss_probability: loss,
            ack_loss_probability: ack_loss,
            corruption_probability: corruption,
            seed: 1,
        })
    }

    #[test]
    fn lossless_channel_passes_everything() {
        let mut injector = FaultInjector::new(FaultConfig::lossless());
        for seq in 0..100 {
            let frame = Frame::data(seq % 8, vec![seq as u8; 4]);
            assert_eq!(injector.apply(frame.clone()), FaultOutcome::Clean(frame));
            let ack = Frame::ack(seq % 8);
            assert_eq!(injector.apply(ack.clone()), FaultOutcome::Clean(ack));
        }
    }

    #[test]
    fn loss_probability_applies_to_data_only() {
        let mut injector = certain(1.0, 0.0, 0.0);
        let outcome = injector.apply(Frame::data(2, vec![1]));
        assert_eq!(outcome.event(), Some(ArqEvent::FrameDropped { seq: 2 }));
        assert!(outcome.into_delivered().is_none());
        assert!(matches!(injector.apply(Frame::ack(2)), FaultOutcome::Clean(_)));
    }

    #[test]
    fn ack_loss_probability_applies_to_acks_only() {
        let mut injector = certain(0.0, 1.0, 0.0);
        let outcome = injector.apply(Frame::ack(5));
        assert_eq!(outcome.event(), Some(ArqEvent::AckDropped { ack: 5 }));
        assert!(matches!(
            injector.apply(Frame::data(5, vec![1])),
            FaultOutcome::Clean(_)
        ));
    }

    #[test]
    fn corruption_flips_exactly_one_bit_and_keeps_checksum() {
        let mut injector = certain(0.0, 0.0, 1.0);
        let frame = Frame::data(1, b"abcdef".to_vec());
        match injector.apply(frame.clone()) {
            FaultOutcome::Corrupted { frame: damaged, bit } => {
                assert!(bit < 48);
                assert_eq!(damaged.checksum(), frame.checksum());
                let differing_bits: u32 = frame
                    .payload()
                    .iter()
                    .zip(damaged.payload())
                    .map(|(a, b)| (a ^ b).count_ones())
                    .sum();
                assert_eq!(differing_bits, 1);
                assert!(!damaged.verify());
            }
            other => panic!("expected corruption, got {other:?}"),
        }
    }

    #[test]
    fn acks_and_empty_payloads_are_never_corrupted() {
        let mut injector = certain(0.0, 0.0, 1.0);
        assert!(matches!(injector.apply(Frame::ack(0)), FaultOutcome::Clean(_)));
        assert!(matches!(
            injector.apply(Frame::data(0, Vec::new())),
            FaultOutcome::Clean(_)
        ));
    }

    #[test]
    fn drop_wins_over_corruption() {
        let mut injector = certain(1.0, 0.0, 1.0);
        assert!(matches!(
            injector.apply(Frame::data(0, vec![1, 2, 3])),
            FaultOutcome::Dropped(_)
        ));
    }

    #[test]
    fn scripted_faults_fire_once() {
        let mut injector = FaultInjector::new(FaultConfig::lossless());
        injector.script_drop_data(1);
        injector.script_drop_ack(0);
        injector.script_corrupt_data(2);

        assert!(matches!(injector.apply(Frame::data(0, vec![0])), FaultOutcome::Clean(_)));
        assert!(matches!(injector.apply(Frame::data(1, vec![1])), FaultOutcome::Dropped(_)));
        assert!(matches!(injector.apply(Frame::data(1, vec![1])), FaultOutcome::Clean(_)));
        assert!(matches!(injector.apply(Frame::ack(0)), FaultOutcome::Dropped(_)));
        assert!(matches!(injector.apply(Frame::ack(0)), FaultOutcome::Clean(_)));
        assert!(matches!(
            injector.apply(Frame::data(2, vec![2])),
            FaultOutcome::Corrupted { .. }
        ));
        assert!(matches!(injector.apply(Frame::data(2, vec![2])), FaultOutcome::Clean(_)));
    }

    #[test]
    fn same_seed_same_decisions() {
        let config = FaultConfig {
            loss_probability: 0.5,
            ack_loss_probability: 0.5,
            corruption_probability: 0.5,
            seed: 42,
        };
        let mut a = FaultInjector::new(config.clone());
        let mut b = FaultInjector::new(config);
        for seq in 0..64u32 {
            let frame = Frame::data(seq % 8, vec![seq as u8; 3]);
            assert_eq!(a.apply(frame.clone()), b.apply(frame));
        }
    }

    #[test]
    fn loss_rate_roughly_matches_probability() {
        let mut injector = certain(0.25, 0.0, 0.0);
        let dropped = (0..4000)
            .filter(|i| injector.maybe_drop(&Frame::data(i % 8, vec![0])))
            .count();
        assert!((800..1200).contains(&dropped), "dropped {dropped} of 4000");
    }
}
