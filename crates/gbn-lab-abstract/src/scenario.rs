use crate::config::SimConfig;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: ConfigOverride,
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ConfigOverride {
    pub window_size: Option<u32>,
    pub sequence_space: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub payload_size: Option<usize>,
    pub loss_probability: Option<f64>,
    pub ack_loss_probability: Option<f64>,
    pub corruption_probability: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl ConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.window_size {
            config.arq.window_size = v;
        }
        if let Some(v) = self.sequence_space {
            config.arq.sequence_space = v;
        }
        if let Some(v) = self.timeout_ms {
            config.arq.timeout_ms = v;
        }
        if let Some(v) = self.payload_size {
            config.arq.payload_size = v;
        }
        if let Some(v) = self.loss_probability {
            config.faults.loss_probability = v;
        }
        if let Some(v) = self.ack_loss_probability {
            config.faults.ack_loss_probability = v;
        }
        if let Some(v) = self.corruption_probability {
            config.faults.corruption_probability = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.faults.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application hands data to the sender at a specific time
    AppSend { time: u64, data: String },
    /// Application closes its stream; the sender may finish once everything is acknowledged
    AppClose { time: u64 },
    /// Deterministically drop the first DATA frame with the given seq number
    DropNextDataSeq { seq: u32 },
    /// Deterministically drop the first ACK with the given ack number
    DropNextAck { ack: u32 },
    /// Deterministically corrupt one payload bit of the first DATA frame with the given seq number
    CorruptNextDataSeq { seq: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// The bytes delivered to the receiving application, concatenated, equal `data`
    DataDelivered { data: String },
    /// Total DATA frames handed to the channel by the sender (including retransmissions)
    SenderFrameCount { min: u32, max: Option<u32> },
    /// Number of retransmitted DATA frames
    Retransmissions { min: u32, max: Option<u32> },
    /// Sender reached its terminal state
    SenderDone,
    /// Simulation finishes within time
    MaxDuration { ms: u64 },
}
