use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Protocol parameters shared by sender and receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArqConfig {
    pub window_size: u32,
    pub sequence_space: u32,
    pub timeout_ms: u64,
    pub payload_size: usize,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: 4,
            sequence_space: 8,
            timeout_ms: 2000,
            payload_size: 512,
        }
    }
}

impl ArqConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.sequence_space <= self.window_size {
            return Err(ConfigError::SequenceSpaceTooSmall {
                space: self.sequence_space,
                window: self.window_size,
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.payload_size == 0 || self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::PayloadSize {
                size: self.payload_size,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }
}

/// Per-event fault probabilities and the seed of the random source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    pub loss_probability: f64,
    pub ack_loss_probability: f64,
    pub corruption_probability: f64,
    pub seed: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            loss_probability: 0.2,
            ack_loss_probability: 0.3,
            corruption_probability: 0.2,
            seed: 0,
        }
    }
}

impl FaultConfig {
    /// A perfect channel.
    pub fn lossless() -> Self {
        Self {
            loss_probability: 0.0,
            ack_loss_probability: 0.0,
            corruption_probability: 0.0,
            seed: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("loss_probability", self.loss_probability)?;
        check_probability("ack_loss_probability", self.ack_loss_probability)?;
        check_probability("corruption_probability", self.corruption_probability)
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

/// Everything a simulation run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub arq: ArqConfig,
    pub faults: FaultConfig,
    pub min_latency: u64,
    pub max_latency: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arq: ArqConfig::default(),
            faults: FaultConfig::default(),
            min_latency: 10,
            max_latency: 100,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arq.validate()?;
        self.faults.validate()?;
        if self.min_latency > self.max_latency {
            return Err(ConfigError::Latency {
                min: self.min_latency,
                max: self.max_latency,
            });
        }
        Ok(())
    }
}
