//! Loss injection for deterministic testing of the reliability mechanisms.
//!
//! Real networks drop packets. To exercise retransmission without depending
//! on actual network conditions, every outbound data packet and every
//! outbound acknowledgement passes through a [`LossSimulator`] gate that
//! drops it with an independently configured probability:
//!
//! | Direction | Probability          | Applied by         |
//! |-----------|----------------------|--------------------|
//! | DATA      | `LossConfig::data_loss` | the sending peer   |
//! | ACK       | `LossConfig::ack_loss`  | the receiving peer |
//!
//! Each endpoint constructs its own simulator; with a `seed` the drop
//! sequence is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ConfigError;

/// Configuration for the fault-injection model.
///
/// Both probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossConfig {
    /// Probability that an outbound data packet is silently dropped.
    pub data_loss: f64,
    /// Probability that an outbound acknowledgement is silently dropped.
    pub ack_loss: f64,
    /// Fixed RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for LossConfig {
    fn default() -> Self {
        // No faults by default; the simulator is a transparent pass-through.
        Self {
            data_loss: 0.0,
            ack_loss: 0.0,
            seed: None,
        }
    }
}

impl LossConfig {
    pub fn new(data_loss: f64, ack_loss: f64) -> Self {
        Self {
            data_loss,
            ack_loss,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, p) in [("data_loss", self.data_loss), ("ack_loss", self.ack_loss)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Probability { name, value: p });
            }
        }
        Ok(())
    }
}

/// Bernoulli drop filter with its own random source.
#[derive(Debug)]
pub struct LossSimulator {
    config: LossConfig,
    rng: StdRng,
}

impl LossSimulator {
    pub fn new(config: LossConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    /// A simulator that never drops anything.
    pub fn lossless() -> Self {
        Self::new(LossConfig::default().with_seed(0))
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    /// Returns `true` with probability `probability`.
    ///
    /// Advances the random source; no other observable effect.
    pub fn should_drop(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng.random_bool(probability)
    }

    /// Draw against the configured data-packet loss probability.
    pub fn drop_data(&mut self) -> bool {
        self.should_drop(self.config.data_loss)
    }

    /// Draw against the configured acknowledgement loss probability.
    pub fn drop_ack(&mut self) -> bool {
        self.should_drop(self.config.ack_loss)
    }
}
