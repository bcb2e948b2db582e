//! Turbulence-driven packet corruption
//!
//! The received irradiance is modelled as log-normal around the mean
//! irradiance produced by the loss chain:
//!
//! ```text
//! ln(I) ~ Normal(ln(<I>) − σ²/2, σ²)        σ² = scintillation index
//! ```
//!
//! The −σ²/2 term keeps E[I] = <I> for any turbulence strength. A sample
//! below the detection threshold is a bit error. With
//! [`SamplingGranularity::PerPacket`] one draw decides the whole packet;
//! with [`SamplingGranularity::PerSymbol`] every bit (one OOK symbol) gets
//! its own draw and failing bits are flipped in the payload.
//!
//! Every decision is a function of the signal parameters and the model's
//! seeded RNG, so a fixed seed reproduces the same outcomes.

use crate::error::{ensure_positive, FsoError, FsoResult};
use crate::packet::Packet;
use crate::phy::PhyId;
use crate::signal::SignalParameters;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, LogNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How many irradiance draws a packet gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingGranularity {
    /// One draw marks the whole packet
    #[default]
    PerPacket,
    /// One draw per bit; failing bits are flipped
    PerSymbol,
}

/// Error model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorModelConfig {
    /// Receiver detection threshold, same units as the mean irradiance (W/m²)
    pub detection_threshold: f64,
    /// Draws per packet
    pub granularity: SamplingGranularity,
    /// RNG seed
    pub seed: u64,
}

impl Default for ErrorModelConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 1.0e-8,
            granularity: SamplingGranularity::PerPacket,
            seed: 1,
        }
    }
}

impl ErrorModelConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.detection_threshold = threshold;
        self
    }

    pub fn with_granularity(mut self, granularity: SamplingGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> FsoResult<()> {
        ensure_positive("error_model.detection_threshold", self.detection_threshold)?;
        Ok(())
    }
}

/// Result of one reception
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RxOutcome {
    /// Sampled irradiance cleared the threshold
    Delivered {
        /// Sampled irradiance (minimum over symbols for per-symbol sampling)
        irradiance: f64,
        /// Sampled irradiance over the detection threshold
        snr: f64,
    },
    /// At least one bit error; the packet is still delivered
    Corrupted {
        /// Sampled irradiance (minimum over symbols for per-symbol sampling)
        irradiance: f64,
        /// Sampled irradiance over the detection threshold
        snr: f64,
        /// Flipped bits, known only for per-symbol sampling
        bit_errors: Option<u64>,
    },
    /// No error model bound to the receiver
    Unchecked,
}

impl RxOutcome {
    fn sampled(irradiance: f64, threshold: f64, bit_errors: Option<u64>, corrupted: bool) -> Self {
        let snr = irradiance / threshold;
        if corrupted {
            RxOutcome::Corrupted {
                irradiance,
                snr,
                bit_errors,
            }
        } else {
            RxOutcome::Delivered { irradiance, snr }
        }
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, RxOutcome::Corrupted { .. })
    }

    /// Sampled irradiance, if an error model ran
    pub fn irradiance(&self) -> Option<f64> {
        match self {
            RxOutcome::Delivered { irradiance, .. } | RxOutcome::Corrupted { irradiance, .. } => Some(*irradiance),
            RxOutcome::Unchecked => None,
        }
    }

    /// Received SNR as sampled irradiance over the detection threshold;
    /// below 1 means a detection failure
    pub fn snr(&self) -> Option<f64> {
        match self {
            RxOutcome::Delivered { snr, .. } | RxOutcome::Corrupted { snr, .. } => Some(*snr),
            RxOutcome::Unchecked => None,
        }
    }
}

/// Log-normal irradiance statistics of one reception
#[derive(Debug, Clone, Copy)]
pub struct IrradianceDistribution {
    mean: f64,
    variance: f64,
    dist: LogNormal<f64>,
}

impl IrradianceDistribution {
    /// Statistics for mean irradiance `mean` and log-variance `variance`
    ///
    /// Fails on a non-positive mean or a negative variance.
    pub fn new(mean: f64, variance: f64) -> FsoResult<Self> {
        ensure_positive("mean_irradiance", mean)?;
        if !variance.is_finite() || variance < 0.0 {
            return Err(FsoError::InvalidParameter {
                name: "scintillation_index",
                value: variance,
                reason: "scintillation variance must be non-negative",
            });
        }
        let mu = mean.ln() - variance / 2.0;
        let dist = LogNormal::new(mu, variance.sqrt()).map_err(|e| FsoError::Config(e.to_string()))?;
        Ok(Self { mean, variance, dist })
    }

    /// Read the statistics off the final signal parameters
    ///
    /// A chain without a turbulence stage yields σ² = 0: the sample always
    /// equals the mean.
    pub fn from_params(params: &SignalParameters) -> FsoResult<Self> {
        Self::new(params.power, params.scintillation_index.unwrap_or(0.0))
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Draw one irradiance sample
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.dist.sample(rng)
    }
}

/// Stochastic corruption decision bound to one receiving PHY
#[derive(Debug, Clone)]
pub struct FsoErrorModel {
    config: ErrorModelConfig,
    phy: Option<PhyId>,
    rng: StdRng,
}

impl FsoErrorModel {
    pub fn new(config: ErrorModelConfig) -> FsoResult<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self { config, phy: None, rng })
    }

    pub fn config(&self) -> &ErrorModelConfig {
        &self.config
    }

    /// Receiving PHY this model is bound to
    pub fn phy(&self) -> Option<PhyId> {
        self.phy
    }

    pub(crate) fn bind(&mut self, phy: PhyId) {
        self.phy = Some(phy);
    }

    /// Check that `params` can be sampled, without drawing
    pub fn check(&self, params: &SignalParameters) -> FsoResult<()> {
        IrradianceDistribution::from_params(params).map(|_| ())
    }

    /// Decide whether `packet` arrives corrupted, flipping bits for
    /// per-symbol sampling
    pub fn corrupt(&mut self, packet: &mut Packet, params: &SignalParameters) -> FsoResult<RxOutcome> {
        let dist = IrradianceDistribution::from_params(params)?;
        let threshold = self.config.detection_threshold;

        let outcome = match self.config.granularity {
            SamplingGranularity::PerPacket => {
                let irradiance = dist.sample(&mut self.rng);
                RxOutcome::sampled(irradiance, threshold, None, irradiance < threshold)
            }
            SamplingGranularity::PerSymbol => {
                let mut min_irradiance = f64::INFINITY;
                let mut bit_errors = 0u64;
                for byte in packet.payload_mut().iter_mut() {
                    for bit in 0..8 {
                        let irradiance = dist.sample(&mut self.rng);
                        min_irradiance = min_irradiance.min(irradiance);
                        if irradiance < threshold {
                            *byte ^= 0x80 >> bit;
                            bit_errors += 1;
                        }
                    }
                }
                // Empty payload: nothing to sample
                let irradiance = if min_irradiance.is_finite() {
                    min_irradiance
                } else {
                    dist.mean()
                };
                RxOutcome::sampled(irradiance, threshold, Some(bit_errors), bit_errors > 0)
            }
        };

        debug!(
            target: "fso::error_model",
            mean_irradiance = dist.mean(),
            scintillation_index = dist.variance(),
            threshold,
            "irradiance sampled"
        );
        info!(
            target: "fso::error_model",
            phy = ?self.phy,
            packet = packet.uid(),
            corrupted = outcome.is_corrupted(),
            irradiance = ?outcome.irradiance(),
            snr = ?outcome.snr(),
            "corruption decision"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mean: f64, sigma2: f64) -> SignalParameters {
        let mut p = SignalParameters::new(847e-9, 49.3724e6, mean, 0.06).unwrap();
        p.scintillation_index = Some(sigma2);
        p
    }

    #[test]
    fn test_reproducible_with_seed() {
        let config = ErrorModelConfig::default().with_threshold(0.8).with_seed(42);
        let p = params(1.0, 0.3);

        let run = |config: &ErrorModelConfig| {
            let mut model = FsoErrorModel::new(config.clone()).unwrap();
            (0..100)
                .map(|_| model.corrupt(&mut Packet::with_size(16), &p).unwrap())
                .collect::<Vec<_>>()
        };

        let first = run(&config);
        let second = run(&config);
        assert_eq!(first, second);
        assert!(first.iter().any(|o| o.is_corrupted()));
        assert!(first.iter().any(|o| !o.is_corrupted()));
    }

    #[test]
    fn test_bias_correction_preserves_mean() {
        let dist = IrradianceDistribution::new(2.5e-7, 0.3).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 200_000;
        let mean = (0..n).map(|_| dist.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 2.5e-7).abs() / 2.5e-7 < 0.01, "empirical mean {mean}");
    }

    #[test]
    fn test_no_turbulence_is_deterministic() {
        let mut model = FsoErrorModel::new(ErrorModelConfig::default().with_threshold(1.0)).unwrap();
        let mut p = params(2.0, 0.0);
        p.scintillation_index = None;
        for _ in 0..10 {
            let outcome = model.corrupt(&mut Packet::with_size(4), &p).unwrap();
            assert!(!outcome.is_corrupted());
            assert!((outcome.irradiance().unwrap() - 2.0).abs() < 1e-12);
        }

        let p = params(0.5, 0.0);
        let outcome = model.corrupt(&mut Packet::with_size(4), &p).unwrap();
        assert!(outcome.is_corrupted());
    }

    #[test]
    fn test_invalid_inputs_fail_fast() {
        let mut model = FsoErrorModel::new(ErrorModelConfig::default()).unwrap();
        let mut packet = Packet::with_size(4);

        let err = model.corrupt(&mut packet, &params(1.0, -0.1)).unwrap_err();
        assert!(err.is_configuration());
        let err = model.corrupt(&mut packet, &params(0.0, 0.1)).unwrap_err();
        assert!(err.is_configuration());
        let mut negative = params(1.0, 0.1);
        negative.power = -1.0;
        assert!(model.check(&negative).is_err());

        assert!(FsoErrorModel::new(ErrorModelConfig::default().with_threshold(0.0)).is_err());
    }

    #[test]
    fn test_per_symbol_flips_bits() {
        let config = ErrorModelConfig::default()
            .with_threshold(1.0)
            .with_granularity(SamplingGranularity::PerSymbol)
            .with_seed(3);
        let mut model = FsoErrorModel::new(config).unwrap();

        // Mean at the threshold with strong fading: roughly half the bits fail
        let mut packet = Packet::with_size(64);
        let outcome = model.corrupt(&mut packet, &params(1.0, 0.5)).unwrap();

        let flipped: u64 = packet.payload().iter().map(|b| b.count_ones() as u64).sum();
        match outcome {
            RxOutcome::Corrupted { bit_errors, .. } => assert_eq!(bit_errors, Some(flipped)),
            other => panic!("expected corruption, got {other:?}"),
        }
        assert!(flipped > 64 && flipped < 448);
    }

    #[test]
    fn test_snr_relative_to_threshold() {
        let mut model = FsoErrorModel::new(ErrorModelConfig::default().with_threshold(0.5)).unwrap();
        let mut p = params(2.0, 0.0);
        p.scintillation_index = None;
        let outcome = model.corrupt(&mut Packet::with_size(4), &p).unwrap();
        assert!(matches!(outcome, RxOutcome::Delivered { .. }));
        assert!((outcome.snr().unwrap() - 4.0).abs() < 1e-12);

        let outcome = model.corrupt(&mut Packet::with_size(4), &params(0.25, 0.0)).unwrap();
        assert!(outcome.is_corrupted());
        assert!((outcome.snr().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(RxOutcome::Unchecked.snr(), None);
    }

    #[test]
    fn test_per_symbol_clean_link() {
        let config = ErrorModelConfig::default()
            .with_threshold(1e-6)
            .with_granularity(SamplingGranularity::PerSymbol);
        let mut model = FsoErrorModel::new(config).unwrap();
        let mut packet = Packet::new(vec![0xA5; 32]);
        let outcome = model.corrupt(&mut packet, &params(1.0, 0.01)).unwrap();

        assert!(!outcome.is_corrupted());
        assert!(packet.payload().iter().all(|&b| b == 0xA5));
    }
}
