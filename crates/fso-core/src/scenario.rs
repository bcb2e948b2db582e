//! Scenario configuration and runner
//!
//! A [`ScenarioConfig`] describes a point-to-point downlink: one
//! transmitting PHY with a laser, one receiving PHY with a telescope and an
//! error model, joined by a channel carrying the full loss chain
//! (free-space → scintillation → mean irradiance). [`Scenario`] builds the
//! network from it, runs the packet schedule and reports per-stage link
//! budgets.

use crate::antenna::{LaserAntenna, OpticalRxAntenna};
use crate::channel::ChannelId;
use crate::error::{ensure_non_negative, ensure_positive, FsoError, FsoResult};
use crate::error_model::{ErrorModelConfig, RxOutcome};
use crate::mobility::ConstantPosition;
use crate::network::{DeliveryRecord, FsoNetwork};
use crate::packet::Packet;
use crate::phy::{FsoPhy, PhyId};
use crate::propagation::{
    ConstantSpeedPropagationDelay, DownlinkScintillationIndex, FreeSpaceLoss, Link, MeanIrradiance,
};
use crate::signal::SignalParameters;
use crate::types::{SimTime, Vector3, SPEED_OF_LIGHT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Hufnagel-Valley turbulence profile parameters
///
/// The default is the LEO downlink profile: v = 21 m/s with a strong
/// ground layer (A = 1.7e-13). [`TurbulenceConfig::hv57`] is the textbook
/// HV-5/7 profile (A = 1.7e-14).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurbulenceConfig {
    /// RMS high-altitude wind speed (m/s)
    pub rms_wind_speed: f64,
    /// Ground-level Cn², the A parameter (m^-2/3)
    pub ground_cn2: f64,
}

impl Default for TurbulenceConfig {
    fn default() -> Self {
        Self {
            rms_wind_speed: 21.0,
            ground_cn2: 1.7e-13,
        }
    }
}

impl TurbulenceConfig {
    /// Textbook HV-5/7 daytime profile, matching
    /// [`DownlinkScintillationIndex::hv57`]
    pub fn hv57() -> Self {
        let profile = DownlinkScintillationIndex::hv57();
        Self {
            rms_wind_speed: profile.rms_wind_speed(),
            ground_cn2: profile.ground_cn2(),
        }
    }
}

/// Downlink scenario configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Scenario name (for reports)
    pub name: String,
    /// Carrier wavelength (m)
    pub wavelength: f64,
    /// Bit rate (bit/s)
    pub bit_rate: f64,
    /// Packet size (bytes)
    pub packet_size: usize,
    /// Number of packets to send
    pub packet_count: usize,
    /// Spacing between packet sends (s)
    pub packet_interval: f64,
    /// Transmitter position (m)
    pub tx_position: Vector3,
    /// Receiver position (m)
    pub rx_position: Vector3,
    pub laser: LaserAntenna,
    pub receiver: OpticalRxAntenna,
    pub turbulence: TurbulenceConfig,
    /// Wave speed of the delay model (m/s)
    pub wave_speed: f64,
    pub error_model: ErrorModelConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::leo_downlink()
    }
}

impl ScenarioConfig {
    /// LEO satellite to ground station at 707 km zenith
    pub fn leo_downlink() -> Self {
        Self {
            name: "leo-downlink".to_string(),
            wavelength: 847e-9,
            bit_rate: 49.3724e6,
            packet_size: 1024,
            packet_count: 1,
            packet_interval: 1e-3,
            tx_position: Vector3::new(0.0, 0.0, 707_000.0),
            rx_position: Vector3::default(),
            laser: LaserAntenna {
                beamwidth: 0.120,
                phase_front_radius: 0.0,
                orientation: 0.0,
                tx_power: 0.1,
                gain_db: 116.0,
            },
            receiver: OpticalRxAntenna {
                aperture_diameter: 0.318,
                rx_gain_db: 121.4,
                orientation: 0.0,
            },
            turbulence: TurbulenceConfig::default(),
            wave_speed: SPEED_OF_LIGHT,
            error_model: ErrorModelConfig::default(),
        }
    }

    /// Builder: place the transmitter `distance` meters straight above the receiver
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.tx_position = self.rx_position + Vector3::new(0.0, 0.0, distance);
        self
    }

    pub fn with_packets(mut self, count: usize) -> Self {
        self.packet_count = count;
        self
    }

    pub fn with_packet_size(mut self, size: usize) -> Self {
        self.packet_size = size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.error_model.seed = seed;
        self
    }

    pub fn with_turbulence(mut self, rms_wind_speed: f64, ground_cn2: f64) -> Self {
        self.turbulence = TurbulenceConfig {
            rms_wind_speed,
            ground_cn2,
        };
        self
    }

    pub fn with_error_model(mut self, config: ErrorModelConfig) -> Self {
        self.error_model = config;
        self
    }

    /// Transmitter-receiver distance (m)
    pub fn distance(&self) -> f64 {
        self.tx_position.distance_to(&self.rx_position)
    }

    pub fn validate(&self) -> FsoResult<()> {
        ensure_positive("wavelength", self.wavelength)?;
        ensure_positive("bit_rate", self.bit_rate)?;
        ensure_positive("packet_size", self.packet_size as f64)?;
        ensure_non_negative("packet_interval", self.packet_interval)?;
        ensure_positive("wave_speed", self.wave_speed)?;
        ensure_non_negative("turbulence.rms_wind_speed", self.turbulence.rms_wind_speed)?;
        ensure_non_negative("turbulence.ground_cn2", self.turbulence.ground_cn2)?;
        self.laser.validate()?;
        self.receiver.validate()?;
        self.error_model.validate()?;
        Ok(())
    }

    pub fn from_json(json: &str) -> FsoResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> FsoResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json_pretty(&self) -> FsoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> FsoResult<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

/// Signal state after one loss stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStage {
    pub model: String,
    /// W before the mean-irradiance stage, W/m² from it on
    pub power: f64,
    pub path_loss_db: Option<f64>,
    pub rytov_variance: Option<f64>,
    pub scintillation_index: Option<f64>,
    pub rx_beam_radius: Option<f64>,
}

/// Stage-by-stage link budget of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkBudget {
    pub distance: f64,
    pub delay: SimTime,
    pub tx_power: f64,
    pub stages: Vec<BudgetStage>,
}

impl LinkBudget {
    /// Parameters after the whole chain
    pub fn last(&self) -> Option<&BudgetStage> {
        self.stages.last()
    }

    pub fn mean_irradiance(&self) -> Option<f64> {
        self.last().map(|s| s.power)
    }
}

/// Summary of a scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub packets_sent: usize,
    pub deliveries: Vec<DeliveryRecord>,
    pub corrupted: usize,
    pub bit_errors: u64,
}

impl ScenarioReport {
    /// Fraction of deliveries marked corrupted
    pub fn packet_error_rate(&self) -> f64 {
        if self.deliveries.is_empty() {
            0.0
        } else {
            self.corrupted as f64 / self.deliveries.len() as f64
        }
    }

    /// Mean of the sampled irradiance over all checked deliveries
    pub fn mean_sampled_irradiance(&self) -> Option<f64> {
        let samples: Vec<f64> = self
            .deliveries
            .iter()
            .filter_map(|d| d.outcome.irradiance())
            .collect();
        if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<f64>() / samples.len() as f64)
        }
    }
}

/// A built downlink network
#[derive(Debug)]
pub struct Scenario {
    config: ScenarioConfig,
    network: FsoNetwork,
    channel: ChannelId,
    tx: PhyId,
    rx: PhyId,
}

impl Scenario {
    pub fn build(config: ScenarioConfig) -> FsoResult<Self> {
        config.validate()?;
        let mut network = FsoNetwork::new();

        let channel = network.add_channel();
        {
            let ch = network.channel_mut(channel)?;
            ch.add_propagation_loss_model(Box::new(FreeSpaceLoss::new()));
            ch.add_propagation_loss_model(Box::new(DownlinkScintillationIndex::new(
                config.turbulence.rms_wind_speed,
                config.turbulence.ground_cn2,
            )?));
            ch.add_propagation_loss_model(Box::new(MeanIrradiance::new()));
            ch.set_propagation_delay_model(Box::new(ConstantSpeedPropagationDelay::new(config.wave_speed)?));
        }

        let tx = network.add_phy(
            FsoPhy::builder()
                .mobility(ConstantPosition::new(config.tx_position))
                .laser(config.laser.clone())
                .bit_rate(config.bit_rate),
        )?;
        let rx = network.add_phy(
            FsoPhy::builder()
                .mobility(ConstantPosition::new(config.rx_position))
                .receiver(config.receiver.clone())
                .error_model(config.error_model.clone())
                .bit_rate(config.bit_rate),
        )?;
        network.attach(channel, tx)?;
        network.attach(channel, rx)?;

        info!(
            target: "fso::network",
            scenario = %config.name,
            distance_m = config.distance(),
            "scenario built"
        );
        Ok(Self {
            config,
            network,
            channel,
            tx,
            rx,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn network(&self) -> &FsoNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut FsoNetwork {
        &mut self.network
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn tx(&self) -> PhyId {
        self.tx
    }

    pub fn rx(&self) -> PhyId {
        self.rx
    }

    /// Parameters the transmitter starts every packet with
    pub fn initial_params(&self) -> FsoResult<SignalParameters> {
        self.network.phy(self.tx)?.signal_parameters(self.config.wavelength)
    }

    /// Apply the channel's loss chain stage by stage, without scheduling
    pub fn link_budget(&self) -> FsoResult<LinkBudget> {
        let now = self.network.now();
        let tx = self.network.phy(self.tx)?;
        let rx = self.network.phy(self.rx)?;
        let channel = self.network.channel(self.channel)?;

        let tx_position = tx.position(now);
        let rx_position = rx.position(now);
        let mut link = Link::new(tx_position, rx_position);
        if let Some(antenna) = rx.receiver() {
            link = link.with_rx_antenna(antenna);
        }

        let mut params = self.initial_params()?;
        let tx_power = params.power;
        let mut stages = Vec::new();
        for model in channel.loss_models() {
            params = model.apply(params, &link)?;
            stages.push(BudgetStage {
                model: model.name().to_string(),
                power: params.power,
                path_loss_db: params.path_loss_db,
                rytov_variance: params.rytov_variance,
                scintillation_index: params.scintillation_index,
                rx_beam_radius: params.rx_beam_radius,
            });
        }

        Ok(LinkBudget {
            distance: link.distance(),
            delay: channel.delay_model().delay(&tx_position, &rx_position),
            tx_power,
            stages,
        })
    }

    /// Send `packet_count` packets spaced by `packet_interval` and drain the
    /// queue
    pub fn run(&mut self) -> FsoResult<ScenarioReport> {
        let params = self.initial_params()?;
        let start = self.network.now();
        let first = self.network.deliveries().len();

        for i in 0..self.config.packet_count {
            let at = start + SimTime::from_secs_f64(i as f64 * self.config.packet_interval);
            self.network.run_until(at)?;
            let scheduled = self
                .network
                .send_packet(self.tx, Packet::with_size(self.config.packet_size), params.clone())?;
            if scheduled == 0 {
                return Err(FsoError::Config(format!(
                    "channel {} has no receiver for PHY {}",
                    self.channel, self.tx
                )));
            }
        }
        self.network.run()?;

        let deliveries = self.network.deliveries()[first..].to_vec();
        let corrupted = deliveries.iter().filter(|d| d.outcome.is_corrupted()).count();
        let bit_errors = deliveries
            .iter()
            .map(|d| match d.outcome {
                RxOutcome::Corrupted {
                    bit_errors: Some(n), ..
                } => n,
                _ => 0,
            })
            .sum();

        info!(
            target: "fso::network",
            scenario = %self.config.name,
            packets = self.config.packet_count,
            deliveries = deliveries.len(),
            corrupted,
            "scenario finished"
        );
        Ok(ScenarioReport {
            name: self.config.name.clone(),
            packets_sent: self.config.packet_count,
            deliveries,
            corrupted,
            bit_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_leo_downlink() {
        let config = ScenarioConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.distance() - 707_000.0).abs() < 1e-9);
        assert_eq!(config.turbulence.ground_cn2, 1.7e-13);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = ScenarioConfig::default();
        config.wavelength = 0.0;
        assert!(matches!(
            config.validate(),
            Err(FsoError::InvalidParameter { name: "wavelength", .. })
        ));

        let config = ScenarioConfig::default().with_packet_size(0);
        assert!(config.validate().is_err());

        let config = ScenarioConfig::default().with_turbulence(21.0, -1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ScenarioConfig::from_json(r#"{ "packet_count": 5, "error_model": { "detection_threshold": 1e-9, "granularity": "per-symbol", "seed": 3 } }"#).unwrap();
        assert_eq!(config.packet_count, 5);
        assert_eq!(config.wavelength, 847e-9);
        assert_eq!(
            config.error_model.granularity,
            crate::error_model::SamplingGranularity::PerSymbol
        );

        assert!(matches!(
            ScenarioConfig::from_json(r#"{ "bit_rate": -1 }"#),
            Err(FsoError::InvalidParameter { name: "bit_rate", .. })
        ));
        assert!(matches!(ScenarioConfig::from_json("{ nope"), Err(FsoError::Json(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ScenarioConfig::default().with_packets(3).with_seed(9);
        let json = config.to_json_pretty().unwrap();
        assert_eq!(ScenarioConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_link_budget_stages() {
        let scenario = Scenario::build(ScenarioConfig::default()).unwrap();
        let budget = scenario.link_budget().unwrap();

        let names: Vec<&str> = budget.stages.iter().map(|s| s.model.as_str()).collect();
        assert_eq!(names, ["free-space-loss", "scintillation-index", "mean-irradiance"]);

        let fsl = &budget.stages[0];
        assert!((fsl.path_loss_db.unwrap() - 260.42).abs() < 0.01);
        // scintillation does not touch power
        assert_eq!(budget.stages[1].power, fsl.power);
        assert!(budget.stages[1].scintillation_index.unwrap() > 0.0);

        let irradiance = budget.mean_irradiance().unwrap();
        assert!(irradiance > 0.0 && irradiance.is_finite());
        assert!((budget.delay.as_secs_f64() - 707_000.0 / SPEED_OF_LIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_run_sends_every_packet() {
        let config = ScenarioConfig::default().with_packets(4).with_packet_size(32);
        let mut scenario = Scenario::build(config).unwrap();
        let report = scenario.run().unwrap();

        assert_eq!(report.packets_sent, 4);
        assert_eq!(report.deliveries.len(), 4);
        let times: Vec<SimTime> = report.deliveries.iter().map(|d| d.time).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert!(report.deliveries.iter().all(|d| d.rx == scenario.rx()));
    }

    #[test]
    fn test_turbulence_presets() {
        let leo = TurbulenceConfig::default();
        let hv57 = TurbulenceConfig::hv57();
        assert_eq!(leo.rms_wind_speed, hv57.rms_wind_speed);
        assert_eq!(leo.ground_cn2, 1.7e-13);
        assert_eq!(hv57.ground_cn2, 1.7e-14);
        assert_eq!(ScenarioConfig::leo_downlink().turbulence, leo);
    }

    #[test]
    fn test_identical_runs_identical_reports() {
        let config = ScenarioConfig::default().with_packets(3).with_seed(11);
        let run = || Scenario::build(config.clone()).unwrap().run().unwrap();
        let first = run();
        assert_eq!(first, run());
        let uids: Vec<u64> = first.deliveries.iter().map(|d| d.packet_uid).collect();
        assert_eq!(uids, vec![1, 2, 3]);
    }
}
