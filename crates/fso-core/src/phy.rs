//! Free-space optical PHY
//!
//! A PHY binds a position provider, its optical antennas, an optional error
//! model, and (once attached) a channel. The channel is referenced by id
//! only; the [`FsoNetwork`](crate::network::FsoNetwork) owns both sides.
//!
//! ```text
//!  send_packet ─► Channel::send ─► (delay) ─► receive ─► error model ─► rx callback
//! ```

use crate::antenna::{LaserAntenna, OpticalRxAntenna};
use crate::channel::ChannelId;
use crate::error::{ensure_positive, FsoError, FsoResult};
use crate::error_model::{ErrorModelConfig, FsoErrorModel, RxOutcome};
use crate::mobility::MobilityModel;
use crate::packet::Packet;
use crate::signal::SignalParameters;
use crate::types::{SimTime, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// PHY identifier, an index into the network's PHY table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhyId(pub usize);

impl fmt::Display for PhyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PHY operating state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhyState {
    #[default]
    Idle,
    /// Handing a packet to the channel
    Tx,
    /// Running the error model on an arrival
    Rx,
}

/// Per-PHY packet counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhyStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_corrupted: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A packet handed to the upper layer, corrupted or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedPacket {
    pub packet: Packet,
    pub params: SignalParameters,
    pub outcome: RxOutcome,
}

impl ReceivedPacket {
    pub fn is_corrupted(&self) -> bool {
        self.outcome.is_corrupted()
    }
}

/// Upper-layer receive hook
pub type RxCallback = Box<dyn FnMut(PhyId, &ReceivedPacket)>;

/// Builder for [`FsoPhy`]; the network assigns the id when it is added
pub struct FsoPhyBuilder {
    mobility: Option<Box<dyn MobilityModel>>,
    laser: Option<LaserAntenna>,
    receiver: Option<OpticalRxAntenna>,
    error_model: Option<ErrorModelConfig>,
    bit_rate: f64,
    rx_callback: Option<RxCallback>,
}

impl Default for FsoPhyBuilder {
    fn default() -> Self {
        Self {
            mobility: None,
            laser: None,
            receiver: None,
            error_model: None,
            bit_rate: 1.0e9,
            rx_callback: None,
        }
    }
}

impl FsoPhyBuilder {
    pub fn mobility(mut self, mobility: impl MobilityModel + 'static) -> Self {
        self.mobility = Some(Box::new(mobility));
        self
    }

    pub fn laser(mut self, laser: LaserAntenna) -> Self {
        self.laser = Some(laser);
        self
    }

    pub fn receiver(mut self, receiver: OpticalRxAntenna) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Bind an error model; only receive-capable PHYs need one
    pub fn error_model(mut self, config: ErrorModelConfig) -> Self {
        self.error_model = Some(config);
        self
    }

    /// Bit rate in bit/s
    pub fn bit_rate(mut self, bit_rate: f64) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    pub fn on_receive(mut self, callback: impl FnMut(PhyId, &ReceivedPacket) + 'static) -> Self {
        self.rx_callback = Some(Box::new(callback));
        self
    }

    pub(crate) fn build(self, id: PhyId) -> FsoResult<FsoPhy> {
        ensure_positive("bit_rate", self.bit_rate)?;
        let mobility = self
            .mobility
            .ok_or_else(|| FsoError::Config(format!("PHY {id} has no mobility model")))?;
        if let Some(laser) = &self.laser {
            laser.validate()?;
        }
        if let Some(receiver) = &self.receiver {
            receiver.validate()?;
        }
        let error_model = match self.error_model {
            Some(config) => {
                let mut model = FsoErrorModel::new(config)?;
                model.bind(id);
                Some(model)
            }
            None => None,
        };

        Ok(FsoPhy {
            id,
            mobility,
            laser: self.laser,
            receiver: self.receiver,
            channel: None,
            error_model,
            bit_rate: self.bit_rate,
            state: PhyState::Idle,
            stats: PhyStats::default(),
            rx_callback: self.rx_callback,
        })
    }
}

/// Optical transceiver
pub struct FsoPhy {
    id: PhyId,
    mobility: Box<dyn MobilityModel>,
    laser: Option<LaserAntenna>,
    receiver: Option<OpticalRxAntenna>,
    channel: Option<ChannelId>,
    error_model: Option<FsoErrorModel>,
    bit_rate: f64,
    state: PhyState,
    stats: PhyStats,
    rx_callback: Option<RxCallback>,
}

impl fmt::Debug for FsoPhy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsoPhy")
            .field("id", &self.id)
            .field("mobility", &self.mobility)
            .field("laser", &self.laser)
            .field("receiver", &self.receiver)
            .field("channel", &self.channel)
            .field("error_model", &self.error_model)
            .field("bit_rate", &self.bit_rate)
            .field("state", &self.state)
            .finish()
    }
}

impl FsoPhy {
    pub fn builder() -> FsoPhyBuilder {
        FsoPhyBuilder::default()
    }

    pub fn id(&self) -> PhyId {
        self.id
    }

    pub fn position(&self, now: SimTime) -> Vector3 {
        self.mobility.position(now)
    }

    pub fn laser(&self) -> Option<&LaserAntenna> {
        self.laser.as_ref()
    }

    pub fn receiver(&self) -> Option<&OpticalRxAntenna> {
        self.receiver.as_ref()
    }

    pub fn set_antennas(&mut self, laser: Option<LaserAntenna>, receiver: Option<OpticalRxAntenna>) -> FsoResult<()> {
        if let Some(l) = &laser {
            l.validate()?;
        }
        if let Some(r) = &receiver {
            r.validate()?;
        }
        self.laser = laser;
        self.receiver = receiver;
        Ok(())
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub(crate) fn set_channel(&mut self, channel: Option<ChannelId>) {
        self.channel = channel;
    }

    pub fn error_model(&self) -> Option<&FsoErrorModel> {
        self.error_model.as_ref()
    }

    /// Bind a new error model to this PHY, replacing any previous one
    pub fn set_error_model(&mut self, config: ErrorModelConfig) -> FsoResult<()> {
        let mut model = FsoErrorModel::new(config)?;
        model.bind(self.id);
        self.error_model = Some(model);
        Ok(())
    }

    pub fn bit_rate(&self) -> f64 {
        self.bit_rate
    }

    pub fn set_bit_rate(&mut self, bit_rate: f64) -> FsoResult<()> {
        self.bit_rate = ensure_positive("bit_rate", bit_rate)?;
        Ok(())
    }

    pub fn state(&self) -> PhyState {
        self.state
    }

    pub fn stats(&self) -> &PhyStats {
        &self.stats
    }

    pub fn set_receive_callback(&mut self, callback: impl FnMut(PhyId, &ReceivedPacket) + 'static) {
        self.rx_callback = Some(Box::new(callback));
    }

    /// Time on air: packet bits × symbol period
    pub fn calculate_tx_duration(size_bits: u64, params: &SignalParameters) -> SimTime {
        SimTime::from_secs_f64(size_bits as f64 * params.symbol_period)
    }

    /// Initial signal parameters for a transmission from this PHY's laser
    pub fn signal_parameters(&self, wavelength: f64) -> FsoResult<SignalParameters> {
        let laser = self.laser.as_ref().ok_or(FsoError::MissingAntenna {
            phy: self.id,
            kind: "laser",
        })?;
        Ok(SignalParameters::from_laser(laser, wavelength, self.bit_rate)?.with_tx_phy(self.id))
    }

    /// Validate and stamp `params` for transmission; returns the channel to
    /// forward to
    pub(crate) fn begin_send(&mut self, packet: &Packet, params: &mut SignalParameters) -> FsoResult<ChannelId> {
        let channel = self.channel.ok_or(FsoError::NotAttached(self.id))?;
        params.validate()?;
        params.tx_phy = Some(self.id);
        if params.tx_antenna.is_none() {
            params.tx_antenna = self.laser.clone();
        }

        self.state = PhyState::Tx;
        debug!(
            target: "fso::phy",
            phy = %self.id,
            packet = packet.uid(),
            bytes = packet.len(),
            tx_duration = %Self::calculate_tx_duration(packet.size_bits(), params),
            "sending packet"
        );
        Ok(channel)
    }

    /// Return to idle; only a transmission the channel accepted counts
    /// towards the send statistics
    pub(crate) fn end_send(&mut self, packet: &Packet, sent: bool) {
        self.state = PhyState::Idle;
        if sent {
            self.stats.packets_sent += 1;
            self.stats.bytes_sent += packet.len() as u64;
        }
    }

    /// Check that an arrival with `params` could be processed, so errors
    /// surface at the send call rather than at delivery time
    pub(crate) fn check_receivable(&self, params: &SignalParameters) -> FsoResult<()> {
        match &self.error_model {
            Some(model) => model.check(params),
            None => Ok(()),
        }
    }

    /// Handle an arrival: run the error model if bound, then hand the packet up
    pub fn receive(&mut self, mut packet: Packet, params: SignalParameters) -> FsoResult<ReceivedPacket> {
        self.state = PhyState::Rx;
        let outcome = match self.error_model.as_mut() {
            Some(model) => model.corrupt(&mut packet, &params),
            None => Ok(RxOutcome::Unchecked),
        };
        self.state = PhyState::Idle;
        let outcome = outcome?;

        self.stats.packets_received += 1;
        self.stats.bytes_received += packet.len() as u64;
        if outcome.is_corrupted() {
            self.stats.packets_corrupted += 1;
        }

        info!(
            target: "fso::phy",
            phy = %self.id,
            packet = packet.uid(),
            corrupted = outcome.is_corrupted(),
            "packet received"
        );

        let received = ReceivedPacket {
            packet,
            params,
            outcome,
        };
        if let Some(callback) = self.rx_callback.as_mut() {
            callback(self.id, &received);
        }
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobility::ConstantPosition;

    fn laser() -> LaserAntenna {
        LaserAntenna::new(0.120, 0.0, 0.1, 116.0).unwrap()
    }

    #[test]
    fn test_builder_requires_mobility() {
        let err = FsoPhy::builder().bit_rate(1e6).build(PhyId(0)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_builder_rejects_bad_bit_rate() {
        let result = FsoPhy::builder()
            .mobility(ConstantPosition::new(Vector3::default()))
            .bit_rate(0.0)
            .build(PhyId(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_error_model_bound_to_phy() {
        let phy = FsoPhy::builder()
            .mobility(ConstantPosition::new(Vector3::default()))
            .error_model(ErrorModelConfig::default())
            .build(PhyId(4))
            .unwrap();
        assert_eq!(phy.error_model().unwrap().phy(), Some(PhyId(4)));
    }

    #[test]
    fn test_tx_duration() {
        let params = SignalParameters::new(847e-9, 49.3724e6, 0.1, 0.06).unwrap();
        let duration = FsoPhy::calculate_tx_duration(8192, &params);
        // 8192 bits / 49.3724 Mbit/s ≈ 165.92 µs
        assert!((duration.as_secs_f64() - 8192.0 / 49.3724e6).abs() < 1e-9);
    }

    #[test]
    fn test_send_requires_channel() {
        let mut phy = FsoPhy::builder()
            .mobility(ConstantPosition::new(Vector3::default()))
            .laser(laser())
            .build(PhyId(0))
            .unwrap();
        let mut params = phy.signal_parameters(847e-9).unwrap();
        let err = phy.begin_send(&Packet::with_size(8), &mut params).unwrap_err();
        assert!(matches!(err, FsoError::NotAttached(PhyId(0))));
        assert!(err.is_attachment());
    }

    #[test]
    fn test_only_accepted_sends_counted() {
        let mut phy = FsoPhy::builder()
            .mobility(ConstantPosition::new(Vector3::default()))
            .laser(laser())
            .build(PhyId(0))
            .unwrap();
        phy.set_channel(Some(ChannelId(0)));
        let packet = Packet::with_size(16);

        let mut params = phy.signal_parameters(847e-9).unwrap();
        phy.begin_send(&packet, &mut params).unwrap();
        assert_eq!(phy.state(), PhyState::Tx);
        assert_eq!(phy.stats().packets_sent, 0);
        phy.end_send(&packet, false);
        assert_eq!(phy.state(), PhyState::Idle);
        assert_eq!(phy.stats().packets_sent, 0);

        phy.begin_send(&packet, &mut params).unwrap();
        phy.end_send(&packet, true);
        assert_eq!(phy.stats().packets_sent, 1);
        assert_eq!(phy.stats().bytes_sent, 16);
    }

    #[test]
    fn test_signal_parameters_need_laser() {
        let phy = FsoPhy::builder()
            .mobility(ConstantPosition::new(Vector3::default()))
            .build(PhyId(2))
            .unwrap();
        assert!(matches!(
            phy.signal_parameters(847e-9),
            Err(FsoError::MissingAntenna { kind: "laser", .. })
        ));
    }

    #[test]
    fn test_receive_without_error_model() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut phy = FsoPhy::builder()
            .mobility(ConstantPosition::new(Vector3::default()))
            .on_receive(move |id, rx| sink.borrow_mut().push((id, rx.packet.uid())))
            .build(PhyId(1))
            .unwrap();

        let packet = Packet::new(vec![1, 2, 3]);
        let uid = packet.uid();
        let params = SignalParameters::new(847e-9, 1e6, 1e-6, 0.06).unwrap();
        let received = phy.receive(packet, params).unwrap();

        assert_eq!(received.outcome, RxOutcome::Unchecked);
        assert_eq!(received.packet.payload(), &[1, 2, 3]);
        assert_eq!(phy.stats().packets_received, 1);
        assert_eq!(phy.state(), PhyState::Idle);
        assert_eq!(seen.borrow().as_slice(), &[(PhyId(1), uid)]);
    }
}
