//! Network driver
//!
//! [`FsoNetwork`] owns every PHY and channel plus the event scheduler, and
//! runs the delivery loop. PHYs and channels refer to each other by id, so
//! there is no shared ownership between them.
//!
//! ## Example
//!
//! ```
//! use fso_core::prelude::*;
//!
//! let mut net = FsoNetwork::new();
//! let ch = net.add_channel();
//! net.channel_mut(ch)?.add_propagation_loss_model(Box::new(FreeSpaceLoss::new()));
//!
//! let laser = LaserAntenna::new(0.120, 0.0, 0.1, 116.0)?;
//! let tx = net.add_phy(
//!     FsoPhy::builder()
//!         .mobility(ConstantPosition::new(Vector3::new(0.0, 0.0, 10_000.0)))
//!         .laser(laser)
//!         .bit_rate(1e6),
//! )?;
//! let rx = net.add_phy(
//!     FsoPhy::builder()
//!         .mobility(ConstantPosition::new(Vector3::default()))
//!         .error_model(ErrorModelConfig::default()),
//! )?;
//! net.attach(ch, tx)?;
//! net.attach(ch, rx)?;
//!
//! let params = net.phy(tx)?.signal_parameters(847e-9)?;
//! net.send_packet(tx, Packet::with_size(64), params)?;
//! net.run()?;
//! assert_eq!(net.deliveries().len(), 1);
//! # Ok::<(), fso_core::FsoError>(())
//! ```

use crate::channel::{Channel, ChannelId, Delivery};
use crate::error::{FsoError, FsoResult};
use crate::error_model::RxOutcome;
use crate::packet::Packet;
use crate::phy::{FsoPhy, FsoPhyBuilder, PhyId};
use crate::scheduler::{EventId, Scheduler};
use crate::signal::SignalParameters;
use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One processed delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub time: SimTime,
    pub event: EventId,
    pub channel: ChannelId,
    pub tx: PhyId,
    pub rx: PhyId,
    pub packet_uid: u64,
    pub size_bytes: usize,
    pub outcome: RxOutcome,
    pub params: SignalParameters,
}

/// PHYs, channels and the scheduler that drives them
#[derive(Debug, Default)]
pub struct FsoNetwork {
    phys: Vec<FsoPhy>,
    channels: Vec<Channel>,
    scheduler: Scheduler<Delivery>,
    deliveries: Vec<DeliveryRecord>,
    next_packet_uid: u64,
}

impl FsoNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn add_channel(&mut self) -> ChannelId {
        let id = ChannelId(self.channels.len());
        self.channels.push(Channel::new(id));
        debug!(target: "fso::network", channel = %id, "channel created");
        id
    }

    pub fn channel(&self, id: ChannelId) -> FsoResult<&Channel> {
        self.channels.get(id.0).ok_or(FsoError::UnknownChannel(id))
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> FsoResult<&mut Channel> {
        self.channels.get_mut(id.0).ok_or(FsoError::UnknownChannel(id))
    }

    pub fn add_phy(&mut self, builder: FsoPhyBuilder) -> FsoResult<PhyId> {
        let id = PhyId(self.phys.len());
        let phy = builder.build(id)?;
        self.phys.push(phy);
        debug!(target: "fso::network", phy = %id, "PHY created");
        Ok(id)
    }

    pub fn phy(&self, id: PhyId) -> FsoResult<&FsoPhy> {
        self.phys.get(id.0).ok_or(FsoError::UnknownPhy(id))
    }

    pub fn phy_mut(&mut self, id: PhyId) -> FsoResult<&mut FsoPhy> {
        self.phys.get_mut(id.0).ok_or(FsoError::UnknownPhy(id))
    }

    pub fn phys(&self) -> impl Iterator<Item = &FsoPhy> {
        self.phys.iter()
    }

    /// Wire `phy` into `channel`; a PHY belongs to at most one channel
    pub fn attach(&mut self, channel: ChannelId, phy: PhyId) -> FsoResult<()> {
        let current = self.phy(phy)?.channel();
        if let Some(existing) = current {
            return Err(FsoError::AlreadyAttached {
                phy,
                channel: existing,
            });
        }
        self.channel_mut(channel)?.attach(phy)?;
        self.phy_mut(phy)?.set_channel(Some(channel));
        Ok(())
    }

    /// Unwire `phy` and cancel every delivery still heading to it
    ///
    /// Returns the number of cancelled deliveries.
    pub fn detach(&mut self, channel: ChannelId, phy: PhyId) -> FsoResult<usize> {
        self.phy(phy)?;
        let tokens = self.channel_mut(channel)?.detach(phy)?;
        let cancelled = tokens.into_iter().filter(|&id| self.scheduler.cancel(id)).count();
        if cancelled > 0 {
            warn!(target: "fso::network", %phy, %channel, cancelled, "in-flight deliveries suppressed");
        }
        self.phy_mut(phy)?.set_channel(None);
        Ok(cancelled)
    }

    /// Transmit `packet` from `phy` over its channel
    ///
    /// The packet is stamped with the next uid of this network, so two
    /// networks driven the same way produce identical delivery logs.
    /// Returns the number of receivers a delivery was scheduled for.
    pub fn send_packet(&mut self, phy: PhyId, mut packet: Packet, mut params: SignalParameters) -> FsoResult<usize> {
        let Self {
            phys,
            channels,
            scheduler,
            next_packet_uid,
            ..
        } = self;
        packet.set_uid(*next_packet_uid + 1);

        let sender = phys.get_mut(phy.0).ok_or(FsoError::UnknownPhy(phy))?;
        let channel_id = sender.begin_send(&packet, &mut params)?;
        let result = match channels.get_mut(channel_id.0) {
            Some(channel) => channel.send(&packet, &params, phy, phys, scheduler),
            None => Err(FsoError::UnknownChannel(channel_id)),
        };
        if let Some(sender) = phys.get_mut(phy.0) {
            sender.end_send(&packet, result.is_ok());
        }
        if result.is_ok() {
            *next_packet_uid += 1;
        }
        result
    }

    /// Process the next delivery; `None` when the queue is empty
    pub fn step(&mut self) -> FsoResult<Option<&DeliveryRecord>> {
        let Some((time, event, delivery)) = self.scheduler.pop() else {
            return Ok(None);
        };
        let Delivery {
            channel,
            tx,
            rx,
            packet,
            params,
        } = delivery;

        if let Some(ch) = self.channels.get_mut(channel.0) {
            ch.complete(event);
        }

        let size_bytes = packet.len();
        let packet_uid = packet.uid();
        let received = self.phy_mut(rx)?.receive(packet, params)?;

        info!(
            target: "fso::network",
            %time,
            %tx,
            %rx,
            packet = packet_uid,
            power = received.params.power,
            corrupted = received.is_corrupted(),
            "delivery"
        );

        self.deliveries.push(DeliveryRecord {
            time,
            event,
            channel,
            tx,
            rx,
            packet_uid,
            size_bytes,
            outcome: received.outcome,
            params: received.params,
        });
        Ok(self.deliveries.last())
    }

    /// Drain the queue; returns the number of deliveries processed
    pub fn run(&mut self) -> FsoResult<usize> {
        let mut count = 0;
        while self.step()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Process every delivery due at or before `time`, then move the clock
    /// to `time`
    pub fn run_until(&mut self, time: SimTime) -> FsoResult<usize> {
        let mut count = 0;
        while self.scheduler.peek_time().is_some_and(|t| t <= time) {
            if self.step()?.is_none() {
                break;
            }
            count += 1;
        }
        self.scheduler.advance_to(time)?;
        Ok(count)
    }

    /// Log of every processed delivery, in firing order
    pub fn deliveries(&self) -> &[DeliveryRecord] {
        &self.deliveries
    }

    pub fn clear_deliveries(&mut self) {
        self.deliveries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antenna::{LaserAntenna, OpticalRxAntenna};
    use crate::error_model::ErrorModelConfig;
    use crate::mobility::ConstantPosition;
    use crate::phy::PhyState;
    use crate::propagation::FreeSpaceLoss;
    use crate::types::Vector3;

    fn laser() -> LaserAntenna {
        LaserAntenna::new(0.120, 0.0, 0.1, 116.0).unwrap()
    }

    fn node(net: &mut FsoNetwork, z: f64) -> PhyId {
        net.add_phy(
            FsoPhy::builder()
                .mobility(ConstantPosition::new(Vector3::new(0.0, 0.0, z)))
                .laser(laser())
                .receiver(OpticalRxAntenna::new(0.318, 121.4).unwrap())
                .error_model(ErrorModelConfig::default())
                .bit_rate(49.3724e6),
        )
        .unwrap()
    }

    #[test]
    fn test_attach_twice_rejected() {
        let mut net = FsoNetwork::new();
        let a = net.add_channel();
        let b = net.add_channel();
        let phy = node(&mut net, 0.0);

        net.attach(a, phy).unwrap();
        assert!(matches!(
            net.attach(a, phy),
            Err(FsoError::AlreadyAttached { channel: ChannelId(0), .. })
        ));
        assert!(matches!(
            net.attach(b, phy),
            Err(FsoError::AlreadyAttached { channel: ChannelId(0), .. })
        ));
        assert!(net.channel(b).unwrap().attached().is_empty());
    }

    #[test]
    fn test_unknown_ids() {
        let mut net = FsoNetwork::new();
        let phy = node(&mut net, 0.0);
        assert!(matches!(net.attach(ChannelId(7), phy), Err(FsoError::UnknownChannel(_))));
        assert!(matches!(net.phy(PhyId(9)), Err(FsoError::UnknownPhy(_))));
    }

    #[test]
    fn test_send_unattached() {
        let mut net = FsoNetwork::new();
        let phy = node(&mut net, 100.0);
        let params = net.phy(phy).unwrap().signal_parameters(847e-9).unwrap();
        let err = net.send_packet(phy, Packet::with_size(8), params).unwrap_err();
        assert!(err.is_attachment());
        assert_eq!(net.pending_events(), 0);
        assert_eq!(net.phy(phy).unwrap().stats().packets_sent, 0);
    }

    #[test]
    fn test_detach_cancels() {
        let mut net = FsoNetwork::new();
        let ch = net.add_channel();
        let tx = node(&mut net, 10_000.0);
        let rx = node(&mut net, 0.0);
        net.attach(ch, tx).unwrap();
        net.attach(ch, rx).unwrap();

        let params = net.phy(tx).unwrap().signal_parameters(847e-9).unwrap();
        assert_eq!(net.send_packet(tx, Packet::with_size(8), params).unwrap(), 1);
        assert_eq!(net.detach(ch, rx).unwrap(), 1);
        assert_eq!(net.phy(rx).unwrap().channel(), None);

        assert_eq!(net.run().unwrap(), 0);
        assert!(net.deliveries().is_empty());
        assert_eq!(net.phy(rx).unwrap().stats().packets_received, 0);
    }

    #[test]
    fn test_packet_uids_issued_per_network() {
        let deliveries = || {
            let mut net = FsoNetwork::new();
            let ch = net.add_channel();
            let tx = node(&mut net, 10_000.0);
            let rx = node(&mut net, 0.0);
            net.attach(ch, tx).unwrap();
            net.attach(ch, rx).unwrap();
            for _ in 0..3 {
                let params = net.phy(tx).unwrap().signal_parameters(847e-9).unwrap();
                net.send_packet(tx, Packet::with_size(8), params).unwrap();
            }
            net.run().unwrap();
            net.deliveries().to_vec()
        };

        let first = deliveries();
        let uids: Vec<u64> = first.iter().map(|d| d.packet_uid).collect();
        assert_eq!(uids, vec![1, 2, 3]);
        assert_eq!(first, deliveries());
    }

    #[test]
    fn test_failed_send_not_counted() {
        let mut net = FsoNetwork::new();
        let ch = net.add_channel();
        net.channel_mut(ch)
            .unwrap()
            .add_propagation_loss_model(Box::new(FreeSpaceLoss::new()));
        // co-located PHYs: the loss chain rejects the link
        let tx = node(&mut net, 0.0);
        let rx = node(&mut net, 0.0);
        net.attach(ch, tx).unwrap();
        net.attach(ch, rx).unwrap();

        let params = net.phy(tx).unwrap().signal_parameters(847e-9).unwrap();
        assert!(net.send_packet(tx, Packet::with_size(8), params).is_err());
        let stats = net.phy(tx).unwrap().stats();
        assert_eq!(stats.packets_sent, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(net.phy(tx).unwrap().state(), PhyState::Idle);
        assert_eq!(net.channel(ch).unwrap().stats().transmissions, 0);
    }

    #[test]
    fn test_negative_power_rejected_at_send() {
        let mut net = FsoNetwork::new();
        let ch = net.add_channel();
        let tx = node(&mut net, 10_000.0);
        let rx = net
            .add_phy(FsoPhy::builder().mobility(ConstantPosition::new(Vector3::default())))
            .unwrap();
        net.attach(ch, tx).unwrap();
        net.attach(ch, rx).unwrap();

        let mut params = net.phy(tx).unwrap().signal_parameters(847e-9).unwrap();
        params.power = -1.0;
        let err = net.send_packet(tx, Packet::with_size(8), params).unwrap_err();
        assert!(matches!(err, FsoError::InvalidParameter { name: "power", .. }));
        assert_eq!(net.pending_events(), 0);
        assert_eq!(net.phy(tx).unwrap().stats().packets_sent, 0);
    }

    #[test]
    fn test_run_until_stops_at_time() {
        let mut net = FsoNetwork::new();
        let ch = net.add_channel();
        let tx = node(&mut net, 299_792.458);
        let rx = node(&mut net, 0.0);
        net.attach(ch, tx).unwrap();
        net.attach(ch, rx).unwrap();

        let params = net.phy(tx).unwrap().signal_parameters(847e-9).unwrap();
        net.send_packet(tx, Packet::with_size(8), params).unwrap();

        // delivery is due at 1 ms
        assert_eq!(net.run_until(SimTime::from_nanos(500_000)).unwrap(), 0);
        assert_eq!(net.now(), SimTime::from_nanos(500_000));
        assert_eq!(net.run_until(SimTime::from_nanos(2_000_000)).unwrap(), 1);
        assert_eq!(net.now(), SimTime::from_nanos(2_000_000));
        assert_eq!(net.deliveries()[0].time, SimTime::from_nanos(1_000_000));
    }
}
