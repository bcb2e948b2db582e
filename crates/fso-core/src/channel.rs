//! Optical broadcast channel
//!
//! A channel owns the loss-model chain and the delay model and keeps the
//! ids of its attached PHYs in insertion order. A send runs the chain once
//! per receiver and schedules one delayed [`Delivery`] for every attached
//! PHY except the sender.

use crate::error::{FsoError, FsoResult};
use crate::packet::Packet;
use crate::phy::{FsoPhy, PhyId};
use crate::propagation::{
    ConstantSpeedPropagationDelay, Link, PropagationDelayModel, PropagationLossModel,
};
use crate::scheduler::{EventId, Scheduler};
use crate::signal::SignalParameters;
use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, trace};

/// Channel identifier, an index into the network's channel table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub usize);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A packet in flight towards one receiver
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: ChannelId,
    pub tx: PhyId,
    pub rx: PhyId,
    pub packet: Packet,
    /// Signal parameters after the whole loss chain for this receiver
    pub params: SignalParameters,
}

/// Counters kept per channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub transmissions: u64,
    pub deliveries_scheduled: u64,
    pub deliveries_cancelled: u64,
}

/// Broadcast medium shared by a set of PHYs
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    phys: Vec<PhyId>,
    loss_models: Vec<Box<dyn PropagationLossModel>>,
    delay_model: Box<dyn PropagationDelayModel>,
    pending: Vec<(PhyId, EventId)>,
    stats: ChannelStats,
}

impl Channel {
    /// Empty channel with no loss models and a speed-of-light delay
    pub(crate) fn new(id: ChannelId) -> Self {
        Self {
            id,
            phys: Vec::new(),
            loss_models: Vec::new(),
            delay_model: Box::new(ConstantSpeedPropagationDelay::default()),
            pending: Vec::new(),
            stats: ChannelStats::default(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Append a model to the end of the loss chain
    pub fn add_propagation_loss_model(&mut self, model: Box<dyn PropagationLossModel>) {
        debug!(target: "fso::channel", channel = %self.id, model = model.name(), "loss model added");
        self.loss_models.push(model);
    }

    pub fn set_propagation_delay_model(&mut self, model: Box<dyn PropagationDelayModel>) {
        self.delay_model = model;
    }

    pub fn loss_models(&self) -> impl Iterator<Item = &dyn PropagationLossModel> {
        self.loss_models.iter().map(|m| m.as_ref())
    }

    pub fn delay_model(&self) -> &dyn PropagationDelayModel {
        self.delay_model.as_ref()
    }

    /// Attached PHYs in attachment order
    pub fn attached(&self) -> &[PhyId] {
        &self.phys
    }

    pub fn is_attached(&self, phy: PhyId) -> bool {
        self.phys.contains(&phy)
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Deliveries scheduled but not yet fired or cancelled
    pub fn pending_deliveries(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn attach(&mut self, phy: PhyId) -> FsoResult<()> {
        if self.is_attached(phy) {
            return Err(FsoError::AlreadyAttached {
                phy,
                channel: self.id,
            });
        }
        self.phys.push(phy);
        debug!(target: "fso::channel", channel = %self.id, %phy, count = self.phys.len(), "PHY attached");
        Ok(())
    }

    /// Remove `phy` and hand back the tokens of deliveries still heading to it
    pub(crate) fn detach(&mut self, phy: PhyId) -> FsoResult<Vec<EventId>> {
        let pos = self
            .phys
            .iter()
            .position(|&p| p == phy)
            .ok_or(FsoError::NotAttached(phy))?;
        self.phys.remove(pos);

        let mut cancelled = Vec::new();
        self.pending.retain(|&(rx, id)| {
            if rx == phy {
                cancelled.push(id);
                false
            } else {
                true
            }
        });
        self.stats.deliveries_cancelled += cancelled.len() as u64;
        debug!(
            target: "fso::channel",
            channel = %self.id,
            %phy,
            cancelled = cancelled.len(),
            "PHY detached"
        );
        Ok(cancelled)
    }

    /// A delivery fired; forget its token
    pub(crate) fn complete(&mut self, id: EventId) {
        self.pending.retain(|&(_, pending)| pending != id);
    }

    /// Run the loss chain in registration order
    pub fn apply_loss_chain(&self, mut params: SignalParameters, link: &Link<'_>) -> FsoResult<SignalParameters> {
        for model in &self.loss_models {
            params = model.apply(params, link)?;
            trace!(target: "fso::channel", model = model.name(), power = params.power, "loss stage");
        }
        Ok(params)
    }

    /// Dispatch `packet` from `sender` to every other attached PHY
    ///
    /// All receivers are evaluated before anything is scheduled: a loss-model
    /// or error-model configuration error aborts the whole send with nothing
    /// in flight. Returns the number of deliveries scheduled.
    pub(crate) fn send(
        &mut self,
        packet: &Packet,
        params: &SignalParameters,
        sender: PhyId,
        phys: &[FsoPhy],
        scheduler: &mut Scheduler<Delivery>,
    ) -> FsoResult<usize> {
        let now = scheduler.now();
        let tx = phys.get(sender.0).ok_or(FsoError::UnknownPhy(sender))?;
        let tx_position = tx.position(now);

        let mut outgoing: Vec<(PhyId, SimTime, SignalParameters)> = Vec::with_capacity(self.phys.len());
        for &rx_id in self.phys.iter().filter(|&&p| p != sender) {
            let rx = phys.get(rx_id.0).ok_or(FsoError::UnknownPhy(rx_id))?;
            let rx_position = rx.position(now);

            let mut link = Link::new(tx_position, rx_position);
            if let Some(antenna) = rx.receiver() {
                link = link.with_rx_antenna(antenna);
            }

            let rx_params = self.apply_loss_chain(params.clone(), &link)?;
            rx.check_receivable(&rx_params)?;
            let delay = self.delay_model.delay(&tx_position, &rx_position);
            outgoing.push((rx_id, delay, rx_params));
        }

        let count = outgoing.len();
        for (rx, delay, rx_params) in outgoing {
            let power = rx_params.power;
            let id = scheduler.schedule_in(
                delay,
                Delivery {
                    channel: self.id,
                    tx: sender,
                    rx,
                    packet: packet.clone(),
                    params: rx_params,
                },
            );
            self.pending.push((rx, id));
            debug!(
                target: "fso::channel",
                channel = %self.id,
                tx = %sender,
                %rx,
                event = %id,
                %delay,
                power,
                "delivery scheduled"
            );
        }

        self.stats.transmissions += 1;
        self.stats.deliveries_scheduled += count as u64;
        info!(
            target: "fso::channel",
            channel = %self.id,
            tx = %sender,
            packet = packet.uid(),
            receivers = count,
            "packet dispatched"
        );
        Ok(count)
    }
}
