//! Propagation loss and delay models
//!
//! A channel applies an ordered chain of [`PropagationLossModel`]s to the
//! signal parameters of every transmission, one receiver at a time. Each
//! model sees only the output of the previous model plus the link
//! geometry, so the chain is not commutative in general. The physical
//! order is:
//!
//! 1. [`FreeSpaceLoss`] - geometric loss from distance and wavelength
//! 2. [`DownlinkScintillationIndex`] - turbulence strength along the slant path
//! 3. [`MeanIrradiance`] - on-axis irradiance after Gaussian beam spreading
//!
//! The channel applies models in registration order and never reorders them.

mod delay;
mod free_space;
mod mean_irradiance;
mod scintillation;

pub use delay::{ConstantSpeedPropagationDelay, PropagationDelayModel};
pub use free_space::{free_space_path_loss_db, FreeSpaceLoss};
pub use mean_irradiance::{gaussian_beam_radius, MeanIrradiance};
pub use scintillation::{hufnagel_valley_cn2, scintillation_index_from_rytov, DownlinkScintillationIndex};

use crate::antenna::OpticalRxAntenna;
use crate::error::{FsoError, FsoResult};
use crate::signal::SignalParameters;
use crate::types::Vector3;
use std::fmt::Debug;

/// Geometry and receive-side antenna of one transmitter→receiver link
#[derive(Debug, Clone, Copy)]
pub struct Link<'a> {
    pub tx_position: Vector3,
    pub rx_position: Vector3,
    pub rx_antenna: Option<&'a OpticalRxAntenna>,
}

impl<'a> Link<'a> {
    pub fn new(tx_position: Vector3, rx_position: Vector3) -> Self {
        Self {
            tx_position,
            rx_position,
            rx_antenna: None,
        }
    }

    pub fn with_rx_antenna(mut self, antenna: &'a OpticalRxAntenna) -> Self {
        self.rx_antenna = Some(antenna);
        self
    }

    /// Euclidean link distance (m)
    pub fn distance(&self) -> f64 {
        self.tx_position.distance_to(&self.rx_position)
    }

    /// Link distance, failing fast on coincident endpoints
    pub fn checked_distance(&self) -> FsoResult<f64> {
        let d = self.distance();
        if !d.is_finite() {
            return Err(FsoError::InvalidGeometry(format!("non-finite link distance {d}")));
        }
        if d <= 0.0 {
            return Err(FsoError::ZeroDistance);
        }
        Ok(d)
    }
}

/// One stage of the loss-model chain
pub trait PropagationLossModel: Debug {
    /// Short name for logs and link-budget reports
    fn name(&self) -> &'static str;

    /// Transform `params` for the given link
    fn apply(&self, params: SignalParameters, link: &Link<'_>) -> FsoResult<SignalParameters>;
}
