//! # FSO Core
//!
//! Discrete-event simulation of free-space optical (laser) links.
//!
//! A transmission flows through four pieces:
//!
//! ```text
//! ┌─────────┐  send_packet  ┌─────────────────────────────────────┐  delay  ┌─────────┐
//! │ FsoPhy  │──────────────►│ Channel                             │────────►│ FsoPhy  │
//! │ (laser) │               │ FreeSpaceLoss → Scintillation →     │         │ (rx)    │
//! └─────────┘               │ MeanIrradiance                      │         │  error  │
//!                           └─────────────────────────────────────┘         │  model  │
//!                                                                           └─────────┘
//! ```
//!
//! - [`signal::SignalParameters`] carries wavelength, symbol period and
//!   power through the loss chain.
//! - [`propagation`] holds the loss models and the delay model.
//! - [`channel::Channel`] applies the chain per receiver and schedules
//!   deliveries to every attached PHY except the sender.
//! - [`error_model::FsoErrorModel`] draws a log-normal irradiance sample
//!   and marks the packet corrupted below the detection threshold.
//! - [`network::FsoNetwork`] owns PHYs, channels and the scheduler.
//! - [`scenario`] builds a complete downlink from a serde config.
//!
//! ## Quick start
//!
//! ```
//! use fso_core::prelude::*;
//!
//! let mut scenario = Scenario::build(ScenarioConfig::leo_downlink())?;
//! let report = scenario.run()?;
//! assert_eq!(report.deliveries.len(), 1);
//! # Ok::<(), fso_core::FsoError>(())
//! ```

pub mod antenna;
pub mod channel;
pub mod error;
pub mod error_model;
pub mod math;
pub mod mobility;
pub mod network;
pub mod packet;
pub mod phy;
pub mod propagation;
pub mod scenario;
pub mod scheduler;
pub mod signal;
pub mod types;

pub use error::{FsoError, FsoResult};

/// Commonly used types
pub mod prelude {
    pub use crate::antenna::{LaserAntenna, OpticalRxAntenna};
    pub use crate::channel::{Channel, ChannelId, Delivery};
    pub use crate::error::{FsoError, FsoResult};
    pub use crate::error_model::{ErrorModelConfig, FsoErrorModel, RxOutcome, SamplingGranularity};
    pub use crate::mobility::{ConstantPosition, ConstantVelocity, MobilityModel};
    pub use crate::network::{DeliveryRecord, FsoNetwork};
    pub use crate::packet::Packet;
    pub use crate::phy::{FsoPhy, PhyId, PhyState, ReceivedPacket};
    pub use crate::propagation::{
        ConstantSpeedPropagationDelay, DownlinkScintillationIndex, FreeSpaceLoss, Link, MeanIrradiance,
        PropagationDelayModel, PropagationLossModel,
    };
    pub use crate::scenario::{LinkBudget, Scenario, ScenarioConfig, ScenarioReport};
    pub use crate::scheduler::{EventId, Scheduler};
    pub use crate::signal::SignalParameters;
    pub use crate::types::{SimTime, Vector3, SPEED_OF_LIGHT};
}
