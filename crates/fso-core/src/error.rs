//! Error types for the FSO simulation core.
//!
//! Errors fall into two families: configuration errors (invalid physical
//! parameters or link geometry) and attachment errors (PHY/channel wiring
//! mistakes). A corrupted packet is not an error; see
//! [`RxOutcome`](crate::error_model::RxOutcome).

use crate::channel::ChannelId;
use crate::phy::PhyId;
use thiserror::Error;

/// FSO simulation error type
#[derive(Error, Debug)]
pub enum FsoError {
    /// A physical parameter is out of its valid range
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Offending value
        value: f64,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Transmitter and receiver share a position
    #[error("zero link distance: free-space loss is undefined")]
    ZeroDistance,

    /// Link geometry not supported by a loss model
    #[error("invalid link geometry: {0}")]
    InvalidGeometry(String),

    /// Generic configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// PHY has no channel
    #[error("PHY {0} is not attached to a channel")]
    NotAttached(PhyId),

    /// PHY attached twice
    #[error("PHY {phy} is already attached to channel {channel}")]
    AlreadyAttached {
        /// The PHY
        phy: PhyId,
        /// The channel it is attached to
        channel: ChannelId,
    },

    /// No PHY with this id
    #[error("unknown PHY {0}")]
    UnknownPhy(PhyId),

    /// No channel with this id
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// An operation needs an antenna the PHY lacks
    #[error("PHY {phy} has no {kind} antenna")]
    MissingAntenna {
        /// The PHY
        phy: PhyId,
        /// "laser" or "receiver"
        kind: &'static str,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FsoError {
    /// True for invalid physical parameters or geometry
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FsoError::InvalidParameter { .. }
                | FsoError::ZeroDistance
                | FsoError::InvalidGeometry(_)
                | FsoError::Config(_)
                | FsoError::Json(_)
        )
    }

    /// True for PHY/channel wiring errors
    pub fn is_attachment(&self) -> bool {
        matches!(
            self,
            FsoError::NotAttached(_)
                | FsoError::AlreadyAttached { .. }
                | FsoError::UnknownPhy(_)
                | FsoError::UnknownChannel(_)
                | FsoError::MissingAntenna { .. }
        )
    }
}

/// Result type alias for FSO operations
pub type FsoResult<T> = std::result::Result<T, FsoError>;

/// Reject values that are not strictly positive and finite
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> FsoResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FsoError::InvalidParameter {
            name,
            value,
            reason: "must be positive and finite",
        })
    }
}

/// Reject NaN and infinities
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> FsoResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FsoError::InvalidParameter {
            name,
            value,
            reason: "must be finite",
        })
    }
}

/// Reject negative or non-finite values
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> FsoResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(FsoError::InvalidParameter {
            name,
            value,
            reason: "must be non-negative and finite",
        })
    }
}
