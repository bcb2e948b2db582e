//! Optical antenna models
//!
//! A transmitting PHY carries a [`LaserAntenna`] (beam geometry, optical
//! power, gain); a receiving PHY carries an [`OpticalRxAntenna`] (aperture
//! and gain). A PHY may carry either or both.

use crate::error::{ensure_finite, ensure_non_negative, ensure_positive, FsoResult};
use serde::{Deserialize, Serialize};

/// Transmit-side laser antenna
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserAntenna {
    /// Beam diameter at the transmit aperture (m)
    pub beamwidth: f64,
    /// Radius of curvature of the phase front (m); 0 means collimated
    pub phase_front_radius: f64,
    /// Pointing orientation (rad)
    pub orientation: f64,
    /// Optical transmit power (W)
    pub tx_power: f64,
    /// Transmit gain (dB)
    pub gain_db: f64,
}

impl LaserAntenna {
    /// Create a laser antenna, rejecting non-physical values
    pub fn new(beamwidth: f64, phase_front_radius: f64, tx_power: f64, gain_db: f64) -> FsoResult<Self> {
        let antenna = Self {
            beamwidth,
            phase_front_radius,
            orientation: 0.0,
            tx_power,
            gain_db,
        };
        antenna.validate()?;
        Ok(antenna)
    }

    /// Builder: set orientation
    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.orientation = orientation;
        self
    }

    /// Beam radius W0 at the transmitter (half the diameter)
    pub fn beam_radius(&self) -> f64 {
        self.beamwidth / 2.0
    }

    /// Check every field is physical
    pub fn validate(&self) -> FsoResult<()> {
        ensure_positive("laser.beamwidth", self.beamwidth)?;
        ensure_non_negative("laser.phase_front_radius", self.phase_front_radius)?;
        ensure_positive("laser.tx_power", self.tx_power)?;
        ensure_finite("laser.gain_db", self.gain_db)?;
        Ok(())
    }
}

/// Receive-side optical antenna (telescope aperture)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalRxAntenna {
    /// Aperture diameter (m)
    pub aperture_diameter: f64,
    /// Receive gain (dB)
    pub rx_gain_db: f64,
    /// Pointing orientation (rad)
    pub orientation: f64,
}

impl OpticalRxAntenna {
    pub fn new(aperture_diameter: f64, rx_gain_db: f64) -> FsoResult<Self> {
        let antenna = Self {
            aperture_diameter,
            rx_gain_db,
            orientation: 0.0,
        };
        antenna.validate()?;
        Ok(antenna)
    }

    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn aperture_radius(&self) -> f64 {
        self.aperture_diameter / 2.0
    }

    pub fn validate(&self) -> FsoResult<()> {
        ensure_positive("receiver.aperture_diameter", self.aperture_diameter)?;
        ensure_finite("receiver.rx_gain_db", self.rx_gain_db)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_laser_validation() {
        let laser = LaserAntenna::new(0.120, 707_000.0, 0.1, 116.0).unwrap();
        assert!((laser.beam_radius() - 0.06).abs() < 1e-12);
        assert!(LaserAntenna::new(0.0, 0.0, 0.1, 116.0).is_err());
        assert!(LaserAntenna::new(0.12, 0.0, -0.1, 116.0).is_err());
        assert!(LaserAntenna::new(0.12, -5.0, 0.1, 116.0).is_err());
        assert!(LaserAntenna::new(0.12, 0.0, 0.1, f64::INFINITY).is_err());
    }

    #[test]
    fn test_receiver_validation() {
        let rx = OpticalRxAntenna::new(0.318, 121.4).unwrap();
        assert!((rx.aperture_radius() - 0.159).abs() < 1e-12);
        let err = OpticalRxAntenna::new(0.0, 121.4).unwrap_err();
        assert!(err.is_configuration());
    }
}
