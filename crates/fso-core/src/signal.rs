//! Per-transmission optical signal parameters
//!
//! A [`SignalParameters`] value is created by the transmitter, copied once
//! per receiver by the channel, and threaded through the loss-model chain.
//! Each stage may rewrite `power` and fills in its own auxiliary field:
//!
//! ```text
//! from_laser ──► FreeSpaceLoss ──► DownlinkScintillationIndex ──► MeanIrradiance ──► error model
//!  power = Ptx    power ×= gain      rytov_variance,                power = <I> (W/m²)
//!                 path_loss_db       scintillation_index            rx_beam_radius
//! ```

use crate::antenna::LaserAntenna;
use crate::error::{ensure_non_negative, ensure_positive, FsoResult};
use crate::phy::PhyId;
use crate::types::SPEED_OF_LIGHT;
use serde::{Deserialize, Serialize};

/// Optical quantities accumulated along one transmission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalParameters {
    /// Wavelength (m)
    pub wavelength: f64,
    /// Optical frequency (Hz), c / wavelength
    pub frequency: f64,
    /// Symbol period (s), 1 / bit rate
    pub symbol_period: f64,
    /// Optical power (W) until the mean-irradiance stage, irradiance (W/m²) after it
    pub power: f64,
    /// Transmitting PHY
    pub tx_phy: Option<PhyId>,
    /// Transmitting laser
    pub tx_antenna: Option<LaserAntenna>,
    /// Beam radius W0 at the transmitter (m)
    pub tx_beamwidth: f64,
    /// Phase-front radius of curvature at the transmitter (m), 0 = collimated
    pub tx_phase_front_radius: f64,
    /// Free-space path loss (dB), set by the free-space stage
    pub path_loss_db: Option<f64>,
    /// Rytov variance, set by the turbulence stage
    pub rytov_variance: Option<f64>,
    /// Scintillation index σ², set by the turbulence stage
    pub scintillation_index: Option<f64>,
    /// Beam radius at the receiver (m), set by the mean-irradiance stage
    pub rx_beam_radius: Option<f64>,
}

impl SignalParameters {
    /// Create parameters for a bare transmission with no laser attached
    pub fn new(wavelength: f64, bit_rate: f64, power: f64, tx_beamwidth: f64) -> FsoResult<Self> {
        ensure_positive("wavelength", wavelength)?;
        ensure_positive("bit_rate", bit_rate)?;
        ensure_non_negative("power", power)?;
        ensure_non_negative("tx_beamwidth", tx_beamwidth)?;
        Ok(Self {
            wavelength,
            frequency: SPEED_OF_LIGHT / wavelength,
            symbol_period: 1.0 / bit_rate,
            power,
            tx_phy: None,
            tx_antenna: None,
            tx_beamwidth,
            tx_phase_front_radius: 0.0,
            path_loss_db: None,
            rytov_variance: None,
            scintillation_index: None,
            rx_beam_radius: None,
        })
    }

    /// Initial parameters for a transmission from `laser`
    ///
    /// Power starts at the laser's transmit power and the beam geometry is
    /// taken from the laser (radius = half the beam diameter).
    pub fn from_laser(laser: &LaserAntenna, wavelength: f64, bit_rate: f64) -> FsoResult<Self> {
        laser.validate()?;
        let mut params = Self::new(wavelength, bit_rate, laser.tx_power, laser.beam_radius())?;
        params.tx_phase_front_radius = laser.phase_front_radius;
        params.tx_antenna = Some(laser.clone());
        Ok(params)
    }

    /// Builder: set the transmitting PHY
    pub fn with_tx_phy(mut self, phy: PhyId) -> Self {
        self.tx_phy = Some(phy);
        self
    }

    /// Bit rate implied by the symbol period (one bit per OOK symbol)
    pub fn bit_rate(&self) -> f64 {
        1.0 / self.symbol_period
    }

    /// Wave number k = 2π/λ
    pub fn wavenumber(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength
    }

    /// Laser gain in dB, 0 when no laser is attached
    pub fn tx_gain_db(&self) -> f64 {
        self.tx_antenna.as_ref().map_or(0.0, |a| a.gain_db)
    }

    /// Check the invariants every loss model relies on
    pub fn validate(&self) -> FsoResult<()> {
        ensure_positive("wavelength", self.wavelength)?;
        ensure_positive("symbol_period", self.symbol_period)?;
        ensure_non_negative("power", self.power)?;
        ensure_non_negative("tx_beamwidth", self.tx_beamwidth)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_laser() {
        let laser = LaserAntenna::new(0.120, 707_000.0, 0.1, 116.0).unwrap();
        let params = SignalParameters::from_laser(&laser, 847e-9, 49.3724e6).unwrap();

        assert!((params.tx_beamwidth - 0.06).abs() < 1e-12);
        assert_eq!(params.power, 0.1);
        assert_eq!(params.tx_phase_front_radius, 707_000.0);
        assert!((params.frequency - SPEED_OF_LIGHT / 847e-9).abs() < 1.0);
        assert!((params.bit_rate() - 49.3724e6).abs() < 1e-3);
        assert_eq!(params.tx_gain_db(), 116.0);
        assert!(params.scintillation_index.is_none());
    }

    #[test]
    fn test_rejects_invalid_wavelength_and_rate() {
        assert!(SignalParameters::new(0.0, 1e6, 1.0, 0.01).is_err());
        assert!(SignalParameters::new(1550e-9, -1.0, 1.0, 0.01).is_err());

        let mut params = SignalParameters::new(1550e-9, 1e6, 1.0, 0.01).unwrap();
        params.symbol_period = 0.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_power_and_beamwidth() {
        assert!(SignalParameters::new(1550e-9, 1e6, -1.0, 0.01).is_err());
        assert!(SignalParameters::new(1550e-9, 1e6, f64::NAN, 0.01).is_err());
        assert!(SignalParameters::new(1550e-9, 1e6, f64::INFINITY, 0.01).is_err());
        assert!(SignalParameters::new(1550e-9, 1e6, 1.0, -0.01).is_err());
        assert!(SignalParameters::new(1550e-9, 1e6, 0.0, 0.0).is_ok());

        let mut params = SignalParameters::new(1550e-9, 1e6, 1.0, 0.01).unwrap();
        params.power = -0.5;
        assert!(params.validate().is_err());
    }
}
