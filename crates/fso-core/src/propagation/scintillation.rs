use super::{Link, PropagationLossModel};
use crate::error::{ensure_non_negative, FsoError, FsoResult};
use crate::math::simpson;
use crate::signal::SignalParameters;
use tracing::{debug, info};

/// Altitude span above the receiver beyond which Cn² is negligible (m)
const TURBULENCE_CEILING_M: f64 = 50_000.0;

/// Simpson sub-intervals for the altitude integral (10 m steps over the ceiling)
const DEFAULT_INTEGRATION_STEPS: usize = 5_000;

/// Hufnagel-Valley refractive-index structure constant Cn²(h) in m^(-2/3)
///
/// `rms_wind_speed` in m/s, `ground_cn2` (the A parameter) in m^(-2/3),
/// `altitude` in meters above ground.
pub fn hufnagel_valley_cn2(altitude: f64, rms_wind_speed: f64, ground_cn2: f64) -> f64 {
    let h = altitude.max(0.0);
    0.00594 * (rms_wind_speed / 27.0).powi(2) * (1e-5 * h).powi(10) * (-h / 1000.0).exp()
        + 2.7e-16 * (-h / 1500.0).exp()
        + ground_cn2 * (-h / 100.0).exp()
}

/// Scintillation index σ_I² from the Rytov variance σ_R²
///
/// Andrews-Phillips expression valid from weak into strong fluctuations;
/// reduces to σ_I² ≈ σ_R² when σ_R² ≪ 1.
pub fn scintillation_index_from_rytov(rytov: f64) -> f64 {
    let s125 = rytov.powf(6.0 / 5.0);
    let a = 0.49 * rytov / (1.0 + 1.11 * s125).powf(7.0 / 6.0);
    let b = 0.51 * rytov / (1.0 + 0.69 * s125).powf(5.0 / 6.0);
    (a + b).exp() - 1.0
}

/// Turbulence strength along a downlink slant path
///
/// Integrates the Hufnagel-Valley profile from the receiver altitude up to
/// the transmitter and stores the Rytov variance and scintillation index on
/// the signal. `power` is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct DownlinkScintillationIndex {
    rms_wind_speed: f64,
    ground_cn2: f64,
    integration_steps: usize,
}

impl DownlinkScintillationIndex {
    /// `rms_wind_speed` in m/s, `ground_cn2` in m^(-2/3)
    pub fn new(rms_wind_speed: f64, ground_cn2: f64) -> FsoResult<Self> {
        ensure_non_negative("turbulence.rms_wind_speed", rms_wind_speed)?;
        ensure_non_negative("turbulence.ground_cn2", ground_cn2)?;
        Ok(Self {
            rms_wind_speed,
            ground_cn2,
            integration_steps: DEFAULT_INTEGRATION_STEPS,
        })
    }

    /// Textbook HV-5/7 daytime profile (v = 21 m/s, A = 1.7e-14)
    ///
    /// The LEO downlink preset in [`crate::scenario::TurbulenceConfig`]
    /// keeps v = 21 m/s but uses a ten times stronger ground layer
    /// (A = 1.7e-13), so it is not HV-5/7.
    pub fn hv57() -> Self {
        Self {
            rms_wind_speed: 21.0,
            ground_cn2: 1.7e-14,
            integration_steps: DEFAULT_INTEGRATION_STEPS,
        }
    }

    /// Builder: set the number of Simpson sub-intervals
    pub fn with_integration_steps(mut self, steps: usize) -> Self {
        self.integration_steps = steps.max(2);
        self
    }

    pub fn rms_wind_speed(&self) -> f64 {
        self.rms_wind_speed
    }

    pub fn ground_cn2(&self) -> f64 {
        self.ground_cn2
    }

    /// Cn² at `altitude` for this profile
    pub fn cn2(&self, altitude: f64) -> f64 {
        hufnagel_valley_cn2(altitude, self.rms_wind_speed, self.ground_cn2)
    }

    /// Secant of the zenith angle seen from the receiver
    fn sec_zenith(link: &Link<'_>) -> FsoResult<f64> {
        let distance = link.checked_distance()?;
        let rise = link.tx_position.z - link.rx_position.z;
        if rise <= 0.0 {
            return Err(FsoError::InvalidGeometry(format!(
                "downlink transmitter must be above the receiver (tx z = {}, rx z = {})",
                link.tx_position.z, link.rx_position.z
            )));
        }
        Ok(distance / rise)
    }

    /// Rytov variance for a plane wave arriving at the receiver
    ///
    /// σ_R² = 2.25 k^(7/6) sec^(11/6)(ζ) ∫ Cn²(h) (h − h0)^(5/6) dh
    pub fn rytov_variance(&self, wavelength: f64, link: &Link<'_>) -> FsoResult<f64> {
        let sec_zenith = Self::sec_zenith(link)?;
        let k = 2.0 * std::f64::consts::PI / wavelength;
        let h0 = link.rx_position.z;
        let top = link.tx_position.z.min(h0 + TURBULENCE_CEILING_M);

        let integral = simpson(
            |h| self.cn2(h) * (h - h0).max(0.0).powf(5.0 / 6.0),
            h0,
            top,
            self.integration_steps,
        );

        let rytov = 2.25 * k.powf(7.0 / 6.0) * sec_zenith.powf(11.0 / 6.0) * integral;
        debug!(
            target: "fso::scintillation",
            sec_zenith,
            integral,
            rytov,
            "rytov variance"
        );
        Ok(rytov)
    }
}

impl PropagationLossModel for DownlinkScintillationIndex {
    fn name(&self) -> &'static str {
        "scintillation-index"
    }

    fn apply(&self, mut params: SignalParameters, link: &Link<'_>) -> FsoResult<SignalParameters> {
        params.validate()?;
        let rytov = self.rytov_variance(params.wavelength, link)?;
        let index = scintillation_index_from_rytov(rytov);

        params.rytov_variance = Some(rytov);
        params.scintillation_index = Some(index);

        info!(
            target: "fso::scintillation",
            rytov_variance = rytov,
            scintillation_index = index,
            "scintillation index computed"
        );
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3;

    fn downlink() -> Link<'static> {
        Link::new(Vector3::new(0.0, 0.0, 707_000.0), Vector3::new(0.0, 0.0, 0.0))
    }

    fn params() -> SignalParameters {
        SignalParameters::new(847e-9, 49.3724e6, 1.0, 0.06).unwrap()
    }

    #[test]
    fn test_hv_profile_ground_value() {
        let cn2 = hufnagel_valley_cn2(0.0, 21.0, 1.7e-14);
        assert!((cn2 - (1.7e-14 + 2.7e-16)).abs() < 1e-20);
        assert!(hufnagel_valley_cn2(10_000.0, 21.0, 1.7e-14) < cn2);
    }

    #[test]
    fn test_weak_turbulence_limit() {
        let rytov = 1e-4;
        let index = scintillation_index_from_rytov(rytov);
        assert!((index - rytov).abs() / rytov < 1e-3);
        assert_eq!(scintillation_index_from_rytov(0.0), 0.0);
    }

    #[test]
    fn test_scintillation_non_negative() {
        let out = DownlinkScintillationIndex::hv57().apply(params(), &downlink()).unwrap();
        let rytov = out.rytov_variance.unwrap();
        let index = out.scintillation_index.unwrap();
        assert!(rytov > 0.0 && rytov.is_finite());
        assert!(index > 0.0 && index.is_finite());
        assert_eq!(out.power, 1.0);

        let calm = DownlinkScintillationIndex::new(0.0, 0.0).unwrap();
        let out = calm.apply(params(), &downlink()).unwrap();
        assert!(out.scintillation_index.unwrap() >= 0.0);
    }

    #[test]
    fn test_monotonic_in_ground_cn2() {
        let mut last = 0.0;
        for a in [1e-15, 5e-15, 1.7e-14, 5e-14] {
            let model = DownlinkScintillationIndex::new(21.0, a).unwrap();
            let index = model.apply(params(), &downlink()).unwrap().scintillation_index.unwrap();
            assert!(index > last, "A = {a}: {index} <= {last}");
            last = index;
        }
    }

    #[test]
    fn test_monotonic_in_wind_speed() {
        let mut last = 0.0;
        for v in [5.0, 10.0, 21.0, 30.0] {
            let model = DownlinkScintillationIndex::new(v, 1.7e-14).unwrap();
            let index = model.apply(params(), &downlink()).unwrap().scintillation_index.unwrap();
            assert!(index > last, "v = {v}: {index} <= {last}");
            last = index;
        }
    }

    #[test]
    fn test_slant_path_stronger_than_zenith() {
        let model = DownlinkScintillationIndex::hv57();
        let zenith = model.rytov_variance(847e-9, &downlink()).unwrap();
        let slant = Link::new(Vector3::new(500_000.0, 0.0, 500_000.0), Vector3::default());
        let slanted = model.rytov_variance(847e-9, &slant).unwrap();
        assert!(slanted > zenith);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(DownlinkScintillationIndex::new(-1.0, 1e-14).is_err());
        assert!(DownlinkScintillationIndex::new(21.0, -1e-14).is_err());

        let uplink = Link::new(Vector3::default(), Vector3::new(0.0, 0.0, 707_000.0));
        let err = DownlinkScintillationIndex::hv57().apply(params(), &uplink).unwrap_err();
        assert!(matches!(err, FsoError::InvalidGeometry(_)));

        let horizontal = Link::new(Vector3::new(1000.0, 0.0, 0.0), Vector3::default());
        assert!(DownlinkScintillationIndex::hv57().apply(params(), &horizontal).is_err());
    }
}
