use super::{Link, PropagationLossModel};
use crate::error::{ensure_positive, FsoResult};
use crate::signal::SignalParameters;
use std::f64::consts::PI;
use tracing::{debug, info};

/// Gaussian beam radius after propagating `distance` meters
///
/// With W0 the transmit beam radius, F0 the phase-front radius (0 for a
/// collimated beam) and k the wave number:
///
/// ```text
/// Θ0 = 1 − L/F0      Λ0 = 2L / (k·W0²)      W = W0·sqrt(Θ0² + Λ0²)
/// ```
pub fn gaussian_beam_radius(w0: f64, phase_front_radius: f64, wavenumber: f64, distance: f64) -> f64 {
    let theta0 = if phase_front_radius == 0.0 {
        1.0
    } else {
        1.0 - distance / phase_front_radius
    };
    let lambda0 = 2.0 * distance / (wavenumber * w0 * w0);
    w0 * (theta0 * theta0 + lambda0 * lambda0).sqrt()
}

/// On-axis mean irradiance after beam spreading
///
/// Replaces `power` (W) with the mean irradiance (W/m²) at the receiver:
/// `2P / (πW²)` scaled by the fraction of the Gaussian beam captured by the
/// receiver aperture, `1 − exp(−2a²/W²)`. Without a receive antenna the
/// capture fraction is 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanIrradiance;

impl MeanIrradiance {
    pub fn new() -> Self {
        Self
    }
}

impl PropagationLossModel for MeanIrradiance {
    fn name(&self) -> &'static str {
        "mean-irradiance"
    }

    fn apply(&self, mut params: SignalParameters, link: &Link<'_>) -> FsoResult<SignalParameters> {
        params.validate()?;
        let distance = link.checked_distance()?;
        let w0 = ensure_positive("tx_beamwidth", params.tx_beamwidth)?;

        let w = gaussian_beam_radius(w0, params.tx_phase_front_radius, params.wavenumber(), distance);
        let peak = 2.0 * params.power / (PI * w * w);
        let capture = link.rx_antenna.map_or(1.0, |a| {
            let radius = a.aperture_radius();
            1.0 - (-2.0 * radius * radius / (w * w)).exp()
        });

        debug!(
            target: "fso::mean_irradiance",
            w0,
            rx_beam_radius = w,
            peak_irradiance = peak,
            capture_fraction = capture,
            "beam spreading"
        );

        params.power = peak * capture;
        params.rx_beam_radius = Some(w);

        info!(
            target: "fso::mean_irradiance",
            mean_irradiance = params.power,
            "mean irradiance computed"
        );
        Ok(params)
    }
}
