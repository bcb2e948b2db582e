use super::{Link, PropagationLossModel};
use crate::error::FsoResult;
use crate::math::{db_to_linear, linear_to_db};
use crate::signal::SignalParameters;
use std::f64::consts::PI;
use tracing::info;

/// Free-space path loss in dB: 20·log10(4πd/λ)
pub fn free_space_path_loss_db(distance: f64, wavelength: f64) -> f64 {
    20.0 * (4.0 * PI * distance / wavelength).log10()
}

/// Geometric free-space loss with antenna gains
///
/// Multiplies `power` by 10^((G_tx + G_rx − L_fs)/10). The loss figure is
/// computed in dB and converted to a linear ratio before touching `power`,
/// which stays linear (W) throughout the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeSpaceLoss;

impl FreeSpaceLoss {
    pub fn new() -> Self {
        Self
    }
}

impl PropagationLossModel for FreeSpaceLoss {
    fn name(&self) -> &'static str {
        "free-space-loss"
    }

    fn apply(&self, mut params: SignalParameters, link: &Link<'_>) -> FsoResult<SignalParameters> {
        params.validate()?;
        let distance = link.checked_distance()?;

        let loss_db = free_space_path_loss_db(distance, params.wavelength);
        let tx_gain_db = params.tx_gain_db();
        let rx_gain_db = link.rx_antenna.map_or(0.0, |a| a.rx_gain_db);
        let net_db = tx_gain_db + rx_gain_db - loss_db;

        params.power *= db_to_linear(net_db);
        params.path_loss_db = Some(loss_db);

        info!(
            target: "fso::free_space",
            distance_m = distance,
            loss_db,
            tx_gain_db,
            rx_gain_db,
            rx_power_dbw = linear_to_db(params.power),
            "free-space loss applied"
        );
        Ok(params)
    }
}
