use crate::error::{ensure_positive, FsoResult};
use crate::types::{SimTime, Vector3, SPEED_OF_LIGHT};
use std::fmt::Debug;

/// One-way propagation delay between two positions
pub trait PropagationDelayModel: Debug {
    fn delay(&self, tx: &Vector3, rx: &Vector3) -> SimTime;
}

/// Delay = distance / constant wave speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSpeedPropagationDelay {
    speed: f64,
}

impl Default for ConstantSpeedPropagationDelay {
    fn default() -> Self {
        Self { speed: SPEED_OF_LIGHT }
    }
}

impl ConstantSpeedPropagationDelay {
    /// Delay model with a custom wave speed (m/s)
    pub fn new(speed: f64) -> FsoResult<Self> {
        ensure_positive("delay.speed", speed)?;
        Ok(Self { speed })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl PropagationDelayModel for ConstantSpeedPropagationDelay {
    fn delay(&self, tx: &Vector3, rx: &Vector3) -> SimTime {
        SimTime::from_secs_f64(tx.distance_to(rx) / self.speed)
    }
}
