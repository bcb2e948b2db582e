//! Position providers
//!
//! Loss models and the delay model only ever ask a PHY "where are you now";
//! the [`MobilityModel`] trait is that contract.

use crate::types::{SimTime, Vector3};
use std::fmt::Debug;

/// Source of a node's position at a given simulated time
pub trait MobilityModel: Debug {
    /// Position in meters at simulated time `now`
    fn position(&self, now: SimTime) -> Vector3;
}

/// A node that never moves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPosition {
    position: Vector3,
}

impl ConstantPosition {
    pub fn new(position: Vector3) -> Self {
        Self { position }
    }

    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
    }
}

impl MobilityModel for ConstantPosition {
    fn position(&self, _now: SimTime) -> Vector3 {
        self.position
    }
}

/// Straight-line motion from an initial position at time zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantVelocity {
    origin: Vector3,
    /// Velocity (m/s)
    velocity: Vector3,
}

impl ConstantVelocity {
    pub fn new(origin: Vector3, velocity: Vector3) -> Self {
        Self { origin, velocity }
    }
}

impl MobilityModel for ConstantVelocity {
    fn position(&self, now: SimTime) -> Vector3 {
        self.origin + self.velocity.scale(now.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_position() {
        let mut m = ConstantPosition::new(Vector3::new(0.0, 0.0, 707_000.0));
        assert_eq!(m.position(SimTime::from_nanos(12345)).z, 707_000.0);
        m.set_position(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(m.position(SimTime::ZERO), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_constant_velocity() {
        let m = ConstantVelocity::new(Vector3::new(0.0, 0.0, 1000.0), Vector3::new(7500.0, 0.0, 0.0));
        let p = m.position(SimTime::from_secs_f64(2.0));
        assert!((p.x - 15_000.0).abs() < 1e-6);
        assert_eq!(p.z, 1000.0);
    }
}
