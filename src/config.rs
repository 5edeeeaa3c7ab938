//! Tunable parameters of the simulation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the car-following and lane-changing policy.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoordinationParams {
    /// How far ahead an agent looks for slower agents.
    pub slowdown_distance: f64,
    /// Ticks an agent must wait between lane changes.
    pub lane_change_cooldown: u32,
    /// How much speed an agent regains per tick when nothing limits it.
    pub speed_recovery: f64,
    /// Fraction of the remaining turn an agent's display angle moves each tick.
    pub angle_smoothing: f64,
}

impl Default for CoordinationParams {
    fn default() -> Self {
        Self {
            slowdown_distance: 80.0,
            lane_change_cooldown: 60,
            speed_recovery: 0.02,
            angle_smoothing: 0.05,
        }
    }
}

/// Parameters of a [Simulation](crate::Simulation).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    pub coordination: CoordinationParams,
    /// Agents within this distance of a detonation are destroyed.
    pub blast_radius: f64,
    /// Free space required behind a new agent at the start of its lane.
    pub entrance_clearance: f64,
    /// Space left between a lead agent and the follower spawned behind it.
    pub follow_gap: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            coordination: Default::default(),
            blast_radius: 100.0,
            entrance_clearance: 4.0,
            follow_gap: 8.0,
        }
    }
}
