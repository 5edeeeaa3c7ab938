#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What an agent is carrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PayloadKind {
    Candy,
    Poison,
}

/// The kind of agent, which decides what it is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Behavior {
    /// An ordinary vehicle.
    Plain,
    /// A vehicle carrying a payload.
    Carrying(PayloadKind),
    /// A vehicle that explodes once its fuse runs out.
    TimedExplosive { remaining_ticks: u32 },
}

/// What a [Behavior] permits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether the agent overtakes slower agents by changing lanes.
    pub changes_lanes: bool,
    pub carries_payload: bool,
    /// Whether the agent can detonate.
    pub detonates: bool,
}

impl Behavior {
    /// Looks up the capabilities of this kind of agent.
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            Behavior::Plain => Capabilities {
                changes_lanes: true,
                carries_payload: false,
                detonates: false,
            },
            Behavior::Carrying(_) => Capabilities {
                changes_lanes: true,
                carries_payload: true,
                detonates: false,
            },
            Behavior::TimedExplosive { .. } => Capabilities {
                changes_lanes: false,
                carries_payload: false,
                detonates: true,
            },
        }
    }

    /// Advances any timers, returning `true` when the agent detonates.
    pub(crate) fn tick(&mut self) -> bool {
        match self {
            Behavior::TimedExplosive { remaining_ticks } => {
                *remaining_ticks = remaining_ticks.saturating_sub(1);
                *remaining_ticks == 0
            }
            _ => false,
        }
    }
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Plain
    }
}
