//! Timed spawning of agents at the start of a lane.

use crate::agent::{AgentAttributes, Behavior, PayloadKind};
use crate::{AgentId, AgentSet, RoadId};
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How many ticks pass between spawns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpawnTimer {
    /// A constant interval.
    Fixed(u32),
    /// An interval drawn uniformly from `min..max` after every spawn.
    Random { min: u32, max: u32 },
}

impl SpawnTimer {
    fn reload(&self, rng: &mut impl Rng) -> u32 {
        let ticks = match *self {
            SpawnTimer::Fixed(ticks) => ticks,
            SpawnTimer::Random { min, max } if max > min => rng.gen_range(min..max),
            SpawnTimer::Random { min, .. } => min,
        };
        ticks.max(1)
    }
}

/// The agent spawned behind each lead agent.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FollowerAttributes {
    pub agent: AgentAttributes,
    /// Probability that the follower is a timed explosive.
    pub explosive_chance: f64,
    /// Probability that a carried payload is poison rather than candy.
    pub poison_chance: f64,
}

impl Default for FollowerAttributes {
    fn default() -> Self {
        Self {
            agent: AgentAttributes::default(),
            explosive_chance: 0.2,
            poison_chance: 0.5,
        }
    }
}

impl FollowerAttributes {
    /// Picks the follower's behavior.
    ///
    /// An explosive's fuse is drawn from the time it takes to drive the whole lane.
    pub(crate) fn roll_behavior(&self, rng: &mut impl Rng, lane_ticks: f64) -> Behavior {
        if rng.gen_bool(self.explosive_chance.clamp(0.0, 1.0)) {
            let max_fuse = (lane_ticks.max(1.0) as u32).max(1);
            Behavior::TimedExplosive {
                remaining_ticks: rng.gen_range(1..=max_fuse),
            }
        } else if rng.gen_bool(self.poison_chance.clamp(0.0, 1.0)) {
            Behavior::Carrying(PayloadKind::Poison)
        } else {
            Behavior::Carrying(PayloadKind::Candy)
        }
    }
}

/// The attributes of a lane spawner.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpawnerAttributes {
    pub timer: SpawnTimer,
    /// How many agents to spawn, or `None` to keep spawning.
    pub count: Option<u32>,
    /// The lead agent.
    pub agent: AgentAttributes,
    /// The agent spawned behind each lead, if any.
    pub follower: Option<FollowerAttributes>,
}

impl Default for SpawnerAttributes {
    fn default() -> Self {
        Self {
            timer: SpawnTimer::Random { min: 120, max: 480 },
            count: None,
            agent: AgentAttributes::default(),
            follower: None,
        }
    }
}

/// Spawns agents at the start of one lane on a timer.
#[derive(Clone, Debug)]
pub struct LaneSpawner {
    road: RoadId,
    lane: usize,
    attributes: SpawnerAttributes,
    /// Ticks until the next spawn.
    countdown: u32,
    spawned: u32,
}

impl LaneSpawner {
    pub(crate) fn new(
        road: RoadId,
        lane: usize,
        attributes: SpawnerAttributes,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            road,
            lane,
            attributes,
            countdown: attributes.timer.reload(rng),
            spawned: 0,
        }
    }

    pub fn road_id(&self) -> RoadId {
        self.road
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn attributes(&self) -> &SpawnerAttributes {
        &self.attributes
    }

    /// Ticks until the next spawn is due.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// The number of agents spawned so far.
    pub fn spawned(&self) -> u32 {
        self.spawned
    }

    /// Whether the spawner has spawned all of its agents.
    pub fn is_exhausted(&self) -> bool {
        self.attributes
            .count
            .map_or(false, |count| self.spawned >= count)
    }

    /// Counts down one tick, returning `true` when a spawn is due.
    ///
    /// A due spawn stays due until [Self::fired] is called.
    pub(crate) fn tick(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.countdown = self.countdown.saturating_sub(1);
        self.countdown == 0
    }

    /// Records a spawn and restarts the timer.
    pub(crate) fn fired(&mut self, rng: &mut impl Rng) {
        self.spawned += 1;
        self.countdown = self.attributes.timer.reload(rng);
    }

    /// Restarts the timer without recording a spawn.
    pub(crate) fn skip(&mut self, rng: &mut impl Rng) {
        self.countdown = self.attributes.timer.reload(rng);
    }
}

/// The progress of a [FollowSpawn].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowState {
    /// Waiting for the lead agent to clear the lane entrance.
    WaitingForLead { lead: AgentId },
    Spawned(AgentId),
    /// The lead agent disappeared first.
    Cancelled,
}

/// An agent that will be spawned behind a lead agent once it has room.
#[derive(Clone, Debug)]
pub struct FollowSpawn {
    road: RoadId,
    attributes: FollowerAttributes,
    state: FollowState,
}

impl FollowSpawn {
    pub(crate) fn new(road: RoadId, lead: AgentId, attributes: FollowerAttributes) -> Self {
        Self {
            road,
            attributes,
            state: FollowState::WaitingForLead { lead },
        }
    }

    pub fn road_id(&self) -> RoadId {
        self.road
    }

    pub fn attributes(&self) -> &FollowerAttributes {
        &self.attributes
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, FollowState::WaitingForLead { .. })
    }

    /// Checks on the lead agent, returning the lane to spawn into once it has moved
    /// `gap` units beyond its own length.
    ///
    /// Cancels if the lead agent is gone or no longer active.
    pub(crate) fn poll(&mut self, agents: &AgentSet, gap: f64) -> Option<usize> {
        let lead = match self.state {
            FollowState::WaitingForLead { lead } => lead,
            _ => return None,
        };
        match agents.get(lead) {
            Some(agent) if agent.state().is_active() => {
                (agent.distance() >= agent.length() + gap).then(|| agent.lane())
            }
            _ => {
                log::debug!("lead agent {:?} is gone, cancelling follower", lead);
                self.state = FollowState::Cancelled;
                None
            }
        }
    }

    pub(crate) fn set_spawned(&mut self, id: AgentId) {
        self.state = FollowState::Spawned(id);
    }

    pub(crate) fn cancel(&mut self) {
        self.state = FollowState::Cancelled;
    }
}
