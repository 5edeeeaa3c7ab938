use crate::agent::{AgentAttributes, AgentSnapshot, AgentState, Behavior, TickStatus, TrafficAgent};
use crate::config::SimulationConfig;
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::error::{Error, Result};
use crate::math::Point2d;
use crate::road::{Road, RoadAttributes};
use crate::spawner::{FollowSpawn, LaneSpawner, SpawnerAttributes};
use crate::{AgentId, AgentSet, RoadId, RoadSet};
use cgmath::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use slotmap::SecondaryMap;

/// Something that happened to an agent during a step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AgentEvent {
    /// The agent reached the end of its lane.
    Arrived { agent: AgentId },
    /// The agent drove into `other`. Both are removed.
    Collided { agent: AgentId, other: AgentId },
    Detonated { agent: AgentId, position: Point2d },
    /// The agent was caught in a blast.
    Destroyed { agent: AgentId },
}

/// A traffic simulation over a set of drawn roads.
pub struct Simulation {
    /// The roads, finished or still being drawn.
    roads: RoadSet,
    /// The agents being simulated.
    agents: AgentSet,
    spawners: Vec<LaneSpawner>,
    /// Agents waiting to be spawned behind a lead agent.
    follow_ups: Vec<FollowSpawn>,
    /// What each agent looked like most recently, as seen by the others.
    snapshots: SecondaryMap<AgentId, AgentSnapshot>,
    config: SimulationConfig,
    /// Global factor applied to every agent's target speed.
    speed_factor: f64,
    /// The current frame of simulation.
    frame: usize,
    rng: StdRng,
    /// Events from the previously simulated frame.
    events: Vec<AgentEvent>,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::with_rng(SimulationConfig::default(), StdRng::from_entropy())
    }
}

impl Simulation {
    /// Creates a new simulation.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new simulation with the given configuration.
    pub fn with_config(config: SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a new simulation whose random choices are determined by `seed`.
    pub fn with_seed(config: SimulationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulationConfig, rng: StdRng) -> Self {
        Self {
            roads: Default::default(),
            agents: Default::default(),
            spawners: vec![],
            follow_ups: vec![],
            snapshots: Default::default(),
            config,
            speed_factor: 1.0,
            frame: 0,
            rng,
            events: vec![],
            #[cfg(feature = "debug")]
            debug: Default::default(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Adds an empty road to be drawn with [Self::add_road_point].
    pub fn add_road(&mut self, attributes: &RoadAttributes) -> Result<RoadId> {
        let road = Road::new(attributes)?;
        Ok(self.roads.insert(road))
    }

    /// Extends a road that is being drawn.
    pub fn add_road_point(&mut self, road_id: RoadId, point: Point2d) -> Result<()> {
        self.road_mut(road_id)?.add_point(point)
    }

    /// Finishes drawing a road so that agents can use it.
    pub fn finish_road(&mut self, road_id: RoadId) -> Result<()> {
        self.road_mut(road_id)?.finish()
    }

    /// Removes a road along with its agents and spawners.
    pub fn remove_road(&mut self, road_id: RoadId) -> Result<Road> {
        let road = self.roads.remove(road_id).ok_or(Error::UnknownRoad)?;
        self.agents.retain(|_, agent| agent.road_id() != road_id);
        let agents = &self.agents;
        self.snapshots.retain(|id, _| agents.contains_key(id));
        self.spawners.retain(|s| s.road_id() != road_id);
        self.follow_ups.retain(|f| f.road_id() != road_id);
        Ok(road)
    }

    /// Adds an agent at the start of a lane.
    pub fn add_agent(
        &mut self,
        road_id: RoadId,
        lane: usize,
        attributes: &AgentAttributes,
        behavior: Behavior,
    ) -> Result<AgentId> {
        self.add_agent_at(road_id, lane, 0.0, attributes, behavior)
    }

    /// Adds an agent `distance` units along a lane.
    pub fn add_agent_at(
        &mut self,
        road_id: RoadId,
        lane: usize,
        distance: f64,
        attributes: &AgentAttributes,
        behavior: Behavior,
    ) -> Result<AgentId> {
        let road = self.roads.get(road_id).ok_or(Error::UnknownRoad)?;
        if !road.is_finished() {
            return Err(Error::RoadInProgress);
        }
        let mut agent = TrafficAgent::new(road_id, road, lane, distance, attributes, behavior)?;
        agent.set_speed_factor(self.speed_factor);
        let id = self.agents.insert_with_key(|id| agent.with_id(id));
        self.snapshots.insert(id, self.agents[id].snapshot());
        Ok(id)
    }

    /// Removes an agent from the simulation.
    pub fn remove_agent(&mut self, agent_id: AgentId) -> Option<TrafficAgent> {
        self.snapshots.remove(agent_id);
        self.agents.remove(agent_id)
    }

    /// Adds a spawner at the start of a lane. The road must be finished.
    pub fn add_lane_spawner(
        &mut self,
        road_id: RoadId,
        lane: usize,
        attributes: SpawnerAttributes,
    ) -> Result<()> {
        let road = self.roads.get(road_id).ok_or(Error::UnknownRoad)?;
        if !road.is_finished() {
            return Err(Error::RoadInProgress);
        }
        road.lanes().lane(lane)?;
        let spawner = LaneSpawner::new(road_id, lane, attributes, &mut self.rng);
        self.spawners.push(spawner);
        Ok(())
    }

    /// Scales the target speed of every agent, including ones spawned later.
    pub fn set_speed_factor(&mut self, factor: f64) {
        log::debug!("speed factor set to {}", factor);
        self.speed_factor = factor;
        for agent in self.agents.values_mut() {
            agent.set_speed_factor(factor);
        }
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    /// Randomly assigns a target speed adjustment factor to each agent,
    /// which is sampled from a normal distribution with a mean of 1 (no adjustment)
    /// and standard deviation of `stddev`.
    pub fn randomise_target_speeds(&mut self, stddev: f64) -> Result<()> {
        let distr = rand_distr::Normal::new(1.0, stddev)
            .map_err(|err| Error::invalid(format!("invalid standard deviation: {}", err)))?;
        for agent in self.agents.values_mut() {
            let factor = distr.sample(&mut self.rng).clamp(0.75, 1.25);
            agent.set_speed_adjust(factor);
        }
        Ok(())
    }

    /// Advances the simulation by one tick, returning what happened to the agents.
    ///
    /// Followers are spawned before lane spawners, so a due follower claims the lane
    /// entrance first.
    pub fn step(&mut self) -> &[AgentEvent] {
        self.events.clear();
        self.run_follow_ups();
        self.run_spawners();
        self.advance_agents();
        self.sweep();
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }

        &self.events
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The events from the previously simulated frame.
    pub fn events(&self) -> &[AgentEvent] {
        &self.events
    }

    /// Returns an iterator over all the roads in the simulation.
    pub fn iter_roads(&self) -> impl Iterator<Item = (RoadId, &Road)> {
        self.roads.iter()
    }

    /// Returns an iterator over all the agents in the simulation.
    pub fn iter_agents(&self) -> impl Iterator<Item = &TrafficAgent> {
        self.agents.values()
    }

    pub fn iter_spawners(&self) -> impl Iterator<Item = &LaneSpawner> {
        self.spawners.iter()
    }

    /// Returns an iterator over the followers still waiting to be spawned.
    pub fn iter_follow_ups(&self) -> impl Iterator<Item = &FollowSpawn> {
        self.follow_ups.iter()
    }

    /// Gets a reference to the road with the given ID.
    pub fn get_road(&self, road_id: RoadId) -> Option<&Road> {
        self.roads.get(road_id)
    }

    /// Gets a reference to the agent with the given ID.
    pub fn get_agent(&self, agent_id: AgentId) -> Option<&TrafficAgent> {
        self.agents.get(agent_id)
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }

    fn road_mut(&mut self, road_id: RoadId) -> Result<&mut Road> {
        self.roads.get_mut(road_id).ok_or(Error::UnknownRoad)
    }

    /// Whether the start of a lane has room for an agent of the given length.
    fn entrance_clear(&self, road_id: RoadId, lane: usize, length: f64) -> bool {
        let clearance = length + self.config.entrance_clearance;
        !self.agents.values().any(|agent| {
            agent.state().is_active()
                && agent.road_id() == road_id
                && agent.lane() == lane
                && agent.distance() < clearance
        })
    }

    /// Counts down the spawners and spawns the agents that are due.
    fn run_spawners(&mut self) {
        let mut due = vec![];
        for (idx, spawner) in self.spawners.iter_mut().enumerate() {
            if spawner.tick() {
                due.push(idx);
            }
        }

        for idx in due {
            let (road_id, lane) = (self.spawners[idx].road_id(), self.spawners[idx].lane());
            let attributes = *self.spawners[idx].attributes();
            if !self.entrance_clear(road_id, lane, attributes.agent.length) {
                continue;
            }
            match self.add_agent(road_id, lane, &attributes.agent, Behavior::Plain) {
                Ok(lead) => {
                    log::debug!("spawned agent {:?} on lane {}", lead, lane);
                    self.spawners[idx].fired(&mut self.rng);
                    if let Some(follower) = attributes.follower {
                        self.follow_ups.push(FollowSpawn::new(road_id, lead, follower));
                    }
                }
                Err(err) => {
                    log::warn!("could not spawn on lane {}: {}", lane, err);
                    self.spawners[idx].skip(&mut self.rng);
                }
            }
        }

        self.spawners.retain(|s| !s.is_exhausted());
    }

    /// Spawns followers whose lead agent has moved far enough along.
    ///
    /// A follower whose lane entrance is occupied keeps waiting and retries next tick.
    fn run_follow_ups(&mut self) {
        let gap = self.config.follow_gap;
        let mut ready = vec![];
        for (idx, follow) in self.follow_ups.iter_mut().enumerate() {
            if let Some(lane) = follow.poll(&self.agents, gap) {
                ready.push((idx, lane));
            }
        }

        for (idx, lane) in ready {
            let road_id = self.follow_ups[idx].road_id();
            let attributes = *self.follow_ups[idx].attributes();
            if !self.entrance_clear(road_id, lane, attributes.agent.length) {
                log::trace!("follower on lane {} is waiting for the entrance", lane);
                continue;
            }
            let lane_ticks = match self.roads.get(road_id) {
                Some(road) => road.lane_length(lane).unwrap_or(0.0) / attributes.agent.speed.max(1e-9),
                None => 0.0,
            };
            let behavior = attributes.roll_behavior(&mut self.rng, lane_ticks);
            match self.add_agent(road_id, lane, &attributes.agent, behavior) {
                Ok(id) => {
                    log::debug!("spawned follower {:?} as {:?}", id, behavior);
                    self.follow_ups[idx].set_spawned(id);
                }
                Err(err) => {
                    log::warn!("could not spawn follower: {}", err);
                    self.follow_ups[idx].cancel();
                }
            }
        }

        self.follow_ups.retain(FollowSpawn::is_waiting);
    }

    /// Runs one tick of every active agent, then applies collisions and blasts.
    fn advance_agents(&mut self) {
        self.snapshots = self
            .agents
            .iter()
            .map(|(id, agent)| (id, agent.snapshot()))
            .collect();

        let mut collisions = vec![];
        let mut detonations = vec![];

        for (id, agent) in &mut self.agents {
            if !agent.state().is_active() {
                continue;
            }
            let road = match self.roads.get(agent.road_id()) {
                Some(road) => road,
                None => {
                    agent.set_state(AgentState::Removed);
                    continue;
                }
            };
            let status = agent.advance_one_tick(road, &self.snapshots, &self.config.coordination);
            self.snapshots.insert(id, agent.snapshot());

            match status {
                TickStatus::Continuing => {}
                TickStatus::ReachedEnd => self.events.push(AgentEvent::Arrived { agent: id }),
                TickStatus::Collided { other } => collisions.push((id, other)),
                TickStatus::Detonated => detonations.push((id, agent.road_id(), agent.position())),
            }
        }

        for (id, other) in collisions {
            log::debug!("agent {:?} collided with {:?}", id, other);
            if let Some(agent) = self.agents.get_mut(other) {
                if agent.state().is_active() {
                    agent.set_state(AgentState::Collided);
                }
            }
            self.events.push(AgentEvent::Collided { agent: id, other });
        }

        for (id, road_id, position) in detonations {
            log::debug!("agent {:?} detonated at {:?}", id, position);
            crate::debug::debug_circle("blast", position, self.config.blast_radius);
            self.events.push(AgentEvent::Detonated { agent: id, position });
            for (other_id, agent) in &mut self.agents {
                if agent.state().is_active()
                    && agent.road_id() == road_id
                    && agent.position().distance(position) <= self.config.blast_radius
                {
                    agent.set_state(AgentState::Destroyed);
                    self.events.push(AgentEvent::Destroyed { agent: other_id });
                }
            }
        }
    }

    /// Removes every agent that is no longer active.
    fn sweep(&mut self) {
        self.agents.retain(|_, agent| agent.state().is_active());
        let agents = &self.agents;
        self.snapshots.retain(|id, _| agents.contains_key(id));
    }
}
