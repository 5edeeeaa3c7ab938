pub use self::behavior::{Behavior, Capabilities, PayloadKind};
pub use self::speed::SpeedModel;
use crate::config::CoordinationParams;
use crate::error::Result;
use crate::math::{heading_angle, project_local, rot90, try_normalize, Point2d, Vector2d};
use crate::road::Road;
use crate::tracer::ArcLengthTracer;
use crate::util::{wrap_angle, Interval};
use crate::{AgentId, RoadId};
use arrayvec::ArrayVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::{Key, SecondaryMap};

mod behavior;
mod speed;

/// A simulated vehicle following one lane of a road.
#[derive(Clone, Debug)]
pub struct TrafficAgent {
    /// The agent's ID
    id: AgentId,
    /// The road the agent is on.
    road: RoadId,
    /// The lane the agent is in.
    lane: usize,
    /// The agent's position along its lane.
    tracer: ArcLengthTracer,
    /// Distance travelled along the current lane.
    distance: f64,
    speed: SpeedModel,
    length: f64,
    width: f64,
    /// The slower agent ahead this agent is matching speed with.
    limiting: Option<AgentId>,
    /// Ticks until the agent may change lanes again.
    lc_cooldown: u32,
    /// The world space coordinates of the front of the agent.
    position: Point2d,
    /// Unit vector along the lane at the agent's position.
    heading: Vector2d,
    /// The smoothed display angle in radians.
    angle: f64,
    behavior: Behavior,
    state: AgentState,
}

/// The attributes of a simulated agent.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentAttributes {
    /// The agent's length, measured back from its front.
    pub length: f64,
    pub width: f64,
    /// The distance the agent covers per tick when unobstructed.
    pub speed: f64,
}

impl Default for AgentAttributes {
    fn default() -> Self {
        Self {
            length: 48.0,
            width: 32.0,
            speed: 1.0,
        }
    }
}

/// The lifecycle of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AgentState {
    Active,
    /// Reached the end of its lane.
    Arrived,
    Collided,
    /// Caught in a blast.
    Destroyed,
    Detonated,
    /// Removed along with its road.
    Removed,
}

impl AgentState {
    pub fn is_active(self) -> bool {
        self == AgentState::Active
    }
}

/// The outcome of [TrafficAgent::advance_one_tick].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickStatus {
    Continuing,
    ReachedEnd,
    Collided { other: AgentId },
    Detonated,
}

/// What other agents can see of an agent during a tick.
#[derive(Clone, Copy, Debug)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub road: RoadId,
    pub lane: usize,
    pub distance: f64,
    pub speed: f64,
    pub position: Point2d,
    pub heading: Vector2d,
    pub length: f64,
    pub width: f64,
    pub active: bool,
}

impl AgentSnapshot {
    /// Whether a point lies within the agent's footprint.
    ///
    /// The footprint is a rectangle with its front edge centred on the agent's
    /// position, extending `length` units back along its heading.
    pub fn contains(&self, point: Point2d) -> bool {
        let local = project_local(point, self.position, self.heading, rot90(self.heading));
        Interval::new(-self.length, 0.0).contains(local.x)
            && Interval::disc(0.0, 0.5 * self.width).contains(local.y)
    }

    fn is_traffic_on(&self, road: RoadId, lane: usize) -> bool {
        self.active && self.road == road && self.lane == lane
    }
}

impl TrafficAgent {
    /// Creates a new agent `distance` units along a lane.
    ///
    /// The agent has a null ID until it is given one with [Self::with_id].
    pub(crate) fn new(
        road_id: RoadId,
        road: &Road,
        lane: usize,
        distance: f64,
        attributes: &AgentAttributes,
        behavior: Behavior,
    ) -> Result<Self> {
        let tracer = road.tracer_for(lane, distance)?;
        let heading = tracer.heading().unwrap_or_else(Vector2d::unit_x);
        Ok(Self {
            id: AgentId::null(),
            road: road_id,
            lane,
            distance: tracer.travelled(),
            position: tracer.current_point(),
            tracer,
            speed: SpeedModel::new(attributes.speed),
            length: attributes.length,
            width: attributes.width,
            limiting: None,
            lc_cooldown: 0,
            heading,
            angle: heading_angle(heading),
            behavior,
            state: AgentState::Active,
        })
    }

    pub(crate) fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }

    /// Gets the agent's ID.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The ID of the road the agent is on.
    pub fn road_id(&self) -> RoadId {
        self.road
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Distance travelled along the current lane.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// The current speed, in units per tick.
    pub fn speed(&self) -> f64 {
        self.speed.speed()
    }

    pub fn target_speed(&self) -> f64 {
        self.speed.target()
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// The world space coordinates of the front of the agent.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// Unit vector along the lane at the agent's position.
    pub fn heading(&self) -> Vector2d {
        self.heading
    }

    /// The display angle, which eases towards the direction of travel.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// The agent this one is currently matching speed with.
    pub fn limiting_agent(&self) -> Option<AgentId> {
        self.limiting
    }

    /// Ticks until the agent may change lanes again.
    pub fn lane_change_cooldown(&self) -> u32 {
        self.lc_cooldown
    }

    /// Set the per-agent target speed adjustment factor.
    pub fn set_speed_adjust(&mut self, adjust: f64) {
        self.speed.set_adjust(adjust);
    }

    /// Set the global target speed factor.
    pub fn set_speed_factor(&mut self, factor: f64) {
        self.speed.set_factor(factor);
    }

    pub(crate) fn set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    /// What other agents can see of this one.
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            road: self.road,
            lane: self.lane,
            distance: self.distance,
            speed: self.speed.speed(),
            position: self.position,
            heading: self.heading,
            length: self.length,
            width: self.width,
            active: self.state.is_active(),
        }
    }

    /// Runs one tick of movement and coordination.
    ///
    /// `others` may hold this tick's or the previous tick's state for any agent;
    /// this agent's own entry is ignored.
    pub fn advance_one_tick(
        &mut self,
        road: &Road,
        others: &SecondaryMap<AgentId, AgentSnapshot>,
        params: &CoordinationParams,
    ) -> TickStatus {
        if !self.state.is_active() {
            return TickStatus::Continuing;
        }
        self.lc_cooldown = self.lc_cooldown.saturating_sub(1);

        self.move_along(params.angle_smoothing);
        if self.tracer.is_done() {
            self.state = AgentState::Arrived;
            return TickStatus::ReachedEnd;
        }

        if self.behavior.tick() {
            self.state = AgentState::Detonated;
            return TickStatus::Detonated;
        }

        if !self.limiter_is_valid(others, params) {
            let limiting = self.find_limiting(others, params);
            if limiting != self.limiting {
                log::trace!("agent {:?} now limited by {:?}", self.id, limiting);
            }
            self.limiting = limiting;
        }

        self.speed.recover(params.speed_recovery);
        if let Some(limiter) = self.limiting.and_then(|id| others.get(id)) {
            self.speed.clamp_to(limiter.speed);
        }

        if let Some(other) = self.find_collision(others) {
            self.state = AgentState::Collided;
            return TickStatus::Collided { other };
        }

        if self.limiting.is_some()
            && self.lc_cooldown == 0
            && self.behavior.capabilities().changes_lanes
        {
            self.try_change_lane(road, others, params);
        }

        TickStatus::Continuing
    }

    /// Advances along the lane by the current speed.
    fn move_along(&mut self, smoothing: f64) {
        self.tracer.advance(self.speed.speed());
        self.distance = self.tracer.travelled();

        let new_pos = self.tracer.current_point();
        if let Some(dir) = try_normalize(new_pos - self.position) {
            let turn = wrap_angle(heading_angle(dir) - self.angle);
            self.angle = wrap_angle(self.angle + smoothing * turn);
        }
        self.position = new_pos;
        if let Some(heading) = self.tracer.heading() {
            self.heading = heading;
        }
    }

    /// Whether the current limiting agent is still ahead in the same lane and close enough.
    fn limiter_is_valid(
        &self,
        others: &SecondaryMap<AgentId, AgentSnapshot>,
        params: &CoordinationParams,
    ) -> bool {
        match self.limiting.and_then(|id| others.get(id)) {
            Some(other) => {
                let gap = other.distance - self.distance;
                other.is_traffic_on(self.road, self.lane)
                    && gap > 0.0
                    && gap <= params.slowdown_distance
            }
            None => false,
        }
    }

    /// Finds the closest slower agent ahead in the same lane, within the slowdown distance.
    fn find_limiting(
        &self,
        others: &SecondaryMap<AgentId, AgentSnapshot>,
        params: &CoordinationParams,
    ) -> Option<AgentId> {
        let target = self.speed.target();
        others
            .values()
            .filter(|other| other.id != self.id && other.is_traffic_on(self.road, self.lane))
            .filter(|other| {
                let gap = other.distance - self.distance;
                gap > 0.0 && gap <= params.slowdown_distance && other.speed < target
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .map(|other| other.id)
    }

    /// Finds an agent whose footprint contains this agent's front.
    fn find_collision(&self, others: &SecondaryMap<AgentId, AgentSnapshot>) -> Option<AgentId> {
        others
            .values()
            .filter(|other| other.id != self.id && other.active && other.road == self.road)
            .find(|other| other.contains(self.position))
            .map(|other| other.id)
    }

    /// Moves to the first free adjacent lane.
    ///
    /// The lower-indexed lane, which lies to the right of travel, is tried first.
    fn try_change_lane(
        &mut self,
        road: &Road,
        others: &SecondaryMap<AgentId, AgentSnapshot>,
        params: &CoordinationParams,
    ) -> bool {
        let mut candidates = ArrayVec::<usize, 2>::new();
        if self.lane > 0 {
            candidates.push(self.lane - 1);
        }
        if self.lane + 1 < road.lane_count() {
            candidates.push(self.lane + 1);
        }

        for lane in candidates {
            let distance = match road.adjacent_distance(self.lane, self.distance, lane) {
                Ok(Some(distance)) => distance,
                _ => continue,
            };
            let window = Interval::new(distance - self.length, distance + params.slowdown_distance);
            let blocked = others.values().any(|other| {
                other.id != self.id
                    && other.is_traffic_on(self.road, lane)
                    && window.contains(other.distance)
            });
            if blocked {
                continue;
            }
            let tracer = match road.tracer_for(lane, distance) {
                Ok(tracer) => tracer,
                Err(_) => continue,
            };

            log::debug!(
                "agent {:?} changes from lane {} to lane {} at {:.1}",
                self.id,
                self.lane,
                lane,
                distance
            );
            crate::debug::debug_line("lane change", self.position, tracer.current_point());

            self.lane = lane;
            self.distance = tracer.travelled();
            self.position = tracer.current_point();
            if let Some(heading) = tracer.heading() {
                self.heading = heading;
            }
            self.tracer = tracer;
            self.limiting = None;
            self.lc_cooldown = params.lane_change_cooldown;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::road::RoadAttributes;
    use slotmap::SlotMap;

    fn straight_road(lane_count: usize) -> Road {
        let mut road = Road::new(&RoadAttributes {
            lane_count,
            lane_width: 50.0,
        })
        .unwrap();
        for x in [0.0, 250.0, 500.0] {
            road.add_point(Point2d::new(x, 0.0)).unwrap();
        }
        road.finish().unwrap();
        road
    }

    struct World {
        road_id: RoadId,
        road: Road,
        agents: SlotMap<AgentId, TrafficAgent>,
        params: CoordinationParams,
    }

    impl World {
        fn new(lane_count: usize) -> Self {
            let mut roads = SlotMap::<RoadId, ()>::with_key();
            Self {
                road_id: roads.insert(()),
                road: straight_road(lane_count),
                agents: SlotMap::with_key(),
                params: CoordinationParams {
                    slowdown_distance: 30.0,
                    lane_change_cooldown: 10,
                    speed_recovery: 0.05,
                    angle_smoothing: 0.05,
                },
            }
        }

        fn add(&mut self, lane: usize, distance: f64, speed: f64, behavior: Behavior) -> AgentId {
            let attributes = AgentAttributes {
                length: 4.0,
                width: 2.0,
                speed,
            };
            let agent =
                TrafficAgent::new(self.road_id, &self.road, lane, distance, &attributes, behavior)
                    .unwrap();
            self.agents.insert_with_key(|id| agent.with_id(id))
        }

        fn snapshots(&self) -> SecondaryMap<AgentId, AgentSnapshot> {
            self.agents.iter().map(|(id, a)| (id, a.snapshot())).collect()
        }

        fn tick(&mut self) -> Vec<(AgentId, TickStatus)> {
            let mut snapshots = self.snapshots();
            let mut statuses = vec![];
            for (id, agent) in &mut self.agents {
                let status = agent.advance_one_tick(&self.road, &snapshots, &self.params);
                snapshots.insert(id, agent.snapshot());
                statuses.push((id, status));
            }
            statuses
        }
    }

    #[test]
    fn follows_slower_agent() {
        let mut world = World::new(1);
        let front = world.add(0, 10.0, 0.5, Behavior::Plain);
        let rear = world.add(0, 0.0, 1.0, Behavior::Plain);

        for _ in 0..200 {
            world.tick();
            let (f, r) = (&world.agents[front], &world.agents[rear]);
            assert_eq!(r.limiting_agent(), Some(front));
            assert!(r.speed() <= f.speed());
            assert!(f.distance() - r.distance() >= 4.0);
            assert_eq!(r.lane(), 0);
        }
        assert_eq!(world.agents[rear].speed(), world.agents[front].speed());
    }

    #[test]
    fn overtakes_in_free_lane() {
        let mut world = World::new(2);
        let front = world.add(1, 10.0, 0.5, Behavior::Plain);
        let rear = world.add(1, 0.0, 1.0, Behavior::Plain);
        world.tick();
        let r = &world.agents[rear];
        assert_eq!(r.lane(), 0);
        assert_eq!(r.limiting_agent(), None);
        assert_eq!(r.lane_change_cooldown(), 10);
        assert!((r.position().y + 25.0).abs() < 1e-6);
        assert_eq!(world.agents[front].lane(), 1);
    }

    #[test]
    fn prefers_lane_on_the_right() {
        let mut world = World::new(3);
        world.add(1, 10.0, 0.5, Behavior::Plain);
        let rear = world.add(1, 0.0, 1.0, Behavior::Plain);
        world.tick();
        let r = &world.agents[rear];
        assert_eq!(r.lane(), 0);
        // Travelling along +x, the right-hand side is -y
        assert!((r.position().y + 50.0).abs() < 1e-6);
    }

    #[test]
    fn explosives_stay_in_lane() {
        let mut world = World::new(2);
        world.add(1, 10.0, 0.5, Behavior::Plain);
        let bomb = world.add(
            1,
            0.0,
            1.0,
            Behavior::TimedExplosive {
                remaining_ticks: 1000,
            },
        );
        for _ in 0..20 {
            world.tick();
        }
        assert_eq!(world.agents[bomb].lane(), 1);
    }

    #[test]
    fn blocked_lane_change_is_skipped() {
        let mut world = World::new(2);
        world.add(1, 10.0, 0.5, Behavior::Plain);
        world.add(0, 15.0, 0.5, Behavior::Plain);
        let rear = world.add(1, 0.0, 1.0, Behavior::Plain);
        world.tick();
        assert_eq!(world.agents[rear].lane(), 1);
    }

    #[test]
    fn running_into_an_agent_is_a_collision() {
        let mut world = World::new(1);
        let front = world.add(0, 3.0, 0.0, Behavior::Plain);
        let rear = world.add(0, 0.0, 1.0, Behavior::Plain);
        let statuses = world.tick();
        assert!(statuses.contains(&(rear, TickStatus::Collided { other: front })));
        assert_eq!(world.agents[rear].state(), AgentState::Collided);
    }

    #[test]
    fn reaching_the_end() {
        let mut world = World::new(1);
        let agent = world.add(0, 498.5, 1.0, Behavior::Plain);
        assert_eq!(world.tick(), vec![(agent, TickStatus::Continuing)]);
        assert_eq!(world.tick(), vec![(agent, TickStatus::ReachedEnd)]);
        assert_eq!(world.agents[agent].state(), AgentState::Arrived);
    }

    #[test]
    fn fuse_detonates() {
        let mut world = World::new(1);
        let bomb = world.add(0, 0.0, 1.0, Behavior::TimedExplosive { remaining_ticks: 3 });
        world.tick();
        world.tick();
        assert_eq!(world.tick(), vec![(bomb, TickStatus::Detonated)]);
    }

    #[test]
    fn footprint_extends_behind_position() {
        let snapshot = AgentSnapshot {
            id: AgentId::default(),
            road: RoadId::default(),
            lane: 0,
            distance: 0.0,
            speed: 0.0,
            position: Point2d::new(10.0, 0.0),
            heading: Vector2d::unit_x(),
            length: 4.0,
            width: 2.0,
            active: true,
        };
        assert!(snapshot.contains(Point2d::new(8.0, 0.5)));
        assert!(!snapshot.contains(Point2d::new(11.0, 0.0)));
        assert!(!snapshot.contains(Point2d::new(5.0, 0.0)));
        assert!(!snapshot.contains(Point2d::new(8.0, 1.5)));
    }
}
