//! Freehand-drawn multi-lane roads and a tick-based traffic simulation that runs on them.
//!
//! A [Road] is drawn from pointer samples: the samples are smoothed into a
//! [Centerline], which is offset into parallel lane curves with any loops at sharp
//! turns cut out. Agents follow the flattened lanes with an [ArcLengthTracer],
//! slow down behind slower agents and change lanes to get past them.

pub use agent::{
    AgentAttributes, AgentSnapshot, AgentState, Behavior, Capabilities, PayloadKind, SpeedModel,
    TickStatus, TrafficAgent,
};
pub use centerline::Centerline;
pub use cgmath;
pub use config::{CoordinationParams, SimulationConfig};
pub use curve::{CompositeCurve, FLATNESS};
pub use error::{Error, Result};
pub use offset::{offset_segment, CurveOffsetSet, LaneCurve};
pub use road::{Road, RoadAttributes};
pub use simulation::{AgentEvent, Simulation};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use spawner::{
    FollowSpawn, FollowState, FollowerAttributes, LaneSpawner, SpawnTimer, SpawnerAttributes,
};
pub use tracer::{ArcLengthTracer, Steps};
pub use util::Interval;

mod agent;
mod centerline;
mod config;
mod curve;
mod debug;
mod error;
pub mod math;
mod offset;
mod road;
mod simulation;
mod spawner;
mod tracer;
mod util;

new_key_type! {
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [TrafficAgent].
    pub struct AgentId;
}

type RoadSet = SlotMap<RoadId, Road>;
type AgentSet = SlotMap<AgentId, TrafficAgent>;
