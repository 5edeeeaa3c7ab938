//! The error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Errors raised while building roads or driving the simulation.
///
/// Geometric degeneracies such as parallel edges or an empty destination lane
/// are not errors; those surface as `None` from the relevant queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("curve set has already been finalized")]
    AlreadyFinalized,

    #[error("lane {lane} is out of range for a road with {count} lanes")]
    LaneOutOfRange { lane: usize, count: usize },

    #[error("lane {0} has no geometry")]
    EmptyLane(usize),

    #[error("road is still being drawn")]
    RoadInProgress,

    #[error("no road with the given id")]
    UnknownRoad,

    #[error("no agent with the given id")]
    UnknownAgent,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
