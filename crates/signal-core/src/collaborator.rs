//! Boundaries between the cycle controller and the outside world.
//!
//! Both traits are object safe so the controller can own them as boxed
//! capabilities; adapters backed by real hardware live in `signal-io`, the
//! simulated ones in [`crate::sim`].

use async_trait::async_trait;

use crate::lane::{Lane, Presence, SignalState};
use crate::Result;

/// Answers whether a vehicle is waiting at a lane.
///
/// A failure (camera offline, detector crashed, unparseable output) must be
/// returned as `Err`; `Ok(Presence::Absent)` is a definitive "lane empty".
#[async_trait]
pub trait PresenceOracle: Send + Sync {
    async fn query(&self, lane: Lane) -> Result<Presence>;
}

/// Drives the physical outputs of a lane.
#[async_trait]
pub trait LaneActuator: Send + Sync {
    async fn set_signal(&self, lane: Lane, state: SignalState) -> Result<()>;

    /// Point the lane-facing sensor (camera mount) at `lane`.
    async fn orient_sensor(&self, lane: Lane) -> Result<()>;
}

#[async_trait]
impl<T: PresenceOracle + ?Sized> PresenceOracle for Box<T> {
    async fn query(&self, lane: Lane) -> Result<Presence> {
        (**self).query(lane).await
    }
}

#[async_trait]
impl<T: LaneActuator + ?Sized> LaneActuator for Box<T> {
    async fn set_signal(&self, lane: Lane, state: SignalState) -> Result<()> {
        (**self).set_signal(lane, state).await
    }

    async fn orient_sensor(&self, lane: Lane) -> Result<()> {
        (**self).orient_sensor(lane).await
    }
}
