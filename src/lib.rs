//! Sit on stairs.
//!
//! Right-clicking a stair spawns an invisible proxy actor on it and mounts the
//! player; the [`registry::SeatRegistry`] keeps track of who sits where and
//! tears sessions down when the player leaves, the block changes, or the
//! server stops. The host engine is reached through the traits in [`engine`];
//! [`dispatch::Dispatcher`] turns host events into registry calls.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod geometry;
pub mod logging;
pub mod registry;
pub mod seat;
pub mod sim;

pub use dispatch::{ClickAction, Dispatcher, Handled, HostEvent};
pub use engine::{ActorHandle, PlayerId};
pub use geometry::{BlockPos, Facing, Orientation, Pose, Position, WorldId};
pub use registry::{DeclineReason, SeatRegistry, Session, SitOutcome};
