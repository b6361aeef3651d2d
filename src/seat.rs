use strum_macros::Display;

use crate::engine::{BlockProbe, Half};
use crate::geometry::BlockPos;

/// Default material tag marking stair-like blocks
pub const STAIRS_TAG: &str = "stairs";

/// Result of checking a block for seat validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SeatCheck {
    Valid,
    /// Material is not tagged as a stair
    NotStairs,
    /// Upside-down stair, or a block with no bottom half
    TopHalf,
    /// Something solid sits on top
    Obstructed,
}

impl SeatCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SeatCheck::Valid)
    }
}

/// Check whether `pos` can be sat on right now.
///
/// Reads live block state through `probe` on every call; nothing is cached
/// since blocks change between checks.
pub fn check_seat(probe: &dyn BlockProbe, pos: &BlockPos, tag: &str) -> SeatCheck {
    if !probe.has_tag(pos, tag) {
        return SeatCheck::NotStairs;
    }

    if probe.half(pos) != Some(Half::Bottom) {
        return SeatCheck::TopHalf;
    }

    // No room above a block at the top of the coordinate range
    match pos.up() {
        Some(above) if probe.is_passable(&above) => {}
        _ => return SeatCheck::Obstructed,
    }

    SeatCheck::Valid
}

pub fn is_valid_seat(probe: &dyn BlockProbe, pos: &BlockPos, tag: &str) -> bool {
    check_seat(probe, pos, tag).is_valid()
}
