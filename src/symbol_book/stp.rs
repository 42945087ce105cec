//! Self-trade-prevention policy (§4.4), grounded on the teacher's `stp.rs`
//! `STPMode`/`STPAction` split — simplified here to a level-skip/level-cancel
//! decision rather than per-level safe-quantity splitting, since the spec
//! only requires "an incoming order cannot trade against a resting order
//! from the same owner" rather than a specific partial-fill allocation.

use serde::{Deserialize, Serialize};

/// What happens when a taker would otherwise trade against a resting
/// order owned by the same [`crate::order::Owner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StpMode {
    /// No self-trade prevention; same-owner orders trade normally.
    None,
    /// The taker stops matching the moment it reaches a same-owner maker —
    /// any remainder is handled like running out of crossable liquidity.
    CancelTaker,
    /// The same-owner maker is cancelled out of the book; the taker skips
    /// it and keeps matching deeper into the book.
    CancelMaker,
    /// Both the taker (matching stops) and the maker (cancelled) are cut.
    CancelBoth,
}

/// What the match loop should do upon finding a same-owner maker at the
/// front of the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StpAction {
    /// Not a self-trade (different owners, anonymous, or STP disabled) — proceed.
    Proceed,
    /// Cancel the maker and keep matching against the rest of the book.
    SkipMaker,
    /// Stop matching entirely; the taker's remainder is handled as if the
    /// book ran dry here.
    StopTaker,
    /// Cancel the maker and stop matching entirely.
    SkipMakerAndStopTaker,
}

impl StpMode {
    pub(super) fn action(self, same_owner: bool) -> StpAction {
        if !same_owner {
            return StpAction::Proceed;
        }
        match self {
            StpMode::None => StpAction::Proceed,
            StpMode::CancelTaker => StpAction::StopTaker,
            StpMode::CancelMaker => StpAction::SkipMaker,
            StpMode::CancelBoth => StpAction::SkipMakerAndStopTaker,
        }
    }
}
