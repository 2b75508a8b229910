//! Scoring and per-window working sets of oligos.

mod group;
mod score;

pub use group::OligoGroup;
pub use score::{ScoreSettings, DEFAULT_FREE_ENERGY_RANGE, DEFAULT_OFF_TARGET_RANGE};
