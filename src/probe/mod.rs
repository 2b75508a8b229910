//! # Probe construction
//!
//! Probes are chains of non-overlapping oligos. The [`OligoProbeBuilder`]
//! searches the oligos of one window for such chains with the
//! [`OligoPathBuilder`], relaxing the score threshold and growing the focus
//! region until candidates are found, then merges near-duplicate candidates.
//! The [`OligoProbeSetBuilder`] combines one probe per window into probe sets.

mod builder;
mod oligo_probe;
mod path;
mod set;
mod stats;

pub use builder::{select_probe_from_pair, OligoProbeBuilder, ProbeBuilderConfig};
pub use oligo_probe::{OligoProbe, ProbeFeatures};
pub(crate) use oligo_probe::{read_oligos, write_oligos};
pub use path::{ExitPolls, OligoPathBuilder, PathVerdict};
pub use set::{OligoProbeSet, OligoProbeSetBuilder, ProbeCandidates, ProbeSetFeatures};
