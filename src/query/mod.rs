//! # Probe design queries
//!
//! A query walks the records of one chromosome region through a table of
//! windows, builds candidate probes for every window on a worker pool, and
//! combines one probe per window into probe sets.
//!
//! The output folder holds one checkpoint per window under `window_sets/`
//! and the final probe sets under `probe_sets/`. Runs with
//! [`QuerySettings::reuse`] load completed windows instead of recomputing
//! them.

mod checkpoint;
mod pool;
mod settings;
mod walker;

use std::fs;

use tracing::info;

pub use checkpoint::{CheckpointStore, FsCheckpointStore};
pub use pool::{WindowResult, WindowTask, WorkerPool};
pub use settings::QuerySettings;
pub use walker::{process_window, Walker};

use crate::db::Database;
use crate::probe::{OligoProbeBuilder, OligoProbeSet, OligoProbeSetBuilder};
use crate::window::WindowSets;
use crate::Result;

/// Designs probe sets and writes them to the output folder
pub fn run_query(settings: &QuerySettings) -> Result<Vec<OligoProbeSet>> {
    settings.validate()?;
    let windows = WindowSets::new(settings.window_settings()?)?;
    let builder = OligoProbeBuilder::new(settings.builder)?;

    let db = Database::open(&settings.database)?;
    db.chromosome(&settings.chromosome)?;
    fs::create_dir_all(&settings.output)?;

    builder.log_prologue();
    let store = FsCheckpointStore::new(&settings.output, settings.reuse, settings, &settings.builder)?;
    let walker = Walker::new(
        db,
        &settings.chromosome,
        windows,
        builder,
        store,
        settings.threads(),
    )?;
    let candidates = walker.walk()?;

    let mut set_builder = OligoProbeSetBuilder::new(settings.output.join("probe_sets"))?;
    set_builder.build(&candidates)?;
    set_builder.export()?;
    info!("Done");
    Ok(set_builder.into_probe_sets())
}
