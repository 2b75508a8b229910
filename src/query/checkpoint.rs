//! Per-window results on disk.
//!
//! Every window owns a folder under `window_sets/set_<s>/window_<w>`. A
//! `.done` marker is written last, so a folder without it holds no
//! usable result and is recomputed on resume.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use auto_impl::auto_impl;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ReadError;
use crate::probe::{read_oligos, write_oligos, OligoProbe, ProbeBuilderConfig};
use crate::tsv;
use crate::window::Window;
use crate::Result;

const DONE_MARKER: &str = ".done";

/// Storage of completed window results
#[auto_impl(&, Arc, Box)]
pub trait CheckpointStore: Send + Sync {
    /// Result of a window completed by a previous run, if any
    fn load(&self, window: &Window) -> Result<Option<Vec<OligoProbe>>>;

    /// Sets up an empty slot for a window about to be processed
    fn prepare(&self, window: &Window, set_windows: &[Window]) -> Result<()>;

    /// Records the result of a window and marks it complete
    fn save(&self, window: &Window, probes: &[OligoProbe]) -> Result<()>;
}

/// Checkpoints kept in the query output folder
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    root: PathBuf,
    reuse: bool,
    walker_config: String,
    builder_config: String,
}

impl FsCheckpointStore {
    /// Stores results under `root`, with copies of the run parameters
    pub fn new<P: AsRef<Path>, S: Serialize>(
        root: P,
        reuse: bool,
        walker_config: &S,
        builder_config: &ProbeBuilderConfig,
    ) -> Result<Self> {
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            reuse,
            walker_config: serde_json::to_string_pretty(walker_config)?,
            builder_config: serde_json::to_string_pretty(builder_config)?,
        })
    }

    #[must_use]
    pub fn set_path(&self, set_id: usize) -> PathBuf {
        self.root
            .join("window_sets")
            .join(format!("set_{set_id}"))
    }

    #[must_use]
    pub fn window_path(&self, window: &Window) -> PathBuf {
        self.set_path(window.set_id)
            .join(format!("window_{}", window.window_id))
    }

    fn stored_window(path: &Path) -> Result<Option<Window>> {
        let mut reader = tsv::reader(path.join("window.tsv"))?;
        match reader.records().next() {
            Some(row) => {
                let row = row?;
                Ok(Some(Window::from_fields(&row.iter().collect::<Vec<_>>())?))
            }
            None => Ok(None),
        }
    }

    fn write_windows(path: &Path, windows: &[Window]) -> Result<()> {
        let mut writer = tsv::writer(path)?;
        writer.write_record(Window::header())?;
        for window in windows {
            writer.write_record(window.fields())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads the probes of a window folder
    fn import(path: &Path) -> Result<Vec<OligoProbe>> {
        let paths = path.join("probe_paths.tsv");
        if !paths.is_file() {
            return Ok(Vec::new());
        }
        let oligos: BTreeMap<usize, _> = read_oligos(path.join("oligos.tsv"))?.into_iter().collect();

        let mut probes = Vec::new();
        for row in tsv::reader(paths)?.records() {
            let row = row?;
            let Some(ids) = row.get(0) else {
                continue;
            };
            let mut members = Vec::new();
            for id in ids.split(',') {
                let id: usize = id.trim().parse()?;
                let oligo = oligos.get(&id).ok_or(ReadError::UnknownOligo(id))?;
                members.push((id, oligo.clone()));
            }
            probes.push(OligoProbe::new(members)?);
        }
        Ok(probes)
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn load(&self, window: &Window) -> Result<Option<Vec<OligoProbe>>> {
        let path = self.window_path(window);
        if !self.reuse || !path.join(DONE_MARKER).is_file() || !path.join("window.tsv").is_file() {
            return Ok(None);
        }
        if Self::stored_window(&path)?.as_ref() != Some(window) {
            debug!("Stored {} does not match, recomputing", window);
            return Ok(None);
        }
        let probes = Self::import(&path)?;
        info!("Loaded {} probes of {} from a previous run", probes.len(), window);
        Ok(Some(probes))
    }

    fn prepare(&self, window: &Window, set_windows: &[Window]) -> Result<()> {
        let set_path = self.set_path(window.set_id);
        fs::create_dir_all(&set_path)?;
        Self::write_windows(&set_path.join("windows.tsv"), set_windows)?;

        let path = self.window_path(window);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Self::write_windows(&path.join("window.tsv"), std::slice::from_ref(window))?;
        fs::write(path.join("walker.json"), &self.walker_config)?;
        Ok(())
    }

    fn save(&self, window: &Window, probes: &[OligoProbe]) -> Result<()> {
        let path = self.window_path(window);
        fs::create_dir_all(&path)?;
        if !probes.is_empty() {
            let mut features = tsv::writer(path.join("probe_feat.tsv"))?;
            for probe in probes {
                features.serialize(probe.features())?;
            }
            features.flush()?;

            write_oligos(path.join("oligos.tsv"), probes)?;

            let mut paths = tsv::writer(path.join("probe_paths.tsv"))?;
            paths.write_record(["cs_oligos"])?;
            for probe in probes {
                let ids: Vec<String> = probe.path().iter().map(ToString::to_string).collect();
                paths.write_record([ids.join(",")])?;
            }
            paths.flush()?;
        }
        fs::write(path.join("builder.json"), &self.builder_config)?;
        File::create(path.join(DONE_MARKER))?;
        Ok(())
    }
}
