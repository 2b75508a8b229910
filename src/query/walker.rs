use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use super::checkpoint::CheckpointStore;
use super::pool::{WindowTask, WorkerPool};
use crate::db::{ChromosomeWalker, Database};
use crate::oligo::{OligoGroup, ScoreSettings};
use crate::probe::{OligoProbe, OligoProbeBuilder, ProbeCandidates};
use crate::window::WindowSets;
use crate::{Record, Result};

/// Builds the probes of one window
///
/// Windows with fewer usable oligos than a probe needs are skipped. The
/// result is saved to the store even when empty, so that the window is not
/// processed again on resume.
pub fn process_window<S: CheckpointStore>(
    builder: &OligoProbeBuilder,
    store: &S,
    focus_step: u32,
    task: &WindowTask,
) -> Result<Vec<OligoProbe>> {
    let window = &task.window;
    let _span = info_span!("window", set = window.set_id, window = window.window_id).entered();
    let n = builder.config().oligos_per_probe;

    let probes = if task.oligos.len() < n {
        warn!(
            "Window does not have enough oligos {}/{}, skipped.",
            task.oligos.len(),
            n
        );
        Vec::new()
    } else {
        info!(
            "Retrieved {} oligos for window [{}:{}]",
            task.oligos.len(),
            window.start,
            window.end
        );
        let mut group = OligoGroup::new(task.oligos.clone());
        let candidates = builder.start(&mut group, window, focus_step)?;
        let total = candidates.len();
        let reduced = builder.reduce_probe_list(candidates)?;
        debug!("Reduced from {} to {} probes", total, reduced.len());
        reduced
    };

    if probes.is_empty() {
        warn!("Built 0 oligo probe candidates");
    } else {
        info!("Built {} oligo probe candidates", probes.len());
    }
    store.save(window, &probes)?;
    Ok(probes)
}

/// Streams the records of a chromosome into windows and dispatches them
///
/// Records are read once, in order. Scored records are collected for the
/// current window; when a record starts past its end the window is handed to
/// the worker pool and the records still needed by the next window are kept.
/// Windows completed by a previous run are loaded from the store and skipped.
pub struct Walker<S: CheckpointStore + 'static> {
    db: Database,
    chromosome: String,
    windows: WindowSets,
    scoring: ScoreSettings,
    builder: Arc<OligoProbeBuilder>,
    store: Arc<S>,
    threads: usize,
    oligos: Vec<Record>,
    candidates: ProbeCandidates,
}

impl<S: CheckpointStore + 'static> Walker<S> {
    pub fn new(
        db: Database,
        chromosome: &str,
        windows: WindowSets,
        builder: OligoProbeBuilder,
        store: S,
        threads: usize,
    ) -> Result<Self> {
        db.chromosome(chromosome)?;
        Ok(Self {
            db,
            chromosome: chromosome.to_string(),
            windows,
            scoring: builder.config().scoring,
            builder: Arc::new(builder),
            store: Arc::new(store),
            threads,
            oligos: Vec::new(),
            candidates: ProbeCandidates::new(),
        })
    }

    #[must_use]
    pub fn windows(&self) -> &WindowSets {
        &self.windows
    }

    pub fn log_prologue(&self) {
        let settings = self.windows.settings();
        info!("Database: '{}'", self.db.root().display());
        info!("Chromosome: {}", self.chromosome);
        if settings.is_growing() {
            info!("Region: full chromosome, from {}", settings.start);
        } else {
            info!("Region: [{}, {})", settings.start, settings.end);
        }
        info!("Window size: {} nt", self.windows.window_size());
        info!("Window shift: {}", settings.shift);
        info!(
            "Focus size: {} nt, step {} nt",
            self.windows.focus_size(),
            self.windows.focus_step()
        );
        info!("Threads: {}", self.threads);
    }

    fn store_result(&mut self, set_id: usize, window_id: usize, probes: Vec<OligoProbe>) {
        self.candidates
            .entry(set_id)
            .or_default()
            .insert(window_id, probes);
    }

    /// Loads the current window from the store, or prepares it for processing
    ///
    /// Returns `true` when the window is already complete.
    fn preprocess(&mut self) -> Result<bool> {
        let window = *self.windows.current();
        if let Some(probes) = self.store.load(&window)? {
            self.store_result(window.set_id, window.window_id, probes);
            return Ok(true);
        }
        let set_windows = self.windows.set_windows(window.set_id);
        self.store.prepare(&window, &set_windows)?;
        Ok(false)
    }

    /// Moves to the next window still to process
    ///
    /// Returns `false` once every window has been visited.
    fn advance(&mut self) -> Result<bool> {
        loop {
            if !self.windows.go_to_next_window() {
                return Ok(false);
            }
            if !self.preprocess()? {
                let start = self.windows.current().start;
                self.oligos.retain(|o| o.start >= start);
                return Ok(true);
            }
        }
    }

    fn dispatch(&self, pool: &mut WorkerPool) -> Result<()> {
        let window = *self.windows.current();
        debug!("Dispatching {} with {} oligos", window, self.oligos.len());
        pool.submit(WindowTask {
            window,
            oligos: self.oligos.clone(),
        })
    }

    /// Processes every window and returns the probes of each
    pub fn walk(mut self) -> Result<ProbeCandidates> {
        self.log_prologue();
        if self.preprocess()? && !self.advance()? {
            info!("All windows pre-processed. Skipped database walk.");
            return Ok(self.candidates);
        }

        let builder = self.builder.clone();
        let store = self.store.clone();
        let focus_step = self.windows.focus_step();
        let mut pool = WorkerPool::new(self.threads, move |task: &WindowTask| {
            process_window(&builder, &*store, focus_step, task)
        });

        let growing = self.windows.settings().is_growing();
        let destination = self.windows.destination();
        let mut exhausted = false;

        let mut cursor = ChromosomeWalker::new(&self.db, &self.chromosome)?;
        let first = self.windows.current().start;
        'records: for record in cursor.buffer(first, None)? {
            let record = record?;
            while record.start >= self.windows.current().end {
                self.dispatch(&mut pool)?;
                if !self.advance()? {
                    exhausted = true;
                    break 'records;
                }
            }
            if destination.is_some_and(|end| record.end > end) {
                info!("Reached destination");
                break;
            }
            if record.start < self.windows.current().start {
                continue;
            }
            let score = self.scoring.score(&record);
            if score <= 1.0 {
                self.oligos.push(record.with_score(score));
            }
        }

        if !exhausted {
            if growing {
                if !self.oligos.is_empty() {
                    self.dispatch(&mut pool)?;
                }
            } else {
                self.dispatch(&mut pool)?;
                while self.advance()? {
                    self.dispatch(&mut pool)?;
                }
            }
        }

        info!("Waiting for {} window tasks", pool.submitted());
        for result in pool.finish()? {
            self.store_result(result.window.set_id, result.window.window_id, result.probes);
        }
        info!("Processed {} window sets", self.candidates.len());
        Ok(self.candidates)
    }
}

#[cfg(test)]
mod testing {
    use parking_lot::Mutex;

    use super::*;
    use crate::db::testing::synthetic_records;
    use crate::db::{DatabaseWriterBuilder, Schema};
    use crate::probe::ProbeBuilderConfig;
    use crate::window::{Window, WindowSettings, WindowSizing};

    /// In-memory store recording which windows were processed
    #[derive(Default)]
    struct MemoryStore {
        done: Mutex<Vec<(Window, usize)>>,
        preloaded: Vec<Window>,
    }

    impl CheckpointStore for MemoryStore {
        fn load(&self, window: &Window) -> Result<Option<Vec<OligoProbe>>> {
            Ok(self.preloaded.contains(window).then(Vec::new))
        }

        fn prepare(&self, _window: &Window, _set_windows: &[Window]) -> Result<()> {
            Ok(())
        }

        fn save(&self, window: &Window, probes: &[OligoProbe]) -> Result<()> {
            self.done.lock().push((*window, probes.len()));
            Ok(())
        }
    }

    fn database(dir: &std::path::Path) -> Result<Database> {
        let records = synthetic_records("chr1", 400, 10, 6);
        let mut writer = DatabaseWriterBuilder::default()
            .bin_size(500)
            .build(dir.join("db"), Schema::fitting(&records))?;
        writer.write_chromosome("chr1", &records)?;
        writer.finish()
    }

    fn builder() -> Result<OligoProbeBuilder> {
        OligoProbeBuilder::new(ProbeBuilderConfig {
            oligos_per_probe: 10,
            max_probe_size: 500,
            ..ProbeBuilderConfig::default()
        })
    }

    fn windows(sizing: WindowSizing, end: u32) -> Result<WindowSets> {
        WindowSets::new(WindowSettings {
            start: 0,
            end,
            sizing,
            shift: 0.5,
            focus_style: 1.0,
            step_style: 0.1,
        })
    }

    #[test]
    fn test_every_window_is_processed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = database(dir.path())?;
        let windows = windows(WindowSizing::ProbeCount(4), 4000)?;
        let expected = windows.windows().len();
        let store = Arc::new(MemoryStore::default());

        let walker = Walker::new(db, "chr1", windows, builder()?, store.clone(), 2)?;
        let candidates = walker.walk()?;

        assert_eq!(store.done.lock().len(), expected);
        assert_eq!(candidates.len(), 2);
        let n_windows: usize = candidates.values().map(|set| set.len()).sum();
        assert_eq!(n_windows, expected);
        assert!(candidates[&0].values().all(|probes| !probes.is_empty()));
        Ok(())
    }

    #[test]
    fn test_preloaded_windows_are_skipped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = database(dir.path())?;
        let windows = windows(WindowSizing::ProbeCount(4), 4000)?;
        let all = windows.windows().to_vec();
        let store = Arc::new(MemoryStore {
            preloaded: all[..3].to_vec(),
            ..MemoryStore::default()
        });

        let walker = Walker::new(db, "chr1", windows, builder()?, store.clone(), 1)?;
        let candidates = walker.walk()?;

        let done = store.done.lock();
        assert_eq!(done.len(), all.len() - 3);
        assert!(done.iter().all(|(w, _)| !all[..3].contains(w)));
        let n_windows: usize = candidates.values().map(|set| set.len()).sum();
        assert_eq!(n_windows, all.len());
        Ok(())
    }

    #[test]
    fn test_growing_windows_cover_chromosome() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = database(dir.path())?;
        let windows = windows(WindowSizing::Size(1000), 0)?;
        let store = Arc::new(MemoryStore::default());

        let walker = Walker::new(db, "chr1", windows, builder()?, store.clone(), 2)?;
        walker.walk()?;

        let done = store.done.lock();
        let covered = done.iter().map(|(w, _)| w.end).max().unwrap_or_default();
        assert!(covered >= 3990);
        assert!(done.iter().any(|(_, n)| *n > 0));
        Ok(())
    }
}
