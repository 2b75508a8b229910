use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error};

use crate::error::WorkerError;
use crate::probe::OligoProbe;
use crate::window::Window;
use crate::{Error, Record, Result};

/// A window and a copy of its scored oligos
#[derive(Debug, Clone)]
pub struct WindowTask {
    pub window: Window,
    pub oligos: Vec<Record>,
}

/// Probes built for a window
#[derive(Debug)]
pub struct WindowResult {
    pub window: Window,
    pub probes: Vec<OligoProbe>,
}

type Outcome = std::result::Result<WindowResult, WorkerError>;

/// Fixed set of threads processing window tasks in submission order
///
/// Submitting never blocks. Failures are collected and the first one is
/// returned by [`finish`](Self::finish) once every thread has stopped.
pub struct WorkerPool {
    tasks: Sender<WindowTask>,
    results: Receiver<Outcome>,
    handles: Vec<JoinHandle<()>>,
    submitted: usize,
}

impl WorkerPool {
    pub fn new<F>(num_threads: usize, process: F) -> Self
    where
        F: Fn(&WindowTask) -> Result<Vec<OligoProbe>> + Send + Sync + 'static,
    {
        let (task_tx, task_rx) = unbounded::<WindowTask>();
        let (result_tx, result_rx) = unbounded::<Outcome>();
        let process = Arc::new(process);

        let handles = (0..num_threads.max(1))
            .map(|tid| {
                let tasks = task_rx.clone();
                let results = result_tx.clone();
                let process = process.clone();
                thread::spawn(move || {
                    for task in &tasks {
                        let outcome = match process(&task) {
                            Ok(probes) => Ok(WindowResult {
                                window: task.window,
                                probes,
                            }),
                            Err(e) => {
                                error!("{} failed: {e}", task.window);
                                Err(WorkerError::WindowFailed {
                                    set_id: task.window.set_id,
                                    window_id: task.window.window_id,
                                    reason: e.to_string(),
                                })
                            }
                        };
                        if results.send(outcome).is_err() {
                            break;
                        }
                    }
                    debug!("Worker {tid} stopped");
                })
            })
            .collect();

        Self {
            tasks: task_tx,
            results: result_rx,
            handles,
            submitted: 0,
        }
    }

    pub fn submit(&mut self, task: WindowTask) -> Result<()> {
        self.tasks
            .send(task)
            .map_err(|_| WorkerError::Disconnected)?;
        self.submitted += 1;
        Ok(())
    }

    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Waits for every submitted task
    ///
    /// Returns the results of all tasks, or the first failure.
    pub fn finish(self) -> Result<Vec<WindowResult>> {
        let Self {
            tasks,
            results,
            handles,
            ..
        } = self;
        drop(tasks);

        let mut first_error: Option<Error> = None;
        for (tid, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                error!("Worker {tid} panicked");
                first_error.get_or_insert(WorkerError::Panicked(tid).into());
            }
        }

        let mut done = Vec::new();
        for outcome in results.try_iter() {
            match outcome {
                Ok(result) => done.push(result),
                Err(e) => {
                    first_error.get_or_insert(e.into());
                }
            }
        }
        first_error.map_or(Ok(done), Err)
    }
}
