use std::ops::Range;

use crate::{Record, Result};

/// Number of records each thread decodes between two batch callbacks
pub const BATCH_SIZE: usize = 1024;

/// Resolves a requested thread count against the available cores
///
/// `0` means one thread per core; any request is capped at the core count.
#[must_use]
pub fn resolve_threads(requested: usize) -> usize {
    let cores = num_cpus::get().max(1);
    if requested == 0 {
        cores
    } else {
        requested.min(cores)
    }
}

/// Trait for record stores that can be processed in parallel
///
/// This is implemented by the **reader** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
pub trait ParallelReader {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;

    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()>;
}

/// Trait for types that can process records in parallel.
///
/// Every thread works on its own clone of the processor and visits a
/// contiguous run of records, in order.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single record, given its index in the chromosome file
    fn process_record(&mut self, idx: usize, record: &Record) -> Result<()>;

    /// Called when a thread finishes processing a batch
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    fn set_tid(&mut self, _tid: usize) {}

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}
