use std::fs::File;
use std::ops::Range;
use std::sync::Arc;

use memmap2::Mmap;

use super::chromosome::ChromosomeData;
use super::database::Database;
use super::schema::RecordCodec;
use crate::error::{IntegrityError, ReadError, WorkerError};
use crate::parallel::{resolve_threads, ParallelProcessor, ParallelReader, BATCH_SIZE};
use crate::{Record, Result};

/// Random access to the records of one chromosome through a memory map
///
/// The map is shared between threads through an `Arc`, so the reader can
/// be handed to [`ParallelReader::process_parallel`] without copying.
#[derive(Clone)]
pub struct MmapChromosome {
    mmap: Arc<Mmap>,
    chromosome: ChromosomeData,
    codec: RecordCodec,
}

impl MmapChromosome {
    /// Maps the binary file of a chromosome
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The chromosome is not part of the database
    /// * The file cannot be opened or mapped
    /// * The file size is not a multiple of the record size
    pub fn new(db: &Database, chromosome: &str) -> Result<Self> {
        let data = db.chromosome(chromosome)?.clone();
        let path = db.chromosome_path(chromosome)?;
        let file = File::open(&path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile(path).into());
        }

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };

        let codec = db.codec();
        if !mmap.len().is_multiple_of(codec.record_size()) {
            return Err(IntegrityError::FileTruncation {
                path,
                size: mmap.len(),
                record_size: codec.record_size(),
            }
            .into());
        }

        Ok(Self {
            mmap: Arc::new(mmap),
            chromosome: data,
            codec,
        })
    }

    #[must_use]
    pub fn chromosome(&self) -> &ChromosomeData {
        &self.chromosome
    }

    /// Size of the mapped file in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.mmap.len()
    }

    #[must_use]
    pub fn num_records(&self) -> usize {
        self.mmap.len() / self.codec.record_size()
    }

    fn record_bytes(&self, idx: usize) -> Result<&[u8]> {
        if idx >= self.num_records() {
            return Err(ReadError::OutOfRange(idx, self.num_records()).into());
        }
        let rsize = self.codec.record_size();
        let lbound = idx * rsize;
        Ok(&self.mmap[lbound..lbound + rsize])
    }

    /// Decodes the record at `idx`
    pub fn get(&self, idx: usize) -> Result<Record> {
        self.codec.decode(self.record_bytes(idx)?)
    }

    /// Decodes only the start coordinate of the record at `idx`
    pub fn start_at(&self, idx: usize) -> Result<u32> {
        Ok(self.codec.decode_start(self.record_bytes(idx)?))
    }
}

impl ParallelReader for MmapChromosome {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let num_records = self.num_records();
        self.process_parallel_range(processor, num_threads, 0..num_records)
    }

    /// Splits `range` into one contiguous chunk per thread
    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()> {
        let num_threads = resolve_threads(num_threads);

        let num_records = self.num_records();
        if range.start >= num_records || range.end > num_records || range.start >= range.end {
            return Ok(());
        }

        let records_per_thread = (range.end - range.start).div_ceil(num_threads);
        let reader = Arc::new(self);

        let mut handles = Vec::new();
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let reader = reader.clone();
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                let start_idx = range.start + tid * records_per_thread;
                let end_idx = (start_idx + records_per_thread).min(range.end);
                if start_idx >= end_idx {
                    return Ok(());
                }

                for batch_start in (start_idx..end_idx).step_by(BATCH_SIZE) {
                    let batch_end = (batch_start + BATCH_SIZE).min(end_idx);
                    for idx in batch_start..batch_end {
                        let record = reader.get(idx)?;
                        processor.process_record(idx, &record)?;
                    }
                    processor.on_batch_complete()?;
                }
                Ok(())
            });
            handles.push(handle);
        }

        let mut first_error = None;
        for (tid, handle) in handles.into_iter().enumerate() {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(WorkerError::Panicked(tid).into()));
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
