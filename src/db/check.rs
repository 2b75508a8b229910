//! Integrity checks of a database against its manifest.
//!
//! Every chromosome file is mapped and scanned in parallel. Each thread
//! validates its own contiguous run of records and reports the first and last
//! start of every batch, so that ordering across batch borders is checked
//! once all threads are done.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::database::Database;
use super::index::BinRange;
use super::mmap::MmapChromosome;
use crate::error::IntegrityError;
use crate::parallel::{ParallelProcessor, ParallelReader};
use crate::{Record, Result};

/// First and last `(index, start)` of a run of records
type Edge = ((usize, u32), (usize, u32));

#[derive(Clone)]
struct MonotonicityCheck {
    chromosome: Arc<str>,
    bin_size: u32,
    bins: Arc<[BinRange]>,
    record_size: u64,
    edges: Arc<Mutex<Vec<Edge>>>,
    current: Option<Edge>,
}

impl MonotonicityCheck {
    fn check_index(&self, idx: usize, record: &Record) -> Result<()> {
        let bin = (record.start / self.bin_size) as usize;
        let offset = idx as u64 * self.record_size;
        match self.bins.get(bin) {
            Some(&(min, max)) if (min..=max).contains(&offset) => Ok(()),
            _ => Err(IntegrityError::IndexMismatch {
                chromosome: self.chromosome.to_string(),
                record: idx,
                bin,
            }
            .into()),
        }
    }
}

impl ParallelProcessor for MonotonicityCheck {
    fn process_record(&mut self, idx: usize, record: &Record) -> Result<()> {
        if record.chromosome != *self.chromosome {
            return Err(IntegrityError::ChromosomeMismatch {
                name: record.name.clone(),
                expected: self.chromosome.to_string(),
                got: record.chromosome.clone(),
            }
            .into());
        }
        let item = (idx, record.start);
        self.current = match self.current {
            None => Some((item, item)),
            Some((first, (_, previous))) => {
                if record.start <= previous {
                    return Err(IntegrityError::NonMonotonicStart {
                        chromosome: self.chromosome.to_string(),
                        record: idx,
                        previous,
                        current: record.start,
                    }
                    .into());
                }
                Some((first, item))
            }
        };
        self.check_index(idx, record)
    }

    fn on_batch_complete(&mut self) -> Result<()> {
        if let Some(edge) = self.current.take() {
            self.edges.lock().push(edge);
        }
        Ok(())
    }
}

impl Database {
    /// Validates every chromosome file
    ///
    /// Checks that file sizes match the manifest, that records carry the
    /// chromosome they are stored under, that starts are strictly increasing,
    /// and that the index bins point at the records they describe.
    pub fn check(&self, threads: usize) -> Result<()> {
        for chromosome in self.chromosomes() {
            let reader = MmapChromosome::new(self, &chromosome.name)?;
            if reader.size_bytes() as u64 != chromosome.size_bytes {
                return Err(IntegrityError::SizeMismatch {
                    chromosome: chromosome.name.clone(),
                    expected: chromosome.size_bytes as usize,
                    got: reader.size_bytes(),
                }
                .into());
            }

            let edges = Arc::new(Mutex::new(Vec::new()));
            let processor = MonotonicityCheck {
                chromosome: Arc::from(chromosome.name.as_str()),
                bin_size: chromosome.index.bin_size(),
                bins: Arc::from(chromosome.index.bins()),
                record_size: chromosome.record_byte_size as u64,
                edges: edges.clone(),
                current: None,
            };
            reader.process_parallel(processor, threads)?;

            let mut edges = edges.lock().clone();
            edges.sort_unstable();
            for pair in edges.windows(2) {
                let ((_, previous), (record, current)) = (pair[0].1, pair[1].0);
                if current <= previous {
                    return Err(IntegrityError::NonMonotonicStart {
                        chromosome: chromosome.name.clone(),
                        record,
                        previous,
                        current,
                    }
                    .into());
                }
            }
            info!("Chromosome '{}' passed all checks", chromosome.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};

    use byteorder::{LittleEndian, WriteBytesExt};

    use crate::db::testing::synthetic_records;
    use crate::db::{Column, Database, DatabaseWriterBuilder, Schema};

    fn database(dir: &std::path::Path, n: usize) -> crate::Result<Database> {
        let records = synthetic_records("chr1", n, 10, 8);
        let mut writer = DatabaseWriterBuilder::default()
            .bin_size(100)
            .build(dir.join("db"), Schema::fitting(&records))?;
        writer.write_chromosome("chr1", &records)?;
        writer.finish()
    }

    #[test]
    fn test_valid_database() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = database(dir.path(), 2500)?;
        db.check(1)?;
        db.check(4)?;
        Ok(())
    }

    #[test]
    fn test_detects_unsorted_records() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = database(dir.path(), 2500)?;
        let schema = db.schema().clone();
        let offset = schema.dtype(Column::Name).width() + schema.dtype(Column::Chromosome).width();

        // overwrite the start of record 1800 with that of record 10
        let mut file = OpenOptions::new()
            .write(true)
            .open(db.chromosome_path("chr1")?)?;
        file.seek(SeekFrom::Start(
            (1800 * db.record_byte_size() + offset) as u64,
        ))?;
        file.write_u32::<LittleEndian>(100)?;
        file.flush()?;

        assert!(db.check(1).is_err());
        assert!(db.check(3).is_err());
        Ok(())
    }

    #[test]
    fn test_detects_size_mismatch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = database(dir.path(), 20)?;
        let path = db.chromosome_path("chr1")?;
        let bytes = std::fs::read(&path)?;
        std::fs::write(&path, &bytes[..bytes.len() - db.record_byte_size()])?;
        assert!(db.check(1).is_err());
        Ok(())
    }
}
