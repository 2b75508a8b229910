//! # Oligo database
//!
//! A database is a folder holding one binary file per chromosome and a
//! `db.json` manifest. Chromosome files are flat arrays of fixed-width
//! little-endian records sorted by start; the manifest stores the column
//! [`Schema`] and, for every chromosome, its size and a sparse
//! [`ChromosomeIndex`] from coordinate bins to byte offsets.
//!
//! Records are read sequentially with a [`ChromosomeWalker`], or randomly
//! and in parallel through a [`MmapChromosome`].

mod check;
mod chromosome;
mod database;
mod index;
mod mmap;
mod record;
mod schema;
mod walker;

pub use chromosome::ChromosomeData;
pub use database::{BuildArgs, Database, DatabaseWriter, DatabaseWriterBuilder, MANIFEST_NAME};
pub use index::{BinRange, ChromosomeIndex, DEFAULT_BIN_SIZE};
pub use mmap::MmapChromosome;
pub use record::{gc_content, Record};
pub use schema::{Column, ColumnSpec, Dtype, RecordCodec, Schema};
pub use walker::{ChromosomeWalker, RecordBuffer, RegionWalk};

#[cfg(test)]
pub(crate) mod testing {
    use super::Record;

    /// Evenly spaced oligos: `start = i * spacing`, with melting temperatures
    /// cycling over 60, 61 and 62 degC.
    pub(crate) fn synthetic_records(
        chromosome: &str,
        n: usize,
        spacing: u32,
        length: u32,
    ) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let start = i as u32 * spacing;
                let sequence: String = "ACGT".chars().cycle().take(length as usize).collect();
                Record {
                    name: format!("oligo_{i}"),
                    chromosome: chromosome.to_string(),
                    start,
                    end: start + length,
                    gc_content: super::gc_content(&sequence),
                    sequence,
                    off_target_no: 0,
                    tm_dg: -30.0,
                    tm_dh: -200.0,
                    tm_ds: -0.5,
                    tm: 60.0 + (i % 3) as f32,
                    ss_dg: -1.0,
                    score: None,
                }
            })
            .collect()
    }
}
