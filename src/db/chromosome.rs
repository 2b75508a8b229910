use serde::{Deserialize, Serialize};

use super::index::ChromosomeIndex;
use crate::{Record, Result};

/// Metadata of one chromosome of the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromosomeData {
    pub name: String,
    /// Largest record end, in nt
    pub size_nt: u32,
    /// Size of the binary file in bytes
    pub size_bytes: u64,
    /// Number of records
    pub recordno: u64,
    pub record_byte_size: usize,
    pub index: ChromosomeIndex,
}

impl ChromosomeData {
    /// Computes metadata and index of records sorted by start
    pub fn from_records(
        name: &str,
        records: &[Record],
        record_byte_size: usize,
        bin_size: u32,
    ) -> Result<Self> {
        let index = ChromosomeIndex::build(
            name,
            records.iter().map(|r| r.start),
            record_byte_size,
            bin_size,
        )?;
        Ok(Self {
            name: name.to_string(),
            size_nt: records.iter().map(|r| r.end).max().unwrap_or(0),
            size_bytes: (records.len() * record_byte_size) as u64,
            recordno: records.len() as u64,
            record_byte_size,
            index,
        })
    }

    /// Name of the binary file holding the chromosome records
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.bin", self.name)
    }
}
