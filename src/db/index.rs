use serde::{Deserialize, Serialize};

use crate::error::IntegrityError;
use crate::Result;

/// Default width of an index bin in nt
pub const DEFAULT_BIN_SIZE: u32 = 100_000;

/// Byte offsets of the first and last record starting within one bin
///
/// (min offset, max offset), both pointing at record boundaries.
pub type BinRange = (u64, u64);

/// Sparse index of a chromosome file
///
/// The index splits the chromosome into bins of `bin_size` nt and stores, for
/// every bin, the byte offsets of the first and last record whose start falls
/// in it. Bins are filled sequentially: an empty bin inherits the upper bound
/// of the previous bin, so every bin holds an offset that is never past the
/// first record starting at or after the bin.
///
/// Lookups are conservative: the returned offset is a seek target from which
/// a linear scan reaches the first record at or after the requested position.
///
/// # Examples
///
/// ```rust
/// use oligoprobe::db::ChromosomeIndex;
///
/// // Three records of 50 bytes starting at 10, 20 and 250
/// let index = ChromosomeIndex::build("chr1", [10, 20, 250], 50, 100).unwrap();
/// assert_eq!(index.lookup(15), Some(0));
/// assert_eq!(index.lookup(150), Some(50));
/// assert_eq!(index.lookup(260), Some(100));
/// assert_eq!(index.lookup(1000), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromosomeIndex {
    /// Width of each bin in nt
    bin_size: u32,
    /// Offset ranges, indexed by bin id
    bins: Vec<BinRange>,
}

impl ChromosomeIndex {
    /// Builds the index from record starts given in file order
    ///
    /// # Parameters
    ///
    /// * `chromosome` - Name of the chromosome, used when reporting errors
    /// * `starts` - Start positions of all records, in file order
    /// * `record_byte_size` - Size of one record in bytes
    /// * `bin_size` - Width of each bin in nt
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - If starts are strictly increasing
    /// * `Err(_)` - If a start is repeated or out of order
    pub fn build(
        chromosome: &str,
        starts: impl IntoIterator<Item = u32>,
        record_byte_size: usize,
        bin_size: u32,
    ) -> Result<Self> {
        let bin_size = bin_size.max(1);
        let mut bins: Vec<Option<BinRange>> = Vec::new();
        let mut previous: Option<u32> = None;
        for (record, start) in starts.into_iter().enumerate() {
            if let Some(previous) = previous {
                if start <= previous {
                    return Err(IntegrityError::NonMonotonicStart {
                        chromosome: chromosome.to_string(),
                        record,
                        previous,
                        current: start,
                    }
                    .into());
                }
            }
            previous = Some(start);

            let offset = (record * record_byte_size) as u64;
            let bin = (start / bin_size) as usize;
            if bins.len() <= bin {
                bins.resize(bin + 1, None);
            }
            bins[bin] = Some(match bins[bin] {
                Some((min, _)) => (min, offset),
                None => (offset, offset),
            });
        }

        let mut filled = Vec::with_capacity(bins.len());
        let mut last: BinRange = (0, 0);
        for bin in bins {
            last = bin.unwrap_or((last.1, last.1));
            filled.push(last);
        }

        Ok(Self {
            bin_size,
            bins: filled,
        })
    }

    /// Returns the seek target for a position
    ///
    /// # Returns
    ///
    /// * `Some(offset)` - Byte offset of the first record of the bin containing `pos`
    /// * `None` - If `pos` falls in a bin past the indexed range
    #[must_use]
    pub fn lookup(&self, pos: u32) -> Option<u64> {
        self.bins
            .get((pos / self.bin_size) as usize)
            .map(|(min, _)| *min)
    }

    #[must_use]
    pub fn bin_size(&self) -> u32 {
        self.bin_size
    }

    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    #[must_use]
    pub fn bins(&self) -> &[BinRange] {
        &self.bins
    }
}
