use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use tracing::{debug, info, warn};

use super::chromosome::ChromosomeData;
use super::database::Database;
use super::schema::RecordCodec;
use crate::error::ReadError;
use crate::region::GenomicRegion;
use crate::{Record, Result};

/// Forward cursor over the records of one chromosome
///
/// The cursor always sits on a record boundary. It can jump close to a
/// coordinate through the chromosome index and then scan forward.
pub struct ChromosomeWalker<R: Read + Seek = BufReader<File>> {
    /// Source of the binary records
    reader: R,
    /// Metadata and index of the chromosome
    chromosome: ChromosomeData,
    codec: RecordCodec,
    /// Reusable record buffer
    rbuf: Vec<u8>,
}

impl ChromosomeWalker<BufReader<File>> {
    /// Opens a cursor at the first record of a chromosome
    pub fn new(db: &Database, chromosome: &str) -> Result<Self> {
        let file = File::open(db.chromosome_path(chromosome)?)?;
        Ok(Self::from_reader(
            BufReader::new(file),
            db.chromosome(chromosome)?.clone(),
            db.codec(),
        ))
    }
}

impl<R: Read + Seek> ChromosomeWalker<R> {
    pub fn from_reader(reader: R, chromosome: ChromosomeData, codec: RecordCodec) -> Self {
        let rbuf = vec![0; codec.record_size()];
        Self {
            reader,
            chromosome,
            codec,
            rbuf,
        }
    }

    #[must_use]
    pub fn chromosome(&self) -> &ChromosomeData {
        &self.chromosome
    }

    fn record_size(&self) -> u64 {
        self.codec.record_size() as u64
    }

    /// Reads the record under the cursor and moves past it
    ///
    /// Returns `None` at end of file.
    pub fn read_next_record(&mut self) -> Result<Option<Record>> {
        let mut filled = 0;
        while filled < self.rbuf.len() {
            match self.reader.read(&mut self.rbuf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            n if n == self.rbuf.len() => Ok(Some(self.codec.decode(&self.rbuf)?)),
            n => Err(ReadError::PartialRecord(n, self.rbuf.len()).into()),
        }
    }

    /// Moves the cursor back by exactly one record
    pub fn rewind(&mut self) -> Result<()> {
        let pos = self.reader.stream_position()?;
        let target = pos.saturating_sub(self.record_size());
        self.reader.seek(SeekFrom::Start(target))?;
        Ok(())
    }

    /// Moves the cursor back to the first record
    pub fn reset(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Places the cursor on the first record starting at or after `pos`
    pub fn fastforward(&mut self, pos: u32) -> Result<()> {
        if pos == 0 {
            return self.reset();
        }
        let Some(offset) = self.chromosome.index.lookup(pos) else {
            warn!(
                "Position {} is outside the indexed range of '{}' ({} nt)",
                pos, self.chromosome.name, self.chromosome.size_nt
            );
            self.reader.seek(SeekFrom::End(0))?;
            return Ok(());
        };
        self.reader.seek(SeekFrom::Start(offset))?;
        while let Some(record) = self.read_next_record()? {
            if record.start >= pos {
                return self.rewind();
            }
        }
        warn!(
            "No record of '{}' starts at or after {}",
            self.chromosome.name, pos
        );
        Ok(())
    }

    /// Iterates over records with `record.start >= start`, stopping after `end`
    ///
    /// An `end` of `None` reads to the end of the chromosome.
    pub fn buffer(&mut self, start: u32, end: Option<u32>) -> Result<RecordBuffer<'_, R>> {
        self.fastforward(start)?;
        Ok(RecordBuffer {
            walker: self,
            end,
            done: false,
        })
    }

    /// Collects the records of [`buffer`](Self::buffer)
    pub fn collect_range(&mut self, start: u32, end: Option<u32>) -> Result<Vec<Record>> {
        self.buffer(start, end)?.collect()
    }

    /// Walks the growing focus of a region
    ///
    /// Each item holds the records starting within the current focus. On
    /// every growth step only the newly exposed flanks are read.
    pub fn walk_region<'a>(&'a mut self, region: &'a mut GenomicRegion) -> RegionWalk<'a, R> {
        RegionWalk {
            walker: self,
            region,
            records: Vec::new(),
            seen: None,
        }
    }

    /// Walks every region of every region set, logging what was retrieved
    ///
    /// Returns the number of records retrieved in the last focus of each region.
    pub fn walk_region_sets(&mut self, sets: &mut [Vec<GenomicRegion>]) -> Result<Vec<Vec<usize>>> {
        let mut counts = Vec::with_capacity(sets.len());
        for (set_id, set) in sets.iter_mut().enumerate() {
            info!("Walking region set {} ({} regions)", set_id, set.len());
            let mut set_counts = Vec::with_capacity(set.len());
            for region in set.iter_mut() {
                let mut last = 0;
                for records in self.walk_region(region) {
                    last = records?.len();
                }
                debug!(
                    "Region [{}, {}): {} records in final focus",
                    region.start(),
                    region.end(),
                    last
                );
                set_counts.push(last);
            }
            counts.push(set_counts);
        }
        Ok(counts)
    }
}

/// Lazy sequence of records within a coordinate range
///
/// See [`ChromosomeWalker::buffer`].
pub struct RecordBuffer<'a, R: Read + Seek> {
    walker: &'a mut ChromosomeWalker<R>,
    end: Option<u32>,
    done: bool,
}

impl<R: Read + Seek> Iterator for RecordBuffer<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.walker.read_next_record() {
            Ok(Some(record)) => {
                if self.end.is_some_and(|end| record.start > end) {
                    self.done = true;
                    // leave the cursor on the first record past the range
                    if let Err(e) = self.walker.rewind() {
                        return Some(Err(e));
                    }
                    return None;
                }
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over the successive focus windows of a region
///
/// See [`ChromosomeWalker::walk_region`].
pub struct RegionWalk<'a, R: Read + Seek> {
    walker: &'a mut ChromosomeWalker<R>,
    region: &'a mut GenomicRegion,
    records: Vec<Record>,
    /// Focus covered by `records`
    seen: Option<(u32, u32)>,
}

impl<R: Read + Seek> RegionWalk<'_, R> {
    fn step(&mut self) -> Result<Option<Vec<Record>>> {
        let (focus_start, focus_end) = self.region.focus();
        let Some((seen_start, seen_end)) = self.seen else {
            self.records = self
                .walker
                .collect_range(focus_start, Some(focus_end.saturating_sub(1)))?;
            self.seen = Some((focus_start, focus_end));
            return Ok(Some(self.records.clone()));
        };

        if !self.region.can_increase_focus() {
            return Ok(None);
        }
        self.region.increase_focus();
        let (focus_start, focus_end) = self.region.focus();
        if focus_start < seen_start {
            let mut flank = self
                .walker
                .collect_range(focus_start, Some(seen_start - 1))?;
            flank.append(&mut self.records);
            self.records = flank;
        }
        if focus_end > seen_end {
            let mut flank = self
                .walker
                .collect_range(seen_end, Some(focus_end - 1))?;
            self.records.append(&mut flank);
        }
        self.seen = Some((focus_start, focus_end));
        Ok(Some(self.records.clone()))
    }
}

impl<R: Read + Seek> Iterator for RegionWalk<'_, R> {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step().transpose()
    }
}
