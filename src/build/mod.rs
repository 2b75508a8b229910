//! # Database assembly
//!
//! Merges the outputs of the off-target, melting temperature and secondary
//! structure tools into an oligo database. Records are matched by their full
//! header, `<name> pos=<chrom>:<start>-<end>`; fields missing from every
//! input are stored as `NaN` (or `0` off-targets).

mod parse;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

pub use parse::{
    parse_header, parse_melting, parse_off_target, parse_secondary, MeltingEntry, OffTargetEntry,
    SecondaryEntry,
};

use crate::db::{gc_content, BuildArgs, Database, DatabaseWriterBuilder, Schema, DEFAULT_BIN_SIZE};
use crate::error::{BuildError, ConfigError, IntegrityError, WriteError};
use crate::{Record, Result};

/// Inputs and options of `db make`
#[derive(Debug, Clone)]
pub struct MakeSettings {
    pub output: PathBuf,
    pub off_target: Vec<PathBuf>,
    pub melting: Vec<PathBuf>,
    pub secondary: Vec<PathBuf>,
    /// Prepended to every chromosome name
    pub prefix: String,
    pub bin_size: u32,
}

impl MakeSettings {
    #[must_use]
    pub fn new(output: PathBuf) -> Self {
        Self {
            output,
            off_target: Vec::new(),
            melting: Vec::new(),
            secondary: Vec::new(),
            prefix: String::new(),
            bin_size: DEFAULT_BIN_SIZE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.exists() {
            return Err(WriteError::OutputExists(self.output.clone()).into());
        }
        if self.bin_size == 0 {
            return Err(ConfigError::NonPositive("bin size").into());
        }
        if self.off_target.is_empty() && self.melting.is_empty() {
            return Err(BuildError::NoSequenceSource.into());
        }
        for path in self
            .off_target
            .iter()
            .chain(&self.melting)
            .chain(&self.secondary)
        {
            if !path.is_file() {
                return Err(BuildError::MissingInput(path.clone()).into());
            }
        }
        Ok(())
    }

    fn build_args(&self) -> BuildArgs {
        BuildArgs {
            off_target: self.off_target.clone(),
            melting: self.melting.clone(),
            secondary: self.secondary.clone(),
            prefix: self.prefix.clone(),
            bin_size: self.bin_size,
        }
    }
}

/// Fields gathered for one header across all inputs
#[derive(Debug, Default)]
struct PartialRecord {
    sequence: Option<String>,
    off_target_no: Option<u64>,
    melting: Option<(f32, f32, f32, f32)>,
    ss_dg: Option<f32>,
}

impl PartialRecord {
    fn into_record(self, header: &str, prefix: &str) -> Result<Record> {
        let (name, chromosome, start, end) = parse_header(header)?;
        let sequence = self
            .sequence
            .ok_or_else(|| BuildError::MissingSequence(header.to_string()))?;
        if sequence.len() != (end - start) as usize {
            return Err(IntegrityError::SequenceLengthMismatch {
                name,
                expected: end - start,
                got: sequence.len(),
            }
            .into());
        }
        let (tm_dg, tm_dh, tm_ds, tm) = self.melting.unwrap_or((f32::NAN, f32::NAN, f32::NAN, f32::NAN));
        Ok(Record {
            name,
            chromosome: format!("{prefix}{chromosome}"),
            start,
            end,
            gc_content: gc_content(&sequence),
            sequence,
            off_target_no: self.off_target_no.unwrap_or(0),
            tm_dg,
            tm_dh,
            tm_ds,
            tm,
            ss_dg: self.ss_dg.unwrap_or(f32::NAN),
            score: None,
        })
    }
}

/// Merges all inputs into records grouped by chromosome, sorted by start
pub fn merge_inputs(settings: &MakeSettings) -> Result<BTreeMap<String, Vec<Record>>> {
    let mut merged: BTreeMap<String, PartialRecord> = BTreeMap::new();
    for path in &settings.off_target {
        for entry in parse_off_target(path)? {
            let record = merged.entry(entry.header).or_default();
            record.sequence.get_or_insert(entry.sequence);
            record.off_target_no = Some(entry.off_target_no);
        }
    }
    for path in &settings.melting {
        for entry in parse_melting(path)? {
            let record = merged.entry(entry.header).or_default();
            record.sequence.get_or_insert(entry.sequence);
            record.melting = Some((entry.tm_dg, entry.tm_dh, entry.tm_ds, entry.tm));
        }
    }
    for path in &settings.secondary {
        for entry in parse_secondary(path)? {
            merged.entry(entry.header).or_default().ss_dg = Some(entry.ss_dg);
        }
    }
    info!("Merged {} records", merged.len());

    let mut chromosomes: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for (header, partial) in merged {
        let record = partial.into_record(&header, &settings.prefix)?;
        chromosomes
            .entry(record.chromosome.clone())
            .or_default()
            .push(record);
    }
    for records in chromosomes.values_mut() {
        records.sort_by_key(|r| r.start);
    }
    Ok(chromosomes)
}

/// Assembles a new database from tool outputs
pub fn make_database(settings: &MakeSettings) -> Result<Database> {
    settings.validate()?;
    let chromosomes = merge_inputs(settings)?;
    let schema = Schema::fitting(chromosomes.values().flatten());
    debug!("Record size of {} bytes", schema.record_byte_size());

    let mut writer = DatabaseWriterBuilder::default()
        .bin_size(settings.bin_size)
        .args(settings.build_args())
        .build(&settings.output, schema)?;
    for (name, records) in &chromosomes {
        info!("Writing {} records of '{name}'", records.len());
        writer.write_chromosome(name, records)?;
    }
    writer.finish()
}
