//! Parsers for the outputs of the off-target, melting temperature and
//! secondary structure tools.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::info;

use crate::error::BuildError;
use crate::Result;

/// Opens a text file, decompressing it when it ends in `.gz`
pub(crate) fn open_text<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(BuildError::MissingInput(path.to_path_buf()).into());
    }
    let file = File::open(path)?;
    if path.extension().is_some_and(|e| e == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Off-target search output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffTargetEntry {
    pub header: String,
    pub sequence: String,
    pub off_target_no: u64,
}

/// Melting temperature output
#[derive(Debug, Clone, PartialEq)]
pub struct MeltingEntry {
    pub header: String,
    pub tm_dg: f32,
    pub tm_dh: f32,
    pub tm_ds: f32,
    pub tm: f32,
    pub sequence: String,
}

/// Secondary structure output
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryEntry {
    pub header: String,
    pub ss_dg: f32,
}

/// Parses single-line FASTA records whose sequence line ends with
/// `, <off-target count>`
pub fn parse_off_target<P: AsRef<Path>>(path: P) -> Result<Vec<OffTargetEntry>> {
    let path = path.as_ref();
    info!("Parsing off-target counts from '{}'", path.display());
    let malformed = |line: usize| BuildError::MalformedLine {
        path: path.to_path_buf(),
        line,
    };

    let mut entries = Vec::new();
    let mut header: Option<String> = None;
    for (i, line) in open_text(path)?.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(h) = line.strip_prefix('>') {
            header = Some(h.to_string());
            continue;
        }
        let (sequence, count) = line.split_once(',').ok_or_else(|| malformed(i + 1))?;
        let off_target_no = count.trim().parse().map_err(|_| malformed(i + 1))?;
        entries.push(OffTargetEntry {
            header: header.take().ok_or_else(|| malformed(i + 1))?,
            sequence: sequence.trim().to_string(),
            off_target_no,
        });
    }
    Ok(entries)
}

/// Parses a tab-separated table with a header line and six columns:
/// name, dG, dH, dS, Tm and sequence
pub fn parse_melting<P: AsRef<Path>>(path: P) -> Result<Vec<MeltingEntry>> {
    let path = path.as_ref();
    info!("Parsing melting temperatures from '{}'", path.display());
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(open_text(path)?);

    let mut entries = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let malformed = || BuildError::MalformedLine {
            path: path.to_path_buf(),
            line: i + 2,
        };
        if row.len() != 6 {
            return Err(malformed().into());
        }
        let float = |j: usize| row[j].trim().parse::<f32>().map_err(|_| malformed());
        entries.push(MeltingEntry {
            header: row[0].to_string(),
            tm_dg: float(1)?,
            tm_dh: float(2)?,
            tm_ds: float(3)?,
            tm: float(4)?,
            sequence: row[5].trim().to_string(),
        });
    }
    Ok(entries)
}

/// Parses the free energy lines of connectivity tables
///
/// Only lines holding `dG = ` are read, as three tab-separated fields: a
/// length, `dG = <value>` and the record name.
pub fn parse_secondary<P: AsRef<Path>>(path: P) -> Result<Vec<SecondaryEntry>> {
    let path = path.as_ref();
    info!("Parsing secondary structures from '{}'", path.display());
    let mut entries = Vec::new();
    for (i, line) in open_text(path)?.lines().enumerate() {
        let line = line?;
        if !line.contains("dG = ") {
            continue;
        }
        let malformed = || BuildError::MalformedLine {
            path: path.to_path_buf(),
            line: i + 1,
        };
        let fields: Vec<&str> = line.trim().split('\t').collect();
        let &[_, energy, name] = fields.as_slice() else {
            return Err(malformed().into());
        };
        let ss_dg = energy
            .trim()
            .strip_prefix("dG = ")
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(malformed)?;
        entries.push(SecondaryEntry {
            header: name.to_string(),
            ss_dg,
        });
    }
    Ok(entries)
}

/// Splits a `<name> pos=<chrom>:<start>-<end>` header
pub fn parse_header(header: &str) -> Result<(String, String, u32, u32)> {
    let malformed = || BuildError::MalformedName(header.to_string());
    let (name, position) = header.split_once(' ').ok_or_else(malformed)?;
    let position = position.trim().strip_prefix("pos=").ok_or_else(malformed)?;
    let (chromosome, extremes) = position.rsplit_once(':').ok_or_else(malformed)?;
    let (start, end) = extremes.split_once('-').ok_or_else(malformed)?;
    let start: u32 = start.parse().map_err(|_| malformed())?;
    let end: u32 = end.parse().map_err(|_| malformed())?;
    if end < start {
        return Err(malformed().into());
    }
    Ok((name.to_string(), chromosome.to_string(), start, end))
}
