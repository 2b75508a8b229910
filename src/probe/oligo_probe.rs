use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::stats;
use crate::error::ProbeError;
use crate::{tsv, Record, Result};

/// One-row summary of a probe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeFeatures {
    pub start: u32,
    pub end: u32,
    #[serde(rename = "nOligos")]
    pub n_oligos: usize,
    pub size: u32,
    pub spread: f64,
    pub d_min: f64,
    pub d_max: f64,
    pub d_mean: f64,
    pub tm_range: f64,
}

/// An ordered, non-overlapping set of oligos used together as one probe
#[derive(Debug, Clone)]
pub struct OligoProbe {
    /// Ids of the member oligos within their window
    path: Vec<usize>,
    oligos: Vec<Record>,
    features: ProbeFeatures,
    tm_bounds: (f64, f64),
}

impl OligoProbe {
    /// Creates a probe from `(id, record)` pairs sorted by start
    pub fn new(members: Vec<(usize, Record)>) -> Result<Self> {
        if members.is_empty() {
            return Err(ProbeError::EmptyProbe.into());
        }
        let (path, oligos): (Vec<usize>, Vec<Record>) = members.into_iter().unzip();

        let start = oligos.iter().map(|o| o.start).min().unwrap_or_default();
        let end = oligos.iter().map(|o| o.end).max().unwrap_or_default();
        let distances: Vec<f64> = oligos
            .windows(2)
            .map(|pair| f64::from(pair[1].start) - f64::from(pair[0].end))
            .collect();
        let (spread, d_min, d_max, d_mean) = if distances.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            (
                stats::std_dev(&distances),
                stats::min(&distances),
                stats::max(&distances),
                stats::mean(&distances),
            )
        };
        let tms: Vec<f64> = oligos.iter().map(|o| f64::from(o.tm)).collect();
        let tm_bounds = (stats::min(&tms), stats::max(&tms));

        Ok(Self {
            features: ProbeFeatures {
                start,
                end,
                n_oligos: path.len(),
                size: end - start,
                spread,
                d_min,
                d_max,
                d_mean,
                tm_range: tm_bounds.1 - tm_bounds.0,
            },
            path,
            oligos,
            tm_bounds,
        })
    }

    #[must_use]
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    #[must_use]
    pub fn oligos(&self) -> &[Record] {
        &self.oligos
    }

    #[must_use]
    pub fn features(&self) -> &ProbeFeatures {
        &self.features
    }

    #[must_use]
    pub fn n_oligos(&self) -> usize {
        self.path.len()
    }

    #[must_use]
    pub fn range(&self) -> (u32, u32) {
        (self.features.start, self.features.end)
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.features.size
    }

    /// Standard deviation of the distances between consecutive oligos
    #[must_use]
    pub fn spread(&self) -> f64 {
        self.features.spread
    }

    #[must_use]
    pub fn d_mean(&self) -> f64 {
        self.features.d_mean
    }

    #[must_use]
    pub fn tm_bounds(&self) -> (f64, f64) {
        self.tm_bounds
    }

    #[must_use]
    pub fn tm_range(&self) -> f64 {
        self.features.tm_range
    }

    /// Number of oligos shared with another probe of the same window
    #[must_use]
    pub fn count_shared_oligos(&self, other: &OligoProbe) -> usize {
        self.path
            .iter()
            .filter(|id| other.path.contains(id))
            .count()
    }

    /// Writes `probe.tsv`, `oligos.tsv` and `probe.fa` into a fresh folder
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        }
        fs::create_dir_all(path)?;

        let mut writer = tsv::writer(path.join("probe.tsv"))?;
        writer.serialize(self.features)?;
        writer.flush()?;

        write_oligos(path.join("oligos.tsv"), [self])?;

        let mut fasta = BufWriter::new(File::create(path.join("probe.fa"))?);
        for oligo in &self.oligos {
            writeln!(
                fasta,
                ">{}:{}:{}-{}",
                oligo.name, oligo.chromosome, oligo.start, oligo.end
            )?;
            writeln!(fasta, "{}", oligo.sequence)?;
        }
        fasta.flush()?;
        Ok(())
    }
}

impl fmt::Display for OligoProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<OligoProbe[{}:{}:{}:{}]>",
            self.features.start, self.features.end, self.features.size, self.features.spread
        )
    }
}

/// Writes the oligos of some probes, each once, with their ids and scores
pub(crate) fn write_oligos<'a, P: AsRef<Path>>(
    path: P,
    probes: impl IntoIterator<Item = &'a OligoProbe>,
) -> Result<()> {
    let mut writer = tsv::writer(path)?;
    let mut header = vec!["id"];
    header.extend(Record::header());
    header.push("score");
    writer.write_record(&header)?;

    let mut seen = std::collections::BTreeSet::new();
    for probe in probes {
        for (id, oligo) in probe.path.iter().zip(&probe.oligos) {
            if !seen.insert(*id) {
                continue;
            }
            let mut row = vec![id.to_string()];
            row.extend(oligo.fields());
            row.push(oligo.score.map_or_else(|| "nan".to_string(), |s| s.to_string()));
            writer.write_record(&row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Reads a table written by [`write_oligos`] back into `(id, record)` pairs
pub(crate) fn read_oligos<P: AsRef<Path>>(path: P) -> Result<Vec<(usize, Record)>> {
    let mut reader = tsv::reader(path)?;
    let mut oligos = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields: Vec<&str> = row.iter().collect();
        let Some((id, rest)) = fields.split_first() else {
            continue;
        };
        let Some((score, columns)) = rest.split_last() else {
            continue;
        };
        let mut record = Record::from_fields(columns)?;
        let score: f64 = score.parse()?;
        if !score.is_nan() {
            record.score = Some(score);
        }
        oligos.push((id.parse()?, record));
    }
    Ok(oligos)
}
