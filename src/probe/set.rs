use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::oligo_probe::OligoProbe;
use super::stats;
use crate::error::{ProbeError, WriteError};
use crate::{tsv, Result};

/// Candidate probes of each window, grouped by window set then window id
pub type ProbeCandidates = BTreeMap<usize, BTreeMap<usize, Vec<OligoProbe>>>;

/// One-row summary of a probe set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeSetFeatures {
    pub start: u32,
    pub end: u32,
    #[serde(rename = "nProbes")]
    pub n_probes: usize,
    pub size: u32,
    pub size_mean: f64,
    pub size_std: f64,
    pub spread_min: f64,
    pub spread_max: f64,
    pub spread_mean: f64,
    pub spread_std: f64,
    pub d_min: f64,
    pub d_max: f64,
    pub d_mean: f64,
    pub d_std: f64,
    pub tm_range: f64,
    pub tm_mean: f64,
    pub tm_std: f64,
    /// Mean coefficient of variation of sizes, spreads and oligo Tm
    pub score: f64,
}

/// Probes picked one per window, sorted by start
#[derive(Debug, Clone)]
pub struct OligoProbeSet {
    probes: Vec<OligoProbe>,
    features: ProbeSetFeatures,
}

impl OligoProbeSet {
    pub fn new(mut probes: Vec<OligoProbe>) -> Result<Self> {
        if probes.is_empty() {
            return Err(ProbeError::EmptyProbeSet.into());
        }
        probes.sort_by_key(|p| p.range().0);

        let start = probes.iter().map(|p| p.range().0).min().unwrap_or_default();
        let end = probes.iter().map(|p| p.range().1).max().unwrap_or_default();
        let sizes: Vec<f64> = probes.iter().map(|p| f64::from(p.size())).collect();
        let spreads: Vec<f64> = probes.iter().map(OligoProbe::spread).collect();
        let distances: Vec<f64> = if probes.len() == 1 {
            vec![0.0]
        } else {
            probes
                .windows(2)
                .map(|pair| f64::from(pair[1].range().0) - f64::from(pair[0].range().1))
                .collect()
        };
        let tm_low = probes
            .iter()
            .map(|p| p.tm_bounds().0)
            .fold(f64::INFINITY, f64::min);
        let tm_high = probes
            .iter()
            .map(|p| p.tm_bounds().1)
            .fold(f64::NEG_INFINITY, f64::max);
        let oligo_tm: Vec<f64> = probes
            .iter()
            .flat_map(|p| p.oligos().iter().map(|o| f64::from(o.tm)))
            .collect();

        let features = ProbeSetFeatures {
            start,
            end,
            n_probes: probes.len(),
            size: end - start,
            size_mean: stats::mean(&sizes),
            size_std: stats::std_dev(&sizes),
            spread_min: stats::min(&spreads),
            spread_max: stats::max(&spreads),
            spread_mean: stats::mean(&spreads),
            spread_std: stats::std_dev(&spreads),
            d_min: stats::min(&distances),
            d_max: stats::max(&distances),
            d_mean: stats::mean(&distances),
            d_std: stats::std_dev(&distances),
            tm_range: tm_high - tm_low,
            tm_mean: stats::mean(&oligo_tm),
            tm_std: stats::std_dev(&oligo_tm),
            score: (stats::cv(&sizes) + stats::cv(&spreads) + stats::cv(&oligo_tm)) / 3.0,
        };
        Ok(Self { probes, features })
    }

    #[must_use]
    pub fn probes(&self) -> &[OligoProbe] {
        &self.probes
    }

    #[must_use]
    pub fn features(&self) -> &ProbeSetFeatures {
        &self.features
    }

    /// Writes `set.tsv`, `probes.tsv`, `set.bed` and one folder per probe
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.is_file() {
            return Err(WriteError::OutputExists(path.to_path_buf()).into());
        }
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        }
        fs::create_dir_all(path)?;

        let mut writer = tsv::writer(path.join("set.tsv"))?;
        writer.serialize(self.features)?;
        writer.flush()?;

        let mut writer = tsv::writer(path.join("probes.tsv"))?;
        for probe in &self.probes {
            writer.serialize(probe.features())?;
        }
        writer.flush()?;

        let mut bed = BufWriter::new(File::create(path.join("set.bed"))?);
        for (i, probe) in self.probes.iter().enumerate() {
            probe.export(path.join(format!("probe_{i}")))?;
            for oligo in probe.oligos() {
                writeln!(
                    bed,
                    ">probe_{i}:{}:{}:{}-{}",
                    oligo.name, oligo.chromosome, oligo.start, oligo.end
                )?;
                writeln!(bed, "{}", oligo.sequence)?;
            }
        }
        bed.flush()?;
        Ok(())
    }
}

/// Assembles probe sets from per-window candidates and writes them out
#[derive(Debug)]
pub struct OligoProbeSetBuilder {
    out_path: PathBuf,
    probe_sets: Vec<OligoProbeSet>,
}

impl OligoProbeSetBuilder {
    /// Prepares a clean output folder
    pub fn new<P: AsRef<Path>>(out_path: P) -> Result<Self> {
        let out_path = out_path.as_ref().to_path_buf();
        if out_path.is_file() {
            return Err(WriteError::OutputExists(out_path).into());
        }
        if out_path.is_dir() {
            fs::remove_dir_all(&out_path)?;
        }
        fs::create_dir_all(&out_path)?;
        Ok(Self {
            out_path,
            probe_sets: Vec::new(),
        })
    }

    #[must_use]
    pub fn probe_sets(&self) -> &[OligoProbeSet] {
        &self.probe_sets
    }

    #[must_use]
    pub fn into_probe_sets(self) -> Vec<OligoProbeSet> {
        self.probe_sets
    }

    /// Every combination of one probe per non-empty window
    ///
    /// Windows are taken in id order. Windows without candidates are
    /// skipped; a set without any candidate yields no combination.
    #[must_use]
    pub fn combine(windows: &BTreeMap<usize, Vec<OligoProbe>>) -> Vec<Vec<OligoProbe>> {
        let mut non_empty = windows.values().filter(|w| !w.is_empty());
        let Some(first) = non_empty.next() else {
            return Vec::new();
        };
        let mut combinations: Vec<Vec<OligoProbe>> =
            first.iter().map(|p| vec![p.clone()]).collect();
        for window in non_empty {
            let mut grown = Vec::with_capacity(combinations.len() * window.len());
            for probe in window {
                for combination in &combinations {
                    let mut combination = combination.clone();
                    combination.push(probe.clone());
                    grown.push(combination);
                }
            }
            combinations = grown;
        }
        combinations
    }

    /// Builds probe sets from all window sets and writes `probe_sets.tsv`
    pub fn build(&mut self, candidates: &ProbeCandidates) -> Result<()> {
        for (set_id, windows) in candidates {
            let combinations = Self::combine(windows);
            if combinations.is_empty() {
                warn!("No probe candidates found, dropped. [ws{}]", set_id + 1);
                continue;
            }
            info!(
                "Built {} probe set candidates from window set #{}",
                combinations.len(),
                set_id + 1
            );
            for probes in combinations {
                self.probe_sets.push(OligoProbeSet::new(probes)?);
            }
        }
        info!("Built {} probe set candidates in total.", self.probe_sets.len());

        if !self.probe_sets.is_empty() {
            let mut writer = tsv::writer(self.out_path.join("probe_sets.tsv"))?;
            for probe_set in &self.probe_sets {
                writer.serialize(probe_set.features())?;
            }
            writer.flush()?;
        }
        Ok(())
    }

    /// Writes one `probe_set_<i>` folder per probe set
    pub fn export(&self) -> Result<()> {
        info!("Exporting probe sets...");
        for (i, probe_set) in self.probe_sets.iter().enumerate() {
            probe_set.export(self.out_path.join(format!("probe_set_{i}")))?;
        }
        Ok(())
    }
}
