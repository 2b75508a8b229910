use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::oligo_probe::OligoProbe;
use super::path::OligoPathBuilder;
use crate::error::{ConfigError, ProbeError};
use crate::oligo::{OligoGroup, ScoreSettings};
use crate::window::Window;
use crate::Result;

/// Tolerance on accumulated score thresholds
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Parameters of probe construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeBuilderConfig {
    /// Oligos per probe (N)
    pub oligos_per_probe: usize,
    /// Minimum distance between consecutive oligos (D)
    pub min_gap: u32,
    /// Half-width of the melting temperature range (Tr)
    pub tm_half_width: f64,
    /// Maximum probe span in nt (Ps)
    pub max_probe_size: u32,
    /// Maximum gap as a fraction of the probe span (Ph)
    pub max_hole_fraction: f64,
    /// Shared oligo fraction above which two probes are merged (Po)
    pub overlap_fraction: f64,
    /// Score threshold relaxation step (Ot)
    pub score_step: f64,
    /// Fixed oligo length, if any (k)
    pub oligo_length: Option<u32>,
    pub scoring: ScoreSettings,
}

impl Default for ProbeBuilderConfig {
    fn default() -> Self {
        Self {
            oligos_per_probe: 48,
            min_gap: 2,
            tm_half_width: 10.0,
            max_probe_size: 10_000,
            max_hole_fraction: 0.1,
            overlap_fraction: 0.5,
            score_step: 0.1,
            oligo_length: None,
            scoring: ScoreSettings::default(),
        }
    }
}

impl ProbeBuilderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.oligos_per_probe == 0 {
            return Err(ConfigError::NonPositive("oligos per probe").into());
        }
        if self.tm_half_width <= 0.0 {
            return Err(ConfigError::NonPositive("melting temperature half-width").into());
        }
        if self.max_probe_size <= 1 {
            return Err(ConfigError::OutOfInterval {
                label: "probe size",
                value: f64::from(self.max_probe_size),
                interval: "(1, inf)",
            }
            .into());
        }
        for (label, value) in [
            ("hole fraction", self.max_hole_fraction),
            ("overlap fraction", self.overlap_fraction),
            ("score step", self.score_step),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::OutOfInterval {
                    label,
                    value,
                    interval: "(0, 1]",
                }
                .into());
            }
        }
        if let Some(k) = self.oligo_length {
            if k == 0 {
                return Err(ConfigError::NonPositive("oligo length").into());
            }
            let needed = u64::from(k + self.min_gap) * self.oligos_per_probe as u64;
            if needed > u64::from(self.max_probe_size) {
                return Err(ConfigError::OligoLengthExceedsProbeSize {
                    k,
                    d: self.min_gap,
                    n: self.oligos_per_probe,
                    ps: self.max_probe_size,
                }
                .into());
            }
        }
        self.scoring.validate()
    }
}

/// Builds the probes of one window from its oligo group
#[derive(Debug, Clone)]
pub struct OligoProbeBuilder {
    config: ProbeBuilderConfig,
    paths: OligoPathBuilder,
}

impl OligoProbeBuilder {
    pub fn new(config: ProbeBuilderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            paths: OligoPathBuilder {
                oligos_per_probe: config.oligos_per_probe,
                min_gap: config.min_gap,
                tm_half_width: config.tm_half_width,
                max_probe_size: config.max_probe_size,
                max_hole_fraction: config.max_hole_fraction,
            },
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProbeBuilderConfig {
        &self.config
    }

    /// Logs the construction parameters
    pub fn log_prologue(&self) {
        let c = &self.config;
        info!("Aim to build probes with {} oligos each", c.oligos_per_probe);
        if let Some(k) = c.oligo_length {
            info!("Oligo length set to {k} nt");
        }
        info!("Off-target threshold range set at {:?}", c.scoring.off_target_range);
        let (g0, g1) = c.scoring.free_energy_range;
        if g0 < 0.0 {
            info!("Secondary structure dG threshold range set at [{g0}, {g1}] kcal/mol");
        } else {
            info!("Secondary structure dG threshold range set at [{g0}, {g1}] of the hybrid dG");
        }
        info!("Oligo score relaxation step set to {}", c.score_step);
        info!("Melting temperature range of {} degC", 2.0 * c.tm_half_width);
        info!("Min. consecutive oligo distance of {} nt", c.min_gap);
        info!("Probe size threshold of {} nt", c.max_probe_size);
        info!("Maximum hole size of {} of the probe size", c.max_hole_fraction);
        info!("Probes sharing {} of their oligos are merged", c.overlap_fraction);
    }

    /// Builds candidate probes for a window
    ///
    /// Windows without a central focus region use all their oligos at once.
    /// Otherwise the search starts from the focus and, when no probe is
    /// found, the focus grows by `focus_step` until the group is exhausted.
    pub fn start(
        &self,
        group: &mut OligoGroup,
        window: &Window,
        focus_step: u32,
    ) -> Result<Vec<OligoProbe>> {
        let n = self.config.oligos_per_probe;
        match window.focus {
            None => group.focus_all(),
            Some((start, end)) => {
                group.set_focus_window(start, end)?;
                group.expand_focus_to_n_oligos(n);
            }
        }

        let mut probes = self.explore_filter(group)?;
        if window.focus.is_some() {
            while probes.is_empty() {
                group.reset_threshold();
                if group.focus_window_size() >= self.config.max_probe_size {
                    group.discard_focused_oligos_safe_n(n.saturating_sub(1), self.config.min_gap);
                }
                if !group.expand_focus_by_step(focus_step) {
                    break;
                }
                let (start, end) = group.focus_window().unwrap_or_default();
                debug!("Expanded focus to [{start}, {end})");
                probes = self.explore_filter(group)?;
            }
        }
        Ok(probes)
    }

    /// Relaxes the score threshold until a probe is found
    fn explore_filter(&self, group: &mut OligoGroup) -> Result<Vec<OligoProbe>> {
        let step = self.config.score_step;
        let max_score = if group.focus_window_size() < self.config.max_probe_size {
            debug!("Score relaxation deactivated when focus region is smaller than probe size threshold");
            0.0
        } else {
            1.0
        };

        let mut steps = 0u32;
        group.apply_threshold(0.0)?;
        let mut n_usable = group.n_focused(true);
        if max_score == 0.0 && n_usable == 0 {
            debug!("No oligos with score == 0 in focus region");
            return Ok(Vec::new());
        }
        while n_usable == 0 && f64::from(steps + 1) * step <= max_score + THRESHOLD_EPSILON {
            steps += 1;
            group.apply_threshold((f64::from(steps) * step).min(1.0))?;
            n_usable = group.n_focused(true);
        }

        let n_focused = group.n_focused(false);
        let mut probes = self.build_probes(group)?;
        let mut n_previous = n_usable;
        while probes.is_empty() {
            steps += 1;
            let threshold = f64::from(steps) * step;
            if threshold > max_score + THRESHOLD_EPSILON {
                break;
            }
            group.apply_threshold(threshold.min(1.0))?;
            let n_usable = group.n_focused(true);
            if n_usable == n_previous || n_usable == 0 {
                continue;
            }
            debug!("Relaxed score threshold to {threshold:.3} ({n_usable} usable oligos)");
            probes = self.build_probes(group)?;
            if n_usable == n_focused {
                warn!("All oligos included. Score relaxation ineffective.");
                break;
            }
            n_previous = n_usable;
        }
        Ok(probes)
    }

    /// Builds probes from the currently usable oligos
    fn build_probes(&self, group: &OligoGroup) -> Result<Vec<OligoProbe>> {
        let usable = group.usable();
        let records: Vec<_> = usable.iter().map(|(_, r)| *r).collect();
        let (paths, polls) = self.paths.find_paths(&records);
        debug!(
            "{} usable oligos, built {} probe candidates ({polls})",
            usable.len(),
            paths.len()
        );
        paths
            .into_iter()
            .map(|path| {
                OligoProbe::new(
                    path.into_iter()
                        .map(|i| (usable[i].0, usable[i].1.clone()))
                        .collect(),
                )
            })
            .collect()
    }

    /// Merges candidate probes sharing many oligos
    ///
    /// Probes are sorted by start and walked consecutively; whenever the
    /// current probe shares at least `overlap_fraction * N` oligos with the
    /// next one, only the better of the two is kept.
    ///
    /// Only neighbours in start order are compared. With oligos of different
    /// lengths, interleaved probes can separate two overlapping ones, and both
    /// are then kept.
    pub fn reduce_probe_list(&self, mut probes: Vec<OligoProbe>) -> Result<Vec<OligoProbe>> {
        if probes.len() <= 1 {
            return Ok(probes);
        }
        probes.sort_by_key(|p| p.range().0);
        let threshold = self.config.overlap_fraction * self.config.oligos_per_probe as f64;

        let mut selected = Vec::new();
        let mut probes = probes.into_iter();
        let Some(mut reference) = probes.next() else {
            return Ok(selected);
        };
        for probe in probes {
            let shared = reference.count_shared_oligos(&probe);
            if shared == reference.n_oligos() && shared == probe.n_oligos() {
                return Err(ProbeError::DuplicateProbes(probe.path().to_vec()).into());
            }
            if shared as f64 >= threshold {
                reference = select_probe_from_pair(reference, probe);
            } else {
                selected.push(std::mem::replace(&mut reference, probe));
            }
        }
        selected.push(reference);
        Ok(selected)
    }
}

/// Picks the better of two overlapping probes
///
/// The first probe wins when it is smaller, or when its melting temperature
/// range is narrower, or when its spacing is more regular; otherwise the
/// second probe is kept.
#[must_use]
pub fn select_probe_from_pair(first: OligoProbe, second: OligoProbe) -> OligoProbe {
    if first.size() < second.size() {
        return first;
    }
    if first.tm_range() < second.tm_range() {
        return first;
    }
    if first.spread() / first.d_mean() < second.spread() / second.d_mean() {
        return first;
    }
    second
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::db::testing::synthetic_records;
    use crate::Record;

    fn window(focus: Option<(u32, u32)>, start: u32, end: u32) -> Window {
        Window {
            start,
            mid: f64::from(start + end) / 2.0,
            end,
            focus,
            window_id: 0,
            set_id: 0,
        }
    }

    fn scored(records: Vec<Record>, scores: impl Fn(usize) -> f64) -> Vec<Record> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.with_score(scores(i)))
            .collect()
    }

    fn config(n: usize, max_probe_size: u32) -> ProbeBuilderConfig {
        ProbeBuilderConfig {
            oligos_per_probe: n,
            max_probe_size,
            ..ProbeBuilderConfig::default()
        }
    }

    fn probe_from(ids: &[usize], records: &[Record]) -> Result<OligoProbe> {
        OligoProbe::new(ids.iter().map(|&i| (i, records[i].clone())).collect())
    }

    #[test]
    fn test_config_validation() {
        assert!(ProbeBuilderConfig::default().validate().is_ok());
        let mut c = ProbeBuilderConfig {
            oligo_length: Some(200),
            ..ProbeBuilderConfig::default()
        };
        assert!(c.validate().is_err());
        c.oligo_length = Some(40);
        assert!(c.validate().is_ok());
        c.overlap_fraction = 0.0;
        assert!(c.validate().is_err());
        c.overlap_fraction = 0.5;
        c.max_probe_size = 1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_evenly_spaced_window() -> Result<()> {
        let records = scored(synthetic_records("chr1", 100, 10, 8), |_| 0.0);
        let builder = OligoProbeBuilder::new(config(10, 500))?;
        let mut group = OligoGroup::new(records);
        let probes = builder.start(&mut group, &window(None, 0, 1000), 0)?;
        assert!(!probes.is_empty());
        for probe in &probes {
            assert_eq!(probe.n_oligos(), 10);
            assert!(probe.size() <= 500);
        }
        Ok(())
    }

    #[test]
    fn test_relaxation_finds_probe() -> Result<()> {
        // only one oligo in three has a perfect score
        let records = scored(synthetic_records("chr1", 60, 10, 8), |i| {
            if i % 3 == 0 {
                0.0
            } else {
                0.35
            }
        });
        let builder = OligoProbeBuilder::new(config(30, 500))?;
        let mut group = OligoGroup::new(records);
        let probes = builder.start(&mut group, &window(None, 0, 600), 0)?;
        assert!(!probes.is_empty());
        // threshold reached 0.4 to include the other oligos
        assert_eq!(group.n_focused(true), 60);
        Ok(())
    }

    #[test]
    fn test_no_relaxation_in_small_focus() -> Result<()> {
        let records = scored(synthetic_records("chr1", 60, 10, 8), |i| {
            if i % 3 == 0 {
                0.0
            } else {
                0.35
            }
        });
        let builder = OligoProbeBuilder::new(config(30, 5000))?;
        let mut group = OligoGroup::new(records);
        let probes = builder.start(&mut group, &window(None, 0, 600), 0)?;
        assert!(probes.is_empty());
        Ok(())
    }

    #[test]
    fn test_focus_expansion() -> Result<()> {
        let records = scored(synthetic_records("chr1", 100, 10, 8), |_| 0.0);
        let builder = OligoProbeBuilder::new(config(20, 250))?;
        let mut group = OligoGroup::new(records);
        // focus holds 5 oligos, probes need 20
        let probes = builder.start(&mut group, &window(Some((480, 530)), 0, 1000), 40)?;
        assert!(!probes.is_empty());
        let (start, end) = group.focus_window().unwrap_or_default();
        assert!(start < 480 && end > 530);
        Ok(())
    }

    #[test]
    fn test_exhausted_window() -> Result<()> {
        let records = scored(synthetic_records("chr1", 8, 10, 8), |_| 0.0);
        let builder = OligoProbeBuilder::new(config(10, 500))?;
        let mut group = OligoGroup::new(records);
        let probes = builder.start(&mut group, &window(Some((20, 50)), 0, 100), 20)?;
        assert!(probes.is_empty());
        Ok(())
    }

    #[test]
    fn test_reduce_merges_overlapping_pair() -> Result<()> {
        let records = synthetic_records("chr1", 20, 10, 8);
        let builder = OligoProbeBuilder::new(config(10, 500))?;
        // share 6 of 10 oligos; the second is wider
        let a = probe_from(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9], &records)?;
        let b = probe_from(&[4, 5, 6, 7, 8, 9, 10, 11, 12, 14], &records)?;
        let reduced = builder.reduce_probe_list(vec![b, a])?;
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].path()[0], 0);
        Ok(())
    }

    #[test]
    fn test_reduce_keeps_distinct_probes() -> Result<()> {
        let records = synthetic_records("chr1", 30, 10, 8);
        let builder = OligoProbeBuilder::new(config(10, 500))?;
        let a = probe_from(&(0..10).collect::<Vec<_>>(), &records)?;
        let b = probe_from(&(6..16).collect::<Vec<_>>(), &records)?;
        let c = probe_from(&(20..30).collect::<Vec<_>>(), &records)?;
        let reduced = builder.reduce_probe_list(vec![c, b, a])?;
        assert_eq!(reduced.len(), 3);
        assert!(reduced.windows(2).all(|w| w[0].range().0 <= w[1].range().0));
        for pair in reduced.windows(2) {
            assert!((pair[0].count_shared_oligos(&pair[1]) as f64) < 5.0);
        }
        Ok(())
    }

    #[test]
    fn test_reduce_compares_neighbours_only() -> Result<()> {
        // long oligos on even ids, short ones on odd ids
        let records: Vec<Record> = synthetic_records("chr1", 11, 10, 8)
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                if i % 2 == 1 {
                    r.end = r.start + 3;
                    r.sequence.truncate(3);
                }
                r
            })
            .collect();
        let builder = OligoProbeBuilder::new(config(5, 500))?;
        let a = probe_from(&[0, 2, 4, 6, 8], &records)?;
        let b = probe_from(&[1, 3, 5, 7, 9], &records)?;
        let c = probe_from(&[2, 4, 6, 8, 10], &records)?;
        let reduced = builder.reduce_probe_list(vec![c, a, b])?;

        assert_eq!(reduced.len(), 3);
        for pair in reduced.windows(2) {
            assert_eq!(pair[0].count_shared_oligos(&pair[1]), 0);
        }
        // the outer probes are never compared
        assert_eq!(reduced[0].count_shared_oligos(&reduced[2]), 4);
        Ok(())
    }

    #[test]
    fn test_reduce_rejects_duplicates() -> Result<()> {
        let records = synthetic_records("chr1", 10, 10, 8);
        let builder = OligoProbeBuilder::new(config(10, 500))?;
        let a = probe_from(&(0..10).collect::<Vec<_>>(), &records)?;
        assert!(builder.reduce_probe_list(vec![a.clone(), a]).is_err());
        Ok(())
    }

    #[test]
    fn test_pair_tie_break() -> Result<()> {
        let mut records = synthetic_records("chr1", 10, 10, 8);
        let narrow = probe_from(&[0, 1, 2], &records)?;
        let wide = probe_from(&[0, 2, 4], &records)?;
        assert_eq!(select_probe_from_pair(wide.clone(), narrow.clone()).path(), narrow.path());
        assert_eq!(select_probe_from_pair(narrow.clone(), wide).path(), narrow.path());

        records[2].tm = 70.0;
        let hot = probe_from(&[1, 2, 3], &records)?;
        let cool = probe_from(&[4, 5, 6], &records)?;
        assert_eq!(select_probe_from_pair(hot, cool.clone()).path(), cool.path());
        Ok(())
    }
}
