use std::collections::BTreeSet;
use std::fmt;

use crate::Record;

/// Outcome of the path filter for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVerdict {
    /// Accepted
    Pass,
    /// Spans more than the maximum probe size
    TooLarge,
    /// Holds a gap larger than the allowed fraction of its span
    HoleTooLarge,
    /// Melting temperatures spread over more than twice the half-width
    MeltingRange,
}

/// Tally of the reasons candidate paths were kept or dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitPolls {
    pub passed: usize,
    pub too_short: usize,
    pub too_large: usize,
    pub hole: usize,
    pub melting: usize,
}

impl ExitPolls {
    fn record(&mut self, verdict: PathVerdict) {
        match verdict {
            PathVerdict::Pass => self.passed += 1,
            PathVerdict::TooLarge => self.too_large += 1,
            PathVerdict::HoleTooLarge => self.hole += 1,
            PathVerdict::MeltingRange => self.melting += 1,
        }
    }
}

impl fmt::Display for ExitPolls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}P{}N{}S{}H{}T",
            self.passed, self.too_short, self.too_large, self.hole, self.melting
        )
    }
}

/// Builds candidate probes as chains of non-overlapping oligos
#[derive(Debug, Clone, Copy)]
pub struct OligoPathBuilder {
    /// Oligos per probe
    pub oligos_per_probe: usize,
    /// Minimum distance between consecutive oligos
    pub min_gap: u32,
    /// Half-width of the allowed melting temperature range
    pub tm_half_width: f64,
    /// Maximum probe span in nt
    pub max_probe_size: u32,
    /// Maximum gap, as a fraction of the probe span
    pub max_hole_fraction: f64,
}

impl OligoPathBuilder {
    /// Maximal greedy chains of non-overlapping oligos
    ///
    /// `oligos` must be sorted by start. Each oligo is followed by the
    /// leftmost oligo starting at least `min_gap` nt after its end. One chain
    /// is built from every oligo that no other oligo is followed by; chains
    /// from the remaining oligos are suffixes of those.
    #[must_use]
    pub fn non_overlapping_paths(oligos: &[&Record], min_gap: u32) -> BTreeSet<Vec<usize>> {
        let successors: Vec<Option<usize>> = oligos
            .iter()
            .map(|oligo| {
                let threshold = u64::from(oligo.end) + u64::from(min_gap);
                let next = oligos.partition_point(|o| u64::from(o.start) < threshold);
                (next < oligos.len()).then_some(next)
            })
            .collect();

        let mut claimed = vec![false; oligos.len()];
        for next in successors.iter().flatten() {
            claimed[*next] = true;
        }

        let mut paths = BTreeSet::new();
        for first in (0..oligos.len()).filter(|&i| !claimed[i]) {
            let mut path = vec![first];
            let mut current = first;
            while let Some(next) = successors[current] {
                path.push(next);
                current = next;
            }
            paths.insert(path);
        }
        paths
    }

    /// Slices every chain into all its sub-chains of exactly `oligos_per_probe`
    fn size_paths(&self, paths: &BTreeSet<Vec<usize>>, polls: &mut ExitPolls) -> BTreeSet<Vec<usize>> {
        let n = self.oligos_per_probe;
        let mut sized = BTreeSet::new();
        for path in paths {
            if path.len() < n {
                polls.too_short += 1;
                continue;
            }
            for window in path.windows(n) {
                sized.insert(window.to_vec());
            }
        }
        sized
    }

    /// Checks span, largest gap and melting temperature range of a path
    #[must_use]
    pub fn path_verdict(&self, path: &[usize], oligos: &[&Record]) -> PathVerdict {
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            return PathVerdict::TooLarge;
        };
        let span = f64::from(oligos[last].end) - f64::from(oligos[first].start);
        if f64::from(self.max_probe_size) < span {
            return PathVerdict::TooLarge;
        }
        let max_hole = path
            .windows(2)
            .map(|pair| f64::from(oligos[pair[1]].start) - f64::from(oligos[pair[0]].end))
            .fold(f64::NEG_INFINITY, f64::max);
        if self.max_hole_fraction * span < max_hole {
            return PathVerdict::HoleTooLarge;
        }
        let (tm_min, tm_max) = path
            .iter()
            .map(|&i| f64::from(oligos[i].tm))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), tm| {
                (lo.min(tm), hi.max(tm))
            });
        if 2.0 * self.tm_half_width < tm_max - tm_min {
            return PathVerdict::MeltingRange;
        }
        PathVerdict::Pass
    }

    /// Sized paths passing the filter, with the tally of exit reasons
    #[must_use]
    pub fn filter_paths(
        &self,
        paths: &BTreeSet<Vec<usize>>,
        oligos: &[&Record],
    ) -> (Vec<Vec<usize>>, ExitPolls) {
        let mut polls = ExitPolls::default();
        let mut selected = Vec::new();
        for path in self.size_paths(paths, &mut polls) {
            let verdict = self.path_verdict(&path, oligos);
            polls.record(verdict);
            if verdict == PathVerdict::Pass {
                selected.push(path);
            }
        }
        (selected, polls)
    }

    /// Runs path search and filtering over usable oligos
    #[must_use]
    pub fn find_paths(&self, oligos: &[&Record]) -> (Vec<Vec<usize>>, ExitPolls) {
        let paths = Self::non_overlapping_paths(oligos, self.min_gap);
        self.filter_paths(&paths, oligos)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::db::testing::synthetic_records;
    use proptest::prelude::*;

    fn builder(n: usize) -> OligoPathBuilder {
        OligoPathBuilder {
            oligos_per_probe: n,
            min_gap: 2,
            tm_half_width: 10.0,
            max_probe_size: 500,
            max_hole_fraction: 0.1,
        }
    }

    #[test]
    fn test_evenly_spaced_chain() {
        let records = synthetic_records("chr1", 100, 10, 8);
        let oligos: Vec<&Record> = records.iter().collect();
        let paths = OligoPathBuilder::non_overlapping_paths(&oligos, 2);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths.iter().next().map(Vec::len), Some(100));

        let (probes, polls) = builder(10).find_paths(&oligos);
        assert_eq!(probes.len(), 91);
        assert_eq!(polls.passed, 91);
        assert!(probes.iter().all(|p| p.len() == 10));
    }

    #[test]
    fn test_overlapping_oligos_split_chains() {
        // oligos of 8 nt every 5 nt: consecutive ones overlap
        let records = synthetic_records("chr1", 20, 5, 8);
        let oligos: Vec<&Record> = records.iter().collect();
        let paths = OligoPathBuilder::non_overlapping_paths(&oligos, 2);
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert!(path.windows(2).all(|w| w[1] == w[0] + 2));
        }
    }

    #[test]
    fn test_short_chains_are_tallied() {
        let records = synthetic_records("chr1", 5, 10, 8);
        let oligos: Vec<&Record> = records.iter().collect();
        let (probes, polls) = builder(10).find_paths(&oligos);
        assert!(probes.is_empty());
        assert_eq!(polls.too_short, 1);
        assert_eq!(polls.to_string(), "0P1N0S0H0T");
    }

    #[test]
    fn test_filter_verdicts() {
        let mut records = synthetic_records("chr1", 10, 10, 8);
        let oligos: Vec<&Record> = records.iter().collect();
        let mut strict = builder(3);
        strict.max_probe_size = 20;
        assert_eq!(strict.path_verdict(&[0, 1, 2], &oligos), PathVerdict::TooLarge);
        assert_eq!(builder(3).path_verdict(&[0, 1, 5], &oligos), PathVerdict::HoleTooLarge);
        assert_eq!(builder(3).path_verdict(&[0, 1, 2], &oligos), PathVerdict::Pass);

        records[1].tm = 90.0;
        let oligos: Vec<&Record> = records.iter().collect();
        assert_eq!(builder(3).path_verdict(&[0, 1, 2], &oligos), PathVerdict::MeltingRange);
    }

    proptest! {
        #[test]
        fn prop_paths_respect_gap(
            intervals in proptest::collection::btree_map(0u32..5_000, 1u32..60, 1..150),
            gap in 0u32..20,
            n in 1usize..6,
        ) {
            let records: Vec<Record> = intervals
                .iter()
                .map(|(&start, &len)| Record { start, end: start + len, tm: 60.0, ..Record::default() })
                .collect();
            let oligos: Vec<&Record> = records.iter().collect();
            let builder = OligoPathBuilder {
                oligos_per_probe: n,
                min_gap: gap,
                tm_half_width: 10.0,
                max_probe_size: u32::MAX,
                max_hole_fraction: 1.0,
            };
            let (paths, polls) = builder.find_paths(&oligos);
            prop_assert_eq!(paths.len(), polls.passed);
            for path in paths {
                prop_assert_eq!(path.len(), n);
                for pair in path.windows(2) {
                    prop_assert!(oligos[pair[1]].start >= oligos[pair[0]].end + gap);
                }
            }
        }
    }
}
