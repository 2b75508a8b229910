use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::{Record, Result};

/// Working set of the scored oligos of one window
///
/// Two masks select the oligos used to build probes: oligos inside the focus
/// window, and oligos passing the score threshold. Oligos are identified by
/// their position in the initial (filtered) list, which stays stable when
/// oligos are discarded.
#[derive(Debug, Clone)]
pub struct OligoGroup {
    ids: Vec<usize>,
    oligos: Vec<Record>,
    scores: Vec<f64>,
    focus: Option<(u32, u32)>,
    in_focus: Vec<bool>,
    passing: Vec<bool>,
}

impl OligoGroup {
    /// Builds a group from scored records sorted by start
    ///
    /// Records without a finite score, or with a score above 1, are dropped.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        let total = records.len();
        let (oligos, scores): (Vec<Record>, Vec<f64>) = records
            .into_iter()
            .filter_map(|r| match r.score {
                Some(score) if score.is_finite() && score <= 1.0 => Some((r, score)),
                _ => None,
            })
            .unzip();
        if oligos.len() < total {
            debug!(
                "Discarded {} oligos with a score above 1",
                total - oligos.len()
            );
        }
        let n = oligos.len();
        Self {
            ids: (0..n).collect(),
            oligos,
            scores,
            focus: None,
            in_focus: vec![true; n],
            passing: vec![true; n],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.oligos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.oligos.is_empty()
    }

    #[must_use]
    pub fn oligos(&self) -> &[Record] {
        &self.oligos
    }

    #[must_use]
    pub fn focus_window(&self) -> Option<(u32, u32)> {
        self.focus
    }

    #[must_use]
    pub fn focus_window_size(&self) -> u32 {
        self.focus.map_or(0, |(s, e)| e - s)
    }

    /// Smallest start and largest end across all oligos
    fn data_extent(&self) -> Option<(u32, u32)> {
        let start = self.oligos.iter().map(|o| o.start).min()?;
        let end = self.oligos.iter().map(|o| o.end).max()?;
        Some((start, end))
    }

    fn update_focus_mask(&mut self) {
        match self.focus {
            Some((start, end)) => {
                for (mask, oligo) in self.in_focus.iter_mut().zip(&self.oligos) {
                    *mask = oligo.start >= start && oligo.end < end;
                }
            }
            None => self.in_focus.fill(true),
        }
    }

    /// Sets the focus window to `[start, end)`
    pub fn set_focus_window(&mut self, start: u32, end: u32) -> Result<()> {
        if end <= start {
            return Err(ConfigError::InvalidFocusWindow(start, end).into());
        }
        self.focus = Some((start, end));
        self.update_focus_mask();
        Ok(())
    }

    /// Sets the focus window to cover every oligo
    pub fn focus_all(&mut self) {
        if let Some((start, end)) = self.data_extent() {
            self.focus = Some((start, end + 1));
            self.update_focus_mask();
        }
    }

    /// Number of oligos in focus, optionally only those passing the threshold
    #[must_use]
    pub fn n_focused(&self, only_usable: bool) -> usize {
        self.in_focus
            .iter()
            .zip(&self.passing)
            .filter(|(&focus, &pass)| focus && (pass || !only_usable))
            .count()
    }

    /// Oligos in focus and passing the threshold, with their ids
    #[must_use]
    pub fn usable(&self) -> Vec<(usize, &Record)> {
        (0..self.oligos.len())
            .filter(|&i| self.in_focus[i] && self.passing[i])
            .map(|i| (self.ids[i], &self.oligos[i]))
            .collect()
    }

    /// Grows the focus until it contains at least `n` oligos, if possible
    pub fn expand_focus_to_n_oligos(&mut self, n: usize) {
        while self.n_focused(false) < n {
            if !self.expand_focus_to_closest() {
                break;
            }
        }
    }

    /// Grows the focus to include the closest oligo outside of it
    ///
    /// Returns `false` when no oligo is left outside the focus.
    pub fn expand_focus_to_closest(&mut self) -> bool {
        let Some((focus_start, focus_end)) = self.focus else {
            return false;
        };
        if self.n_focused(false) == self.oligos.len() {
            return false;
        }

        let earlier = self
            .oligos
            .iter()
            .filter(|o| o.start < focus_start)
            .map(|o| o.start)
            .max();
        let later = self
            .oligos
            .iter()
            .filter(|o| o.end >= focus_end)
            .map(|o| o.end)
            .min();

        let focus = match (earlier, later) {
            (None, None) => return false,
            (Some(start), None) => (start, focus_end),
            (None, Some(end)) => (focus_start, end + 1),
            (Some(start), Some(end)) => {
                if focus_start - start <= end - focus_end {
                    (start, focus_end)
                } else {
                    (focus_start, end + 1)
                }
            }
        };
        self.focus = Some(focus);
        self.update_focus_mask();
        true
    }

    /// Grows both focus borders by half of `step`, within the data extent
    ///
    /// Returns `false` when the focus already covers every oligo.
    pub fn expand_focus_by_step(&mut self, step: u32) -> bool {
        let (Some((focus_start, focus_end)), Some((min_start, max_end))) =
            (self.focus, self.data_extent())
        else {
            return false;
        };
        if focus_start <= min_start && focus_end > max_end {
            return false;
        }
        let half = (step / 2).max(1);
        let start = focus_start.saturating_sub(half).max(min_start.min(focus_start));
        let end = focus_end.saturating_add(half).min((max_end + 1).max(focus_end));
        self.focus = Some((start, end));
        self.update_focus_mask();
        true
    }

    /// Marks oligos with a score up to `threshold` as passing
    pub fn apply_threshold(&mut self, threshold: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::OutOfInterval {
                label: "score threshold",
                value: threshold,
                interval: "[0, 1]",
            }
            .into());
        }
        for (mask, score) in self.passing.iter_mut().zip(&self.scores) {
            *mask = *score <= threshold;
        }
        Ok(())
    }

    pub fn reset_threshold(&mut self) {
        self.passing.fill(true);
    }

    fn retain(&mut self, keep: &[bool]) {
        let mut iter = keep.iter();
        self.ids.retain(|_| *iter.next().unwrap_or(&true));
        let mut iter = keep.iter();
        self.oligos.retain(|_| *iter.next().unwrap_or(&true));
        let mut iter = keep.iter();
        self.scores.retain(|_| *iter.next().unwrap_or(&true));
        let mut iter = keep.iter();
        self.in_focus.retain(|_| *iter.next().unwrap_or(&true));
        let mut iter = keep.iter();
        self.passing.retain(|_| *iter.next().unwrap_or(&true));
    }

    /// Removes oligos overlapping `[start, end)`, including those straddling a border
    fn discard_oligos_in_range(&mut self, start: u32, end: u32) {
        if end <= start {
            return;
        }
        let keep: Vec<bool> = self
            .oligos
            .iter()
            .map(|o| o.end <= start || o.start >= end)
            .collect();
        let before = self.oligos.len();
        self.retain(&keep);
        debug!(
            "Discarded {} oligos in [{}, {})",
            before - self.oligos.len(),
            start,
            end
        );
    }

    /// Removes focused oligos farther than `distance` from the focus borders
    pub fn discard_focused_oligos_safe_dist(&mut self, distance: u32) {
        let focused: Vec<&Record> = (0..self.oligos.len())
            .filter(|&i| self.in_focus[i])
            .map(|i| &self.oligos[i])
            .collect();
        let (Some(first), Some(last)) = (
            focused.iter().map(|o| o.start).min(),
            focused.iter().map(|o| o.end).max(),
        ) else {
            return;
        };
        let start = first.saturating_add(distance);
        let end = (last + 1).saturating_sub(distance);
        self.discard_oligos_in_range(start, end);
    }

    /// Removes focused oligos beyond the first and last `safe_n` chained ones
    ///
    /// From each border of the focus, a chain of `safe_n` oligos at least `gap`
    /// nt apart is kept; focused oligos between the two chains are discarded.
    /// Returns `false` when the focus holds too few oligos.
    pub fn discard_focused_oligos_safe_n(&mut self, safe_n: usize, gap: u32) -> bool {
        let mut focused: Vec<&Record> = (0..self.oligos.len())
            .filter(|&i| self.in_focus[i])
            .map(|i| &self.oligos[i])
            .collect();
        if focused.len() <= 2 * safe_n {
            warn!("Not enough oligos, skipped discard step.");
            return false;
        }
        focused.sort_by_key(|o| o.start);

        let mut left = focused[0].start;
        let mut count = 0;
        for oligo in &focused {
            if count == safe_n {
                break;
            }
            if oligo.start >= left {
                left = oligo.end + gap;
                count += 1;
            }
        }
        if count < safe_n {
            warn!("Not enough oligos, skipped discard step.");
            return false;
        }

        focused.sort_by_key(|o| std::cmp::Reverse(o.end));
        let mut right = i64::from(focused[0].end);
        let mut count = 0;
        for oligo in &focused {
            if count == safe_n {
                break;
            }
            if i64::from(oligo.end) <= right {
                right = i64::from(oligo.start) - i64::from(gap);
                count += 1;
            }
        }
        if count < safe_n {
            warn!("Not enough oligos, skipped discard step.");
            return false;
        }

        let right = right.max(0) as u32;
        self.discard_oligos_in_range(left, right);
        self.update_focus_mask();
        true
    }
}
