//! Window sets partitioning a chromosome region.
//!
//! Windows of one set are non-overlapping and tile the region; sets are
//! shifted by a fraction of the window size so that their windows overlap.
//! Every window carries an optional central focus region (CFR), absent when
//! the focus would cover the whole window.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ReadError};
use crate::Result;

/// One window of a window set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start: u32,
    pub mid: f64,
    pub end: u32,
    /// Central focus region, `None` when the focus is the whole window
    pub focus: Option<(u32, u32)>,
    pub window_id: usize,
    pub set_id: usize,
}

impl Window {
    const FIELDS: [&'static str; 7] = ["start", "mid", "end", "cfr_start", "cfr_end", "w", "s"];

    /// Column labels of the window table
    #[must_use]
    pub fn header() -> [&'static str; 7] {
        Self::FIELDS
    }

    /// Table row: start, mid, end, `cfr_start`, `cfr_end`, w, s
    ///
    /// A missing focus is written as `nan`.
    #[must_use]
    pub fn fields(&self) -> [String; 7] {
        let (cfr_start, cfr_end) = self.focus.map_or_else(
            || ("nan".to_string(), "nan".to_string()),
            |(s, e)| (s.to_string(), e.to_string()),
        );
        [
            self.start.to_string(),
            self.mid.to_string(),
            self.end.to_string(),
            cfr_start,
            cfr_end,
            self.window_id.to_string(),
            self.set_id.to_string(),
        ]
    }

    /// Parses a row written by [`fields`](Self::fields)
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self> {
        if fields.len() != Self::FIELDS.len() {
            return Err(ReadError::FieldCount {
                expected: Self::FIELDS.len(),
                got: fields.len(),
            }
            .into());
        }
        let get = |i: usize| fields[i].as_ref();
        let focus = match (get(3), get(4)) {
            ("nan", _) | (_, "nan") => None,
            (s, e) => Some((s.parse()?, e.parse()?)),
        };
        Ok(Self {
            start: get(0).parse()?,
            mid: get(1).parse()?,
            end: get(2).parse()?,
            focus,
            window_id: get(5).parse()?,
            set_id: get(6).parse()?,
        })
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.end - self.start
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "window {} of set {} [{}, {})",
            self.window_id, self.set_id, self.start, self.end
        )
    }
}

/// How the window size is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowSizing {
    /// Size derived from the number of probes to design
    ProbeCount(u32),
    /// Explicit size in nt
    Size(u32),
}

/// Window and focus parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Region start
    pub start: u32,
    /// Region end; equal to `start` for full-chromosome growing mode
    pub end: u32,
    pub sizing: WindowSizing,
    /// Shift between window sets, as a fraction of the window size
    pub shift: f64,
    /// Focus size in nt, or fraction of the window size when at most 1
    pub focus_style: f64,
    /// Focus step in nt, or fraction of the focus size when at most 1
    pub step_style: f64,
}

impl WindowSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.shift > 0.0 && self.shift <= 1.0) {
            return Err(ConfigError::OutOfInterval {
                label: "window shift",
                value: self.shift,
                interval: "(0, 1]",
            }
            .into());
        }
        if self.focus_style <= 0.0 {
            return Err(ConfigError::NonPositive("focus size").into());
        }
        if self.step_style <= 0.0 {
            return Err(ConfigError::NonPositive("focus step").into());
        }
        match self.sizing {
            WindowSizing::ProbeCount(0) => {
                return Err(ConfigError::NonPositive("number of probes").into())
            }
            WindowSizing::Size(0) => return Err(ConfigError::NonPositive("window size").into()),
            WindowSizing::ProbeCount(_) if self.is_growing() => {
                return Err(ConfigError::MissingWindowSize.into())
            }
            _ => {}
        }
        if self.end < self.start {
            return Err(ConfigError::InvalidRegion(self.start, i64::from(self.end)).into());
        }
        Ok(())
    }

    /// Whether windows are grown on demand over the whole chromosome
    #[must_use]
    pub fn is_growing(&self) -> bool {
        self.start == self.end
    }
}

/// Table of windows, walked in order of window end
#[derive(Debug, Clone)]
pub struct WindowSets {
    settings: WindowSettings,
    window_size: u32,
    focus_size: u32,
    focus_step: u32,
    windows: Vec<Window>,
    current: usize,
}

impl WindowSets {
    pub fn new(settings: WindowSettings) -> Result<Self> {
        settings.validate()?;
        let window_size = match settings.sizing {
            WindowSizing::Size(size) => size,
            WindowSizing::ProbeCount(1) => settings.end - settings.start,
            WindowSizing::ProbeCount(count) => (settings.end - settings.start) / (count + 1),
        };
        if window_size == 0 {
            return Err(ConfigError::NonPositive("window size").into());
        }
        let focus_size = if settings.focus_style > 1.0 {
            settings.focus_style as u32
        } else {
            (settings.focus_style * f64::from(window_size)) as u32
        };
        let focus_step = if settings.step_style > 1.0 {
            settings.step_style as u32
        } else {
            (settings.step_style * f64::from(focus_size)) as u32
        };
        let mut sets = Self {
            settings,
            window_size,
            focus_size,
            focus_step,
            windows: Vec::new(),
            current: 0,
        };
        if settings.is_growing() {
            sets.windows.push(sets.window_at(settings.start, 0, 0));
        } else {
            sets.init_windows()?;
        }
        Ok(sets)
    }

    fn init_windows(&mut self) -> Result<()> {
        let (start, end) = (self.settings.start, self.settings.end);
        let mut starts: Vec<u32> = (start..end).step_by(self.window_size as usize).collect();
        if (end - start) % self.window_size != 0 || starts.len() != 1 {
            starts.pop();
        }
        if starts.is_empty() {
            return Err(ConfigError::NonPositive("number of windows").into());
        }

        let n_sets = ((1.0 / self.settings.shift) + 1e-9).floor() as usize;
        for set_id in 0..n_sets.max(1) {
            let offset = (set_id as f64 * self.settings.shift * f64::from(self.window_size)) as u32;
            for (window_id, &window_start) in starts.iter().enumerate() {
                self.windows
                    .push(self.window_at(window_start + offset, window_id, set_id));
            }
        }
        self.windows.sort_by_key(|w| (w.end, w.set_id, w.window_id));
        Ok(())
    }

    fn window_at(&self, start: u32, window_id: usize, set_id: usize) -> Window {
        let mid = f64::from(start) + f64::from(self.window_size) / 2.0;
        let focus = (self.focus_size < self.window_size).then(|| {
            let half = f64::from(self.focus_size) / 2.0;
            ((mid - half).floor() as u32, (mid + half).floor() as u32)
        });
        Window {
            start,
            mid,
            end: start + self.window_size,
            focus,
            window_id,
            set_id,
        }
    }

    /// Appends the next window in growing mode
    ///
    /// The new window is the last one shifted forward; it joins the earliest
    /// set whose windows all end by its start, or opens a new set.
    fn add_window(&mut self) {
        let Some(last) = self.windows.last() else {
            return;
        };
        let shift = ((self.settings.shift * f64::from(self.window_size)) as u32).max(1);
        let start = last.start + shift;

        let mut set_ends: Vec<(u32, usize)> = Vec::new();
        for window in &self.windows {
            match set_ends.get_mut(window.set_id) {
                Some(entry) => *entry = (entry.0.max(window.end), entry.1 + 1),
                None => set_ends.push((window.end, 1)),
            }
        }
        let (set_id, window_id) = set_ends
            .iter()
            .position(|&(end, _)| end <= start)
            .map_or((set_ends.len(), 0), |set_id| (set_id, set_ends[set_id].1));
        let window = self.window_at(start, window_id, set_id);
        self.windows.push(window);
    }

    #[must_use]
    pub fn current(&self) -> &Window {
        &self.windows[self.current]
    }

    /// Moves to the next window, growing the table in growing mode
    ///
    /// Returns `false` when the last window was already reached.
    pub fn go_to_next_window(&mut self) -> bool {
        if self.settings.is_growing() {
            self.add_window();
        } else if self.reached_last_window() {
            return false;
        }
        self.current += 1;
        true
    }

    #[must_use]
    pub fn reached_last_window(&self) -> bool {
        !self.settings.is_growing() && self.current + 1 >= self.windows.len()
    }

    #[must_use]
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// Windows of one set, in window order
    #[must_use]
    pub fn set_windows(&self, set_id: usize) -> Vec<Window> {
        let mut windows: Vec<Window> = self
            .windows
            .iter()
            .filter(|w| w.set_id == set_id)
            .copied()
            .collect();
        windows.sort_by_key(|w| w.window_id);
        windows
    }

    #[must_use]
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    #[must_use]
    pub fn focus_size(&self) -> u32 {
        self.focus_size
    }

    #[must_use]
    pub fn focus_step(&self) -> u32 {
        self.focus_step
    }

    #[must_use]
    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    /// Coordinate past which no record is needed
    #[must_use]
    pub fn destination(&self) -> Option<u32> {
        (!self.settings.is_growing()).then_some(self.settings.end)
    }
}
