use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, WriteError};
use crate::parallel::resolve_threads;
use crate::probe::ProbeBuilderConfig;
use crate::window::{WindowSettings, WindowSizing};
use crate::Result;

/// Parameters of one probe design run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    pub database: PathBuf,
    pub chromosome: String,
    pub output: PathBuf,
    /// Region start and end; an end of at most 0 selects the whole chromosome
    pub region: (u32, i64),
    /// Number of probes to design, one per window
    pub probes: Option<u32>,
    /// Explicit window size in nt
    pub window_size: Option<u32>,
    /// Shift between window sets, as a fraction of the window size
    pub window_shift: f64,
    /// Design a single probe over the whole region
    pub single: bool,
    /// Focus size in nt, or fraction of the window size when at most 1
    pub focus_size: f64,
    /// Focus step in nt, or fraction of the focus size when at most 1
    pub focus_step: f64,
    pub builder: ProbeBuilderConfig,
    pub threads: usize,
    /// Load windows completed by a previous run into the same output
    pub reuse: bool,
}

impl QuerySettings {
    #[must_use]
    pub fn new(database: PathBuf, chromosome: String, output: PathBuf) -> Self {
        Self {
            database,
            chromosome,
            output,
            region: (0, -1),
            probes: None,
            window_size: None,
            window_shift: 0.1,
            single: false,
            focus_size: 8000.0,
            focus_step: 1000.0,
            builder: ProbeBuilderConfig::default(),
            threads: 1,
            reuse: false,
        }
    }

    /// Checks every parameter before anything is read or written
    pub fn validate(&self) -> Result<()> {
        if self.output.exists() && !self.reuse {
            return Err(WriteError::OutputExists(self.output.clone()).into());
        }
        self.builder.validate()?;
        self.window_settings()?.validate()
    }

    /// Worker pool size, bounded by the available cores
    #[must_use]
    pub fn threads(&self) -> usize {
        resolve_threads(self.threads.max(1))
    }

    /// Window layout derived from the region and sizing options
    ///
    /// A single probe uses one window over the whole region. Without a
    /// region end, windows of a fixed size grow over the whole chromosome.
    pub fn window_settings(&self) -> Result<WindowSettings> {
        let (start, end) = self.region;
        let end = if end <= 0 {
            start
        } else {
            let end = u32::try_from(end).map_err(|_| ConfigError::InvalidRegion(start, end))?;
            if end <= start {
                return Err(ConfigError::InvalidRegion(start, i64::from(end)).into());
            }
            end
        };

        let (sizing, shift) = if self.single {
            (WindowSizing::ProbeCount(1), 1.0)
        } else {
            let sizing = match (self.probes, self.window_size) {
                (Some(n), None) => WindowSizing::ProbeCount(n),
                (None, Some(size)) => WindowSizing::Size(size),
                (None, None) if start == end => return Err(ConfigError::MissingWindowSize.into()),
                _ => return Err(ConfigError::AmbiguousWindowMode.into()),
            };
            (sizing, self.window_shift)
        };

        Ok(WindowSettings {
            start,
            end,
            sizing,
            shift,
            focus_style: self.focus_size,
            step_style: self.focus_step,
        })
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn settings() -> QuerySettings {
        QuerySettings::new("db".into(), "chr1".into(), "/nonexistent/out".into())
    }

    #[test]
    fn test_window_modes() -> Result<()> {
        let mut query = settings();
        query.region = (1000, 21000);
        query.probes = Some(4);
        let windows = query.window_settings()?;
        assert_eq!((windows.start, windows.end), (1000, 21000));
        assert_eq!(windows.sizing, WindowSizing::ProbeCount(4));

        query.window_size = Some(5000);
        assert!(query.window_settings().is_err());

        query.single = true;
        let windows = query.window_settings()?;
        assert_eq!(windows.sizing, WindowSizing::ProbeCount(1));
        assert!((windows.shift - 1.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_growing_mode() -> Result<()> {
        let mut query = settings();
        assert!(query.window_settings().is_err());

        query.window_size = Some(5000);
        let windows = query.window_settings()?;
        assert!(windows.is_growing());

        query.window_size = None;
        query.probes = Some(3);
        assert!(query.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_region() {
        let mut query = settings();
        query.probes = Some(2);
        query.region = (5000, 4000);
        assert!(query.window_settings().is_err());
        query.region = (5000, 5000);
        assert!(query.window_settings().is_err());
    }

    #[test]
    fn test_existing_output() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut query = settings();
        query.output = dir.path().to_path_buf();
        query.probes = Some(2);
        query.region = (0, 10000);
        assert!(query.validate().is_err());
        query.reuse = true;
        query.validate()?;
        Ok(())
    }
}
