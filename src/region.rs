//! Genomic regions with a growable central focus.

use tracing::warn;

use crate::db::ChromosomeData;
use crate::error::ConfigError;
use crate::Result;

/// Converts a size style into nt: values up to 1 are a fraction of `total`
fn resolve_style(style: f64, total: u32) -> u32 {
    if style > 1.0 {
        style as u32
    } else {
        (f64::from(total) * style) as u32
    }
}

/// A genomic region with a central focus sub-region
///
/// The focus starts centered in the region and can only grow, symmetrically,
/// until it covers the whole region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomicRegion {
    chromosome: String,
    start: u32,
    end: u32,
    focus_start: u32,
    focus_end: u32,
    focus_step: u32,
}

impl GenomicRegion {
    /// Creates a region and its focus
    ///
    /// # Arguments
    ///
    /// * `focus_style` - Focus size in nt, or as a fraction of the region when at most 1
    /// * `step_style` - Focus growth step in nt, or as a fraction of the focus when at most 1
    pub fn new(
        chromosome: &str,
        start: u32,
        end: u32,
        focus_style: f64,
        step_style: f64,
    ) -> Result<Self> {
        if chromosome.is_empty() {
            return Err(ConfigError::UnknownChromosome(String::new()).into());
        }
        if end <= start {
            return Err(ConfigError::InvalidRegion(start, i64::from(end)).into());
        }
        if focus_style <= 0.0 {
            return Err(ConfigError::NonPositive("focus size").into());
        }
        if step_style <= 0.0 {
            return Err(ConfigError::NonPositive("focus step").into());
        }
        let size = end - start;
        let focus_size = resolve_style(focus_style, size);
        if focus_size > size {
            return Err(ConfigError::FocusExceedsRegion {
                focus: focus_size,
                region: size,
            }
            .into());
        }
        let focus_step = resolve_style(step_style, focus_size);

        let center = (f64::from(start) + f64::from(end)) / 2.0;
        let half = f64::from(focus_size) / 2.0;
        Ok(Self {
            chromosome: chromosome.to_string(),
            start,
            end,
            focus_start: (center - half) as u32,
            focus_end: (center + half) as u32,
            focus_step,
        })
    }

    #[must_use]
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    #[must_use]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> u32 {
        self.end
    }

    #[must_use]
    pub fn region(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    #[must_use]
    pub fn focus(&self) -> (u32, u32) {
        (self.focus_start, self.focus_end)
    }

    #[must_use]
    pub fn focus_step(&self) -> u32 {
        self.focus_step
    }

    #[must_use]
    pub fn can_increase_focus(&self) -> bool {
        self.focus() != self.region()
    }

    /// Grows the focus by half a step on each side, within the region
    pub fn increase_focus(&mut self) {
        if !self.can_increase_focus() {
            warn!("Cannot increase the focus region any further");
            return;
        }
        let half = (self.focus_step / 2).max(1);
        self.focus_start = self.focus_start.saturating_sub(half).max(self.start);
        self.focus_end = self.focus_end.saturating_add(half).min(self.end);
    }
}

/// Generates region sets covering a chromosome
pub struct GenomicRegionBuilder {
    chromosome: String,
    size_nt: u32,
    focus_style: f64,
    step_style: f64,
}

impl GenomicRegionBuilder {
    pub fn new(chromosome: &ChromosomeData, focus_style: f64, step_style: f64) -> Result<Self> {
        if focus_style <= 0.0 {
            return Err(ConfigError::NonPositive("focus size").into());
        }
        if step_style <= 0.0 {
            return Err(ConfigError::NonPositive("focus step").into());
        }
        Ok(Self {
            chromosome: chromosome.name.clone(),
            size_nt: chromosome.size_nt,
            focus_style,
            step_style,
        })
    }

    /// Splits the chromosome in `n` equally sized, non-overlapping regions
    pub fn build_by_number(&self, n: u32) -> Result<Vec<Vec<GenomicRegion>>> {
        if n == 0 {
            return Err(ConfigError::NonPositive("number of regions").into());
        }
        let size = self.size_nt / n;
        self.build_by_size(size, f64::from(size))
    }

    /// Builds regions of `size` nt, consecutive starts `step_style` apart
    ///
    /// The step is in nt, or a fraction of `size` when at most 1. With a step
    /// smaller than the size regions overlap, and are spread over separate
    /// sets so that no set contains overlapping regions.
    pub fn build_by_size(&self, size: u32, step_style: f64) -> Result<Vec<Vec<GenomicRegion>>> {
        if size == 0 {
            return Err(ConfigError::NonPositive("region size").into());
        }
        let step = resolve_style(step_style, size);
        if step == 0 {
            return Err(ConfigError::NonPositive("region step").into());
        }
        if step >= size {
            return Ok(vec![self.region_set(0, size, step)?]);
        }
        (0..size)
            .step_by(step as usize)
            .map(|offset| self.region_set(offset, size, size))
            .collect()
    }

    fn region_set(&self, offset: u32, size: u32, spacing: u32) -> Result<Vec<GenomicRegion>> {
        let mut regions = Vec::new();
        let mut start = offset;
        while let Some(end) = start.checked_add(size).filter(|&e| e <= self.size_nt) {
            regions.push(GenomicRegion::new(
                &self.chromosome,
                start,
                end,
                self.focus_style,
                self.step_style,
            )?);
            start += spacing;
        }
        Ok(regions)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::db::ChromosomeIndex;

    fn chromosome(size_nt: u32) -> Result<ChromosomeData> {
        Ok(ChromosomeData {
            name: "chr1".into(),
            size_nt,
            size_bytes: 0,
            recordno: 0,
            record_byte_size: 1,
            index: ChromosomeIndex::build("chr1", [], 1, 100)?,
        })
    }

    #[test]
    fn test_focus_centered() -> Result<()> {
        let region = GenomicRegion::new("chr1", 1000, 2000, 0.5, 0.1)?;
        assert_eq!(region.focus(), (1250, 1750));
        assert_eq!(region.focus_step(), 50);
        let region = GenomicRegion::new("chr1", 1000, 2000, 200.0, 30.0)?;
        assert_eq!(region.focus(), (1400, 1600));
        assert_eq!(region.focus_step(), 30);
        Ok(())
    }

    #[test]
    fn test_invalid_region() {
        assert!(GenomicRegion::new("chr1", 10, 10, 1.0, 1.0).is_err());
        assert!(GenomicRegion::new("", 0, 10, 1.0, 1.0).is_err());
        assert!(GenomicRegion::new("chr1", 0, 10, 20.0, 1.0).is_err());
        assert!(GenomicRegion::new("chr1", 0, 10, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_focus_monotonic_growth() -> Result<()> {
        let mut region = GenomicRegion::new("chr1", 0, 1000, 100.0, 70.0)?;
        let mut steps = 0;
        while region.can_increase_focus() {
            let before = region.focus();
            region.increase_focus();
            let after = region.focus();
            assert!(after.0 <= before.0 && after.1 >= before.1);
            assert!(after != before);
            steps += 1;
        }
        assert_eq!(region.focus(), region.region());
        assert_eq!(steps, 13);
        Ok(())
    }

    #[test]
    fn test_full_focus_cannot_grow() -> Result<()> {
        let mut region = GenomicRegion::new("chr1", 0, 100, 1.0, 1.0)?;
        assert!(!region.can_increase_focus());
        region.increase_focus();
        assert_eq!(region.focus(), (0, 100));
        Ok(())
    }

    #[test]
    fn test_build_by_number() -> Result<()> {
        let builder = GenomicRegionBuilder::new(&chromosome(1000)?, 1.0, 1.0)?;
        let sets = builder.build_by_number(4)?;
        assert_eq!(sets.len(), 1);
        let bounds: Vec<_> = sets[0].iter().map(GenomicRegion::region).collect();
        assert_eq!(bounds, vec![(0, 250), (250, 500), (500, 750), (750, 1000)]);
        Ok(())
    }

    #[test]
    fn test_build_overlapping() -> Result<()> {
        let builder = GenomicRegionBuilder::new(&chromosome(1000)?, 1.0, 1.0)?;
        let sets = builder.build_by_size(200, 0.5)?;
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 5);
        assert_eq!(sets[1].len(), 4);
        assert_eq!(sets[1][0].region(), (100, 300));
        for set in &sets {
            assert!(set.windows(2).all(|w| w[0].end() <= w[1].start()));
        }
        Ok(())
    }
}
