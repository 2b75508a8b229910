use crate::db::schema::Column;
use crate::error::ReadError;
use crate::Result;

/// A single candidate oligo
///
/// Records are decoded from the binary store and are not modified afterwards,
/// with the exception of the derived [`score`](Record::score) which is set once
/// when a record is assigned to a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub name: String,
    pub chromosome: String,
    /// Start position (0-based, inclusive)
    pub start: u32,
    /// End position (exclusive)
    pub end: u32,
    pub sequence: String,
    pub gc_content: f32,
    pub off_target_no: u64,
    pub tm_dg: f32,
    pub tm_dh: f32,
    pub tm_ds: f32,
    pub tm: f32,
    pub ss_dg: f32,
    /// Normalized score, `+inf` when the oligo is filtered out
    pub score: Option<f64>,
}

impl Record {
    /// Length of the oligo in nt
    #[must_use]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns the same record carrying the provided score
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Renders a single column as text
    #[must_use]
    pub fn field(&self, column: Column) -> String {
        match column {
            Column::Name => self.name.clone(),
            Column::Chromosome => self.chromosome.clone(),
            Column::Start => self.start.to_string(),
            Column::End => self.end.to_string(),
            Column::Sequence => self.sequence.clone(),
            Column::GcContent => self.gc_content.to_string(),
            Column::OffTargetNo => self.off_target_no.to_string(),
            Column::TmDg => self.tm_dg.to_string(),
            Column::TmDh => self.tm_dh.to_string(),
            Column::TmDs => self.tm_ds.to_string(),
            Column::Tm => self.tm.to_string(),
            Column::SsDg => self.ss_dg.to_string(),
        }
    }

    /// Renders all columns in canonical order
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        Column::ALL.into_iter().map(|c| self.field(c)).collect()
    }

    /// Parses a record from its columns in canonical order
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self> {
        if fields.len() != Column::ALL.len() {
            return Err(ReadError::FieldCount {
                expected: Column::ALL.len(),
                got: fields.len(),
            }
            .into());
        }
        let get = |c: Column| fields[c as usize].as_ref();
        Ok(Self {
            name: get(Column::Name).to_string(),
            chromosome: get(Column::Chromosome).to_string(),
            start: get(Column::Start).parse()?,
            end: get(Column::End).parse()?,
            sequence: get(Column::Sequence).to_string(),
            gc_content: get(Column::GcContent).parse()?,
            off_target_no: get(Column::OffTargetNo).parse()?,
            tm_dg: get(Column::TmDg).parse()?,
            tm_dh: get(Column::TmDh).parse()?,
            tm_ds: get(Column::TmDs).parse()?,
            tm: get(Column::Tm).parse()?,
            ss_dg: get(Column::SsDg).parse()?,
            score: None,
        })
    }

    /// Column labels in canonical order
    #[must_use]
    pub fn header() -> Vec<&'static str> {
        Column::ALL.into_iter().map(Column::label).collect()
    }
}

/// Fraction of G and C bases in a sequence
#[must_use]
pub fn gc_content(sequence: &str) -> f32 {
    if sequence.is_empty() {
        return 0.0;
    }
    let gc = sequence
        .bytes()
        .filter(|b| matches!(b.to_ascii_uppercase(), b'G' | b'C'))
        .count();
    gc as f32 / sequence.len() as f32
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_fields_roundtrip() -> Result<()> {
        let record = Record {
            name: "a".into(),
            chromosome: "chr2".into(),
            start: 5,
            end: 9,
            sequence: "ACGT".into(),
            gc_content: 0.5,
            off_target_no: 12,
            tm_dg: -7.123_456,
            tm_dh: f32::NAN,
            tm_ds: 0.1,
            tm: 55.5,
            ss_dg: -0.3,
            score: None,
        };
        let parsed = Record::from_fields(&record.fields())?;
        assert_eq!(parsed.tm_dg.to_bits(), record.tm_dg.to_bits());
        assert!(parsed.tm_dh.is_nan());
        assert_eq!(parsed.name, record.name);
        assert_eq!(parsed.off_target_no, 12);
        Ok(())
    }

    #[test]
    fn test_field_count() {
        assert!(Record::from_fields(&["a", "b"]).is_err());
    }

    #[test]
    fn test_gc_content() {
        assert!((gc_content("ACGT") - 0.5).abs() < f32::EPSILON);
        assert!((gc_content("gggc") - 1.0).abs() < f32::EPSILON);
        assert!(gc_content("").abs() < f32::EPSILON);
    }
}
