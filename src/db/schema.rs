//! Column layout of the fixed-width binary records.
//!
//! Every record is a concatenation of its columns in canonical order, each
//! encoded little-endian with a fixed width:
//!
//! | column          | dtype   |
//! |-----------------|---------|
//! | `name`          | `\|S<n>` |
//! | `chromosome`    | `\|S<n>` |
//! | `start`         | `<u4`   |
//! | `end`           | `<u4`   |
//! | `sequence`      | `\|S<n>` |
//! | `gc_content`    | `<f4`   |
//! | `off_target_no` | `<u8`   |
//! | `Tm_dG`         | `<f4`   |
//! | `Tm_dH`         | `<f4`   |
//! | `Tm_dS`         | `<f4`   |
//! | `Tm`            | `<f4`   |
//! | `ss_dG`         | `<f4`   |
//!
//! String columns are NUL-padded to their width.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{ReadError, WriteError};
use crate::{Record, Result};

/// Columns of an oligo record, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Name,
    Chromosome,
    Start,
    End,
    Sequence,
    GcContent,
    OffTargetNo,
    TmDg,
    TmDh,
    TmDs,
    Tm,
    SsDg,
}

impl Column {
    /// All columns in the order they are laid out on disk
    pub const ALL: [Column; 12] = [
        Column::Name,
        Column::Chromosome,
        Column::Start,
        Column::End,
        Column::Sequence,
        Column::GcContent,
        Column::OffTargetNo,
        Column::TmDg,
        Column::TmDh,
        Column::TmDs,
        Column::Tm,
        Column::SsDg,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Chromosome => "chromosome",
            Column::Start => "start",
            Column::End => "end",
            Column::Sequence => "sequence",
            Column::GcContent => "gc_content",
            Column::OffTargetNo => "off_target_no",
            Column::TmDg => "Tm_dG",
            Column::TmDh => "Tm_dH",
            Column::TmDs => "Tm_dS",
            Column::Tm => "Tm",
            Column::SsDg => "ss_dG",
        }
    }

    /// Whether the dtype is compatible with the column contents
    fn accepts(self, dtype: Dtype) -> bool {
        match self {
            Column::Name | Column::Chromosome | Column::Sequence => {
                matches!(dtype, Dtype::Bytes(w) if w > 0)
            }
            Column::Start | Column::End => dtype == Dtype::U32,
            Column::OffTargetNo => dtype == Dtype::U64,
            _ => dtype == Dtype::F32,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Column {
    type Err = ReadError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| ReadError::UnknownColumn(s.to_string()))
    }
}

/// Fixed-width storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    /// NUL-padded byte string of the given width
    Bytes(usize),
    U32,
    U64,
    F32,
}

impl Dtype {
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            Dtype::Bytes(w) => w,
            Dtype::U32 | Dtype::F32 => 4,
            Dtype::U64 => 8,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Bytes(w) => write!(f, "|S{w}"),
            Dtype::U32 => f.write_str("<u4"),
            Dtype::U64 => f.write_str("<u8"),
            Dtype::F32 => f.write_str("<f4"),
        }
    }
}

impl FromStr for Dtype {
    type Err = ReadError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "<u4" => Ok(Dtype::U32),
            "<u8" => Ok(Dtype::U64),
            "<f4" => Ok(Dtype::F32),
            _ => s
                .strip_prefix("|S")
                .and_then(|w| w.parse().ok())
                .map(Dtype::Bytes)
                .ok_or_else(|| ReadError::InvalidDtype(s.to_string())),
        }
    }
}

/// Serialized form of one schema entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: String,
}

/// Mapping of every column to its fixed-width dtype
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColumnSpec>", into = "Vec<ColumnSpec>")]
pub struct Schema {
    dtypes: [Dtype; 12],
}

impl Schema {
    /// Creates the canonical schema given the widths of the string columns
    #[must_use]
    pub fn new(name_width: usize, chromosome_width: usize, sequence_width: usize) -> Self {
        Self {
            dtypes: [
                Dtype::Bytes(name_width.max(1)),
                Dtype::Bytes(chromosome_width.max(1)),
                Dtype::U32,
                Dtype::U32,
                Dtype::Bytes(sequence_width.max(1)),
                Dtype::F32,
                Dtype::U64,
                Dtype::F32,
                Dtype::F32,
                Dtype::F32,
                Dtype::F32,
                Dtype::F32,
            ],
        }
    }

    /// Creates the smallest schema able to hold all the provided records
    #[must_use]
    pub fn fitting<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let (mut name, mut chrom, mut seq) = (1, 1, 1);
        for record in records {
            name = name.max(record.name.len());
            chrom = chrom.max(record.chromosome.len());
            seq = seq.max(record.sequence.len());
        }
        Self::new(name, chrom, seq)
    }

    #[must_use]
    pub fn dtype(&self, column: Column) -> Dtype {
        self.dtypes[column as usize]
    }

    /// Iterates over (column, dtype) pairs in canonical order
    pub fn columns(&self) -> impl Iterator<Item = (Column, Dtype)> + '_ {
        Column::ALL.into_iter().zip(self.dtypes.iter().copied())
    }

    /// Total size of one record in bytes
    #[must_use]
    pub fn record_byte_size(&self) -> usize {
        self.dtypes.iter().map(|d| d.width()).sum()
    }
}

impl TryFrom<Vec<ColumnSpec>> for Schema {
    type Error = ReadError;
    fn try_from(specs: Vec<ColumnSpec>) -> std::result::Result<Self, Self::Error> {
        let mut dtypes: [Option<Dtype>; 12] = [None; 12];
        for spec in specs {
            let column: Column = spec.name.parse()?;
            let dtype: Dtype = spec.dtype.parse()?;
            if !column.accepts(dtype) {
                return Err(ReadError::InvalidSchema(format!(
                    "column '{column}' cannot be stored as '{dtype}'"
                )));
            }
            if dtypes[column as usize].replace(dtype).is_some() {
                return Err(ReadError::InvalidSchema(format!(
                    "column '{column}' listed twice"
                )));
            }
        }
        let mut resolved = [Dtype::U32; 12];
        for (column, (slot, dtype)) in Column::ALL.iter().zip(resolved.iter_mut().zip(dtypes)) {
            *slot = dtype.ok_or_else(|| {
                ReadError::InvalidSchema(format!("column '{column}' is missing"))
            })?;
        }
        Ok(Self { dtypes: resolved })
    }
}

impl From<Schema> for Vec<ColumnSpec> {
    fn from(schema: Schema) -> Self {
        schema
            .columns()
            .map(|(column, dtype)| ColumnSpec {
                name: column.label().to_string(),
                dtype: dtype.to_string(),
            })
            .collect()
    }
}

/// Encodes and decodes records according to a [`Schema`]
#[derive(Debug, Clone)]
pub struct RecordCodec {
    schema: Schema,
    record_size: usize,
}

impl RecordCodec {
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        let record_size = schema.record_byte_size();
        Self {
            schema,
            record_size,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Appends the binary representation of a record to the buffer
    pub fn encode(&self, record: &Record, buffer: &mut Vec<u8>) -> Result<()> {
        for (column, dtype) in self.schema.columns() {
            match dtype {
                Dtype::Bytes(width) => {
                    let bytes = match column {
                        Column::Name => record.name.as_bytes(),
                        Column::Chromosome => record.chromosome.as_bytes(),
                        _ => record.sequence.as_bytes(),
                    };
                    if bytes.contains(&0) {
                        return Err(WriteError::NulInField(column.label()).into());
                    }
                    if bytes.len() > width {
                        return Err(WriteError::FieldTooWide {
                            column: column.label(),
                            width,
                            got: bytes.len(),
                        }
                        .into());
                    }
                    buffer.extend_from_slice(bytes);
                    buffer.resize(buffer.len() + width - bytes.len(), 0);
                }
                Dtype::U32 => {
                    let value = if column == Column::Start {
                        record.start
                    } else {
                        record.end
                    };
                    let mut bytes = [0u8; 4];
                    LittleEndian::write_u32(&mut bytes, value);
                    buffer.extend_from_slice(&bytes);
                }
                Dtype::U64 => {
                    let mut bytes = [0u8; 8];
                    LittleEndian::write_u64(&mut bytes, record.off_target_no);
                    buffer.extend_from_slice(&bytes);
                }
                Dtype::F32 => {
                    let value = match column {
                        Column::GcContent => record.gc_content,
                        Column::TmDg => record.tm_dg,
                        Column::TmDh => record.tm_dh,
                        Column::TmDs => record.tm_ds,
                        Column::Tm => record.tm,
                        _ => record.ss_dg,
                    };
                    let mut bytes = [0u8; 4];
                    LittleEndian::write_f32(&mut bytes, value);
                    buffer.extend_from_slice(&bytes);
                }
            }
        }
        Ok(())
    }

    /// Decodes one record from exactly `record_size` bytes
    pub fn decode(&self, bytes: &[u8]) -> Result<Record> {
        if bytes.len() != self.record_size {
            return Err(ReadError::PartialRecord(bytes.len(), self.record_size).into());
        }
        let mut record = Record::default();
        let mut pos = 0;
        for (column, dtype) in self.schema.columns() {
            let field = &bytes[pos..pos + dtype.width()];
            pos += dtype.width();
            match column {
                Column::Name => record.name = decode_str(field)?,
                Column::Chromosome => record.chromosome = decode_str(field)?,
                Column::Sequence => record.sequence = decode_str(field)?,
                Column::Start => record.start = LittleEndian::read_u32(field),
                Column::End => record.end = LittleEndian::read_u32(field),
                Column::OffTargetNo => record.off_target_no = LittleEndian::read_u64(field),
                Column::GcContent => record.gc_content = LittleEndian::read_f32(field),
                Column::TmDg => record.tm_dg = LittleEndian::read_f32(field),
                Column::TmDh => record.tm_dh = LittleEndian::read_f32(field),
                Column::TmDs => record.tm_ds = LittleEndian::read_f32(field),
                Column::Tm => record.tm = LittleEndian::read_f32(field),
                Column::SsDg => record.ss_dg = LittleEndian::read_f32(field),
            }
        }
        Ok(record)
    }

    /// Reads only the start coordinate of an encoded record
    #[must_use]
    pub fn decode_start(&self, bytes: &[u8]) -> u32 {
        let offset = self.schema.dtype(Column::Name).width()
            + self.schema.dtype(Column::Chromosome).width();
        LittleEndian::read_u32(&bytes[offset..offset + 4])
    }
}

/// Strips the NUL padding of a fixed-width string field
fn decode_str(field: &[u8]) -> Result<String> {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    Ok(std::str::from_utf8(&field[..end])?.to_string())
}
