use std::path::PathBuf;

/// Custom Result type for oligoprobe operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the oligoprobe library, encompassing all possible error cases
/// that can occur while building, reading or querying an oligo database.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Invalid settings, raised before any I/O takes place
    ConfigError(#[from] ConfigError),
    /// Violations of the on-disk store invariants
    IntegrityError(#[from] IntegrityError),
    /// Errors that occur while reading a database or exported results
    ReadError(#[from] ReadError),
    /// Errors that occur while writing a database or results
    WriteError(#[from] WriteError),
    /// Errors in the inputs used to assemble a database
    BuildError(#[from] BuildError),
    /// Internal invariant violations during probe construction
    ProbeError(#[from] ProbeError),
    /// Failures of window tasks running on the worker pool
    WorkerError(#[from] WorkerError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Manifest and configuration (de)serialization errors
    JsonError(#[from] serde_json::Error),
    /// Tab-separated table errors
    CsvError(#[from] csv::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Integer parsing errors
    ParseIntError(#[from] std::num::ParseIntError),
    /// Float parsing errors
    ParseFloatError(#[from] std::num::ParseFloatError),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Invalid parameter values
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A size or count that must be strictly positive
    ///
    /// # Arguments
    /// * `&'static str` - The parameter label
    #[error("{0} should be greater than 0")]
    NonPositive(&'static str),

    /// A value falling outside of its allowed interval
    ///
    /// # Fields
    /// * `label` - The parameter label
    /// * `value` - The offending value
    /// * `interval` - Human readable description of the allowed interval
    #[error("expected {label} in {interval}, got {value}")]
    OutOfInterval {
        label: &'static str,
        value: f64,
        interval: &'static str,
    },

    /// Off-target interval with a lower bound above the upper one
    #[error("invalid off-target range [{0}, {1}]: lower bound above upper bound")]
    InvalidOffTargetRange(u64, u64),

    /// Free-energy interval mixing signs or in the wrong order
    #[error("invalid free-energy range [{0}, {1}]")]
    InvalidFreeEnergyRange(f64, f64),

    /// Region coordinates out of order
    #[error("invalid region [{0}, {1})")]
    InvalidRegion(u32, i64),

    /// Focus larger than its region
    ///
    /// # Fields
    /// * `focus` - The focus size in nt
    /// * `region` - The region size in nt
    #[error("focus size ({focus}) exceeds region size ({region})")]
    FocusExceedsRegion { focus: u32, region: u32 },

    /// A window set needs either a probe count or a window size, not both or neither
    #[error("provide either a probe count or a window size")]
    AmbiguousWindowMode,

    /// Full chromosome search grows windows of a fixed size
    #[error("during full-chromosome search, provide a window size")]
    MissingWindowSize,

    /// Fixed oligo length incompatible with the probe size
    #[error("oligos too long ({k}+{d})*{n} to be fit in a probe of size {ps}")]
    OligoLengthExceedsProbeSize { k: u32, d: u32, n: usize, ps: u32 },

    /// The requested focus window is empty
    #[error("invalid focus window [{0}, {1})")]
    InvalidFocusWindow(u32, u32),

    /// The requested chromosome is not part of the database
    #[error("chromosome '{0}' not found in database")]
    UnknownChromosome(String),
}

/// Violations of the store invariants
#[derive(thiserror::Error, Debug)]
pub enum IntegrityError {
    /// Record start positions must be strictly increasing within a chromosome
    ///
    /// # Fields
    /// * `chromosome` - The chromosome being validated
    /// * `record` - The record index that breaks the ordering
    /// * `previous` - Start of the preceding record
    /// * `current` - Start of the offending record
    #[error("chromosome '{chromosome}': start {current} of record {record} is not greater than the previous start {previous}")]
    NonMonotonicStart {
        chromosome: String,
        record: usize,
        previous: u32,
        current: u32,
    },

    /// A chromosome listed in the manifest has no binary file
    #[error("missing chromosome file: {0}")]
    MissingChromosomeFile(PathBuf),

    /// The schema yields an empty record
    #[error("record byte size should be greater than 0, got {0}")]
    InvalidRecordSize(usize),

    /// The file size is not a multiple of the record size
    ///
    /// # Fields
    /// * `path` - The chromosome file
    /// * `size` - The file size in bytes
    /// * `record_size` - The expected record size in bytes
    #[error("size of {path:?} ({size}) is not a multiple of the record size ({record_size}), possibly truncated")]
    FileTruncation {
        path: PathBuf,
        size: usize,
        record_size: usize,
    },

    /// The file size disagrees with the manifest
    #[error("chromosome '{chromosome}': expected {expected} bytes, found {got}")]
    SizeMismatch {
        chromosome: String,
        expected: usize,
        got: usize,
    },

    /// A record does not carry the chromosome it is stored under
    #[error("record '{name}' belongs to '{got}', expected '{expected}'")]
    ChromosomeMismatch {
        name: String,
        expected: String,
        got: String,
    },

    /// A record lies outside of the byte range its index bin points to
    ///
    /// # Fields
    /// * `chromosome` - The chromosome being validated
    /// * `record` - The record index
    /// * `bin` - The bin of the record start
    #[error("chromosome '{chromosome}': record {record} is outside of the byte range of bin {bin}")]
    IndexMismatch {
        chromosome: String,
        record: usize,
        bin: usize,
    },

    /// Sequence length differs from the coordinate span
    #[error("sequence length ({got}) of '{name}' does not match its coordinates ({expected})")]
    SequenceLengthMismatch {
        name: String,
        expected: u32,
        got: usize,
    },
}

/// Errors that can occur while reading a database or exported results
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The path being read is not a regular file
    #[error("file is not regular: {0}")]
    IncompatibleFile(PathBuf),

    /// The database folder or manifest is missing
    #[error("database not found at {0}")]
    MissingDatabase(PathBuf),

    /// A record was cut short by end of file
    ///
    /// # Arguments
    /// * `usize` - The number of bytes read
    /// * `usize` - The expected record size
    #[error("partial record: read {0} bytes, expected {1}")]
    PartialRecord(usize, usize),

    /// Attempted to access a record index that is beyond the available range
    ///
    /// # Arguments
    /// * First `usize` - The requested record index
    /// * Second `usize` - The maximum available record index
    #[error("requested record index ({0}) is out of record range ({1})")]
    OutOfRange(usize, usize),

    /// A dtype code that is not understood
    #[error("unsupported dtype: {0}")]
    InvalidDtype(String),

    /// A column label that is not understood
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A column with an incompatible dtype, or a schema missing a column
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A table row with the wrong number of fields
    #[error("expected {expected} fields, found {got}")]
    FieldCount { expected: usize, got: usize },

    /// Probe paths referencing oligos missing from the oligo table
    #[error("unknown oligo id {0} in probe paths")]
    UnknownOligo(usize),
}

/// Errors that can occur while writing a database or results
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// Refusing to overwrite an existing output
    #[error("output path already exists: {0}")]
    OutputExists(PathBuf),

    /// A string field does not fit its column
    ///
    /// # Fields
    /// * `column` - The column label
    /// * `width` - The column width in bytes
    /// * `got` - The field length in bytes
    #[error("field '{column}' is {got} bytes long, column width is {width}")]
    FieldTooWide {
        column: &'static str,
        width: usize,
        got: usize,
    },

    /// A string field containing a NUL byte, which is reserved for padding
    #[error("field '{0}' contains a NUL byte")]
    NulInField(&'static str),

    /// A chromosome was written twice
    #[error("chromosome '{0}' already written")]
    DuplicateChromosome(String),
}

/// Errors in the inputs used to assemble a database
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// An input path that does not exist
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Neither off-target nor melting tables were provided
    #[error("provide at least one off-target or melting input")]
    NoSequenceSource,

    /// A record name not matching `<name> pos=<chrom>:<start>-<end>`
    #[error("malformed record name: '{0}'")]
    MalformedName(String),

    /// A line that cannot be parsed
    ///
    /// # Fields
    /// * `path` - The input file
    /// * `line` - The 1-based line number
    #[error("malformed line {line} in {path:?}")]
    MalformedLine { path: PathBuf, line: usize },

    /// A record for which no sequence is known
    #[error("no sequence available for '{0}'")]
    MissingSequence(String),
}

/// Internal invariant violations during probe construction
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    /// Two candidate probes with the exact same oligos
    #[error("identical probes found during reduction: {0:?}")]
    DuplicateProbes(Vec<usize>),

    /// A probe must hold at least one oligo
    #[error("a probe needs at least one oligo")]
    EmptyProbe,

    /// A probe set must hold at least one probe
    #[error("a probe set needs at least one probe")]
    EmptyProbeSet,
}

/// Failures of window tasks running on the worker pool
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    /// A worker thread panicked
    #[error("worker {0} panicked")]
    Panicked(usize),

    /// A window task failed
    ///
    /// # Fields
    /// * `set_id` - The window set of the failed task
    /// * `window_id` - The window of the failed task
    /// * `reason` - The error raised by the task
    #[error("window {window_id} of set {set_id} failed: {reason}")]
    WindowFailed {
        set_id: usize,
        window_id: usize,
        reason: String,
    },

    /// The task queue was closed while tasks were still being dispatched
    #[error("worker pool is closed")]
    Disconnected,
}
