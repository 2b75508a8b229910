use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::chromosome::ChromosomeData;
use super::index::DEFAULT_BIN_SIZE;
use super::schema::{RecordCodec, Schema};
use super::walker::ChromosomeWalker;
use crate::error::{ConfigError, IntegrityError, ReadError, WriteError};
use crate::{tsv, Record, Result};

/// Name of the manifest file inside a database folder
pub const MANIFEST_NAME: &str = "db.json";

/// Arguments used when assembling a database, kept for provenance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArgs {
    pub off_target: Vec<PathBuf>,
    pub melting: Vec<PathBuf>,
    pub secondary: Vec<PathBuf>,
    pub prefix: String,
    pub bin_size: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    schema: Schema,
    chromosomes: BTreeMap<String, ChromosomeData>,
    args: BuildArgs,
}

/// A folder holding one binary file per chromosome and a manifest
#[derive(Debug, Clone)]
pub struct Database {
    root: PathBuf,
    schema: Schema,
    chromosomes: BTreeMap<String, ChromosomeData>,
    args: BuildArgs,
}

impl Database {
    /// Opens a database folder and validates it against its manifest
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_NAME);
        if !manifest_path.is_file() {
            return Err(ReadError::MissingDatabase(root).into());
        }
        let manifest: Manifest =
            serde_json::from_reader(BufReader::new(File::open(&manifest_path)?))?;

        let record_byte_size = manifest.schema.record_byte_size();
        if record_byte_size == 0 {
            return Err(IntegrityError::InvalidRecordSize(record_byte_size).into());
        }
        for chromosome in manifest.chromosomes.values() {
            if chromosome.record_byte_size != record_byte_size {
                return Err(IntegrityError::SizeMismatch {
                    chromosome: chromosome.name.clone(),
                    expected: record_byte_size,
                    got: chromosome.record_byte_size,
                }
                .into());
            }
            let path = root.join(chromosome.file_name());
            if !path.is_file() {
                return Err(IntegrityError::MissingChromosomeFile(path).into());
            }
        }

        Ok(Self {
            root,
            schema: manifest.schema,
            chromosomes: manifest.chromosomes,
            args: manifest.args,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn codec(&self) -> RecordCodec {
        RecordCodec::new(self.schema.clone())
    }

    #[must_use]
    pub fn args(&self) -> &BuildArgs {
        &self.args
    }

    #[must_use]
    pub fn record_byte_size(&self) -> usize {
        self.schema.record_byte_size()
    }

    /// Iterates over chromosome metadata sorted by name
    pub fn chromosomes(&self) -> impl Iterator<Item = &ChromosomeData> {
        self.chromosomes.values()
    }

    pub fn chromosome(&self, name: &str) -> Result<&ChromosomeData> {
        self.chromosomes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownChromosome(name.to_string()).into())
    }

    /// Path of the binary file of a chromosome
    pub fn chromosome_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(self.chromosome(name)?.file_name()))
    }

    /// Logs the database layout
    pub fn log_details(&self) {
        info!("Database at '{}'", self.root.display());
        info!(
            "{} chromosomes, {} bytes per record",
            self.chromosomes.len(),
            self.record_byte_size()
        );
        for chromosome in self.chromosomes.values() {
            info!(
                "'{}': {} nt, {} records, {} index bins",
                chromosome.name,
                chromosome.size_nt,
                chromosome.recordno,
                chromosome.index.num_bins()
            );
        }
    }

    /// Writes a human readable description of the database
    pub fn describe<W: Write>(&self, writer: &mut W, with_bins: bool) -> Result<()> {
        writeln!(writer, "Database: {}", self.root.display())?;
        writeln!(writer, "Record size: {} bytes", self.record_byte_size())?;
        writeln!(writer, "Schema:")?;
        for (column, dtype) in self.schema.columns() {
            writeln!(writer, "  {column}\t{dtype}")?;
        }
        writeln!(writer, "Chromosomes:")?;
        for chromosome in self.chromosomes.values() {
            writeln!(
                writer,
                "  {}\t{} nt\t{} records\t{} bytes\tbin size {}",
                chromosome.name,
                chromosome.size_nt,
                chromosome.recordno,
                chromosome.size_bytes,
                chromosome.index.bin_size()
            )?;
            if with_bins {
                for (bin, (min, max)) in chromosome.index.bins().iter().enumerate() {
                    writeln!(writer, "    bin {bin}\t{min}\t{max}")?;
                }
            }
        }
        writeln!(writer, "Build arguments:")?;
        writeln!(writer, "{}", serde_json::to_string_pretty(&self.args)?)?;
        Ok(())
    }

    /// Writes records as a tab-separated table, header first
    ///
    /// Without a chromosome, every chromosome is written in name order. Only
    /// records starting within `[start, end]` are written.
    pub fn dump<W: Write>(
        &self,
        writer: W,
        chromosome: Option<&str>,
        start: u32,
        end: Option<u32>,
    ) -> Result<usize> {
        let names: Vec<&str> = match chromosome {
            Some(name) => vec![self.chromosome(name)?.name.as_str()],
            None => self.chromosomes.keys().map(String::as_str).collect(),
        };
        let mut out = tsv::stream_writer(writer);
        out.write_record(Record::header())?;
        let mut count = 0;
        for name in names {
            let mut walker = ChromosomeWalker::new(self, name)?;
            for record in walker.buffer(start, end)? {
                out.write_record(record?.fields())?;
                count += 1;
            }
        }
        out.flush()?;
        debug!("Dumped {count} records");
        Ok(count)
    }
}

/// A builder for [`DatabaseWriter`]
#[derive(Default)]
pub struct DatabaseWriterBuilder {
    /// Optional index bin size, defaults to [`DEFAULT_BIN_SIZE`]
    bin_size: Option<u32>,
    /// Optional provenance arguments stored in the manifest
    args: Option<BuildArgs>,
}

impl DatabaseWriterBuilder {
    #[must_use]
    pub fn bin_size(mut self, bin_size: u32) -> Self {
        self.bin_size = Some(bin_size);
        self
    }

    #[must_use]
    pub fn args(mut self, args: BuildArgs) -> Self {
        self.args = Some(args);
        self
    }

    pub fn build<P: AsRef<Path>>(self, path: P, schema: Schema) -> Result<DatabaseWriter> {
        let bin_size = self.bin_size.unwrap_or(DEFAULT_BIN_SIZE);
        if bin_size == 0 {
            return Err(ConfigError::NonPositive("bin size").into());
        }
        let mut args = self.args.unwrap_or_default();
        args.bin_size = bin_size;
        DatabaseWriter::new(path.as_ref(), schema, bin_size, args)
    }
}

/// Writes chromosome files and the manifest of a new database
pub struct DatabaseWriter {
    root: PathBuf,
    codec: RecordCodec,
    bin_size: u32,
    args: BuildArgs,
    chromosomes: BTreeMap<String, ChromosomeData>,
}

impl DatabaseWriter {
    fn new(root: &Path, schema: Schema, bin_size: u32, args: BuildArgs) -> Result<Self> {
        if root.exists() {
            return Err(WriteError::OutputExists(root.to_path_buf()).into());
        }
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            codec: RecordCodec::new(schema),
            bin_size,
            args,
            chromosomes: BTreeMap::new(),
        })
    }

    /// Writes the records of one chromosome, which must be sorted by start
    pub fn write_chromosome(&mut self, name: &str, records: &[Record]) -> Result<&ChromosomeData> {
        if self.chromosomes.contains_key(name) {
            return Err(WriteError::DuplicateChromosome(name.to_string()).into());
        }
        if let Some(record) = records.iter().find(|r| r.chromosome != name) {
            return Err(IntegrityError::ChromosomeMismatch {
                name: record.name.clone(),
                expected: name.to_string(),
                got: record.chromosome.clone(),
            }
            .into());
        }
        let data =
            ChromosomeData::from_records(name, records, self.codec.record_size(), self.bin_size)?;

        let path = self.root.join(data.file_name());
        let mut writer = BufWriter::new(File::create(&path)?);
        let mut buffer = Vec::with_capacity(self.codec.record_size());
        for record in records {
            buffer.clear();
            self.codec.encode(record, &mut buffer)?;
            writer.write_all(&buffer)?;
        }
        writer.flush()?;
        debug!("Wrote {} records to '{}'", records.len(), path.display());

        Ok(self.chromosomes.entry(name.to_string()).or_insert(data))
    }

    /// Writes the manifest and opens the finished database
    pub fn finish(self) -> Result<Database> {
        let manifest = Manifest {
            schema: self.codec.schema().clone(),
            chromosomes: self.chromosomes,
            args: self.args,
        };
        let mut writer = BufWriter::new(File::create(self.root.join(MANIFEST_NAME))?);
        serde_json::to_writer_pretty(&mut writer, &manifest)?;
        writer.flush()?;
        Database::open(&self.root)
    }
}
