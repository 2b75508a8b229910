use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};

use oligoprobe::build::MakeSettings;
use oligoprobe::db::DEFAULT_BIN_SIZE;
use oligoprobe::oligo::{ScoreSettings, DEFAULT_FREE_ENERGY_RANGE, DEFAULT_OFF_TARGET_RANGE};
use oligoprobe::probe::ProbeBuilderConfig;
use oligoprobe::query::QuerySettings;

#[derive(Parser)]
#[command(name = "oligoprobe")]
#[command(version)]
#[command(about = "Oligo database and FISH probe design", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage oligo databases
    #[command(subcommand)]
    Db(DbCommands),
    /// Design probes over a chromosome region
    Query(QueryArgs),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Assemble a database from off-target, melting and secondary structure outputs
    Make(MakeArgs),
    /// Validate record order and sizes against the manifest
    Check(CheckArgs),
    /// Write records as a tab-separated table to stdout
    Dump(DumpArgs),
    /// Describe the schema and chromosomes of a database
    Info(InfoArgs),
}

#[derive(Args)]
pub struct MakeArgs {
    /// Output database folder, must not exist
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Off-target search outputs (FASTA with ", <count>" sequence lines)
    #[arg(short = 'O', long, value_name = "FILE", num_args = 1..)]
    pub off_target: Vec<PathBuf>,

    /// Melting temperature tables
    #[arg(short = 'T', long, value_name = "FILE", num_args = 1..)]
    pub melting: Vec<PathBuf>,

    /// Secondary structure connectivity tables
    #[arg(short = 'S', long, value_name = "FILE", num_args = 1..)]
    pub secondary: Vec<PathBuf>,

    /// Prefix added to every chromosome name
    #[arg(short, long, default_value = "")]
    pub prefix: String,

    /// Index bin size in nt
    #[arg(short, long, default_value_t = DEFAULT_BIN_SIZE)]
    pub binsize: u32,
}

impl MakeArgs {
    pub fn settings(&self) -> MakeSettings {
        MakeSettings {
            output: self.output.clone(),
            off_target: self.off_target.clone(),
            melting: self.melting.clone(),
            secondary: self.secondary.clone(),
            prefix: self.prefix.clone(),
            bin_size: self.binsize,
        }
    }
}

#[derive(Args)]
pub struct CheckArgs {
    /// Database folder
    pub database: PathBuf,

    /// Number of threads (0 = all cores)
    #[arg(short, long, default_value = "1")]
    pub threads: usize,
}

#[derive(Args)]
pub struct DumpArgs {
    /// Database folder
    pub database: PathBuf,

    /// Only dump this chromosome
    pub chromosome: Option<String>,

    /// Only dump records starting at or after this position
    #[arg(long, default_value = "0")]
    pub start: u32,

    /// Only dump records starting at or before this position
    #[arg(long)]
    pub end: Option<u32>,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Database folder
    pub database: PathBuf,

    /// Also list the byte range of every index bin
    #[arg(long)]
    pub bins: bool,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Database folder
    pub database: PathBuf,

    /// Chromosome to design probes on
    pub chromosome: String,

    /// Output folder
    pub output: PathBuf,

    /// Region start and end; an end of -1 selects the whole chromosome
    #[arg(long, num_args = 2, value_names = ["START", "END"], allow_hyphen_values = true)]
    pub region: Option<Vec<i64>>,

    /// Number of probes to design
    #[arg(short = 'X', long, conflicts_with = "window_size")]
    pub probes: Option<u32>,

    /// Window size in nt
    #[arg(short = 'W', long)]
    pub window_size: Option<u32>,

    /// Window shift, as a fraction of the window size
    #[arg(short = 'w', long, default_value = "0.1")]
    pub window_shift: f64,

    /// Design a single probe over the whole region
    #[arg(long)]
    pub single: bool,

    /// Focus size in nt, or fraction of the window size when at most 1
    #[arg(short = 'R', long, default_value = "8000")]
    pub focus_size: f64,

    /// Focus step in nt, or fraction of the focus size when at most 1
    #[arg(short = 'r', long, default_value = "1000")]
    pub focus_step: f64,

    /// Oligos per probe
    #[arg(short = 'N', long, default_value = "48")]
    pub oligos: usize,

    /// Minimum distance between consecutive oligos, in nt
    #[arg(short = 'D', long, default_value = "2")]
    pub min_gap: u32,

    /// Half width of the allowed melting temperature range, in degC
    #[arg(short = 't', long, default_value = "10")]
    pub tm_half_width: f64,

    /// Maximum probe size, in nt
    #[arg(short = 'P', long, default_value = "10000")]
    pub max_size: u32,

    /// Maximum gap between consecutive oligos, as a fraction of the probe size
    #[arg(short = 'H', long, default_value = "0.1")]
    pub max_hole: f64,

    /// Shared oligo fraction above which two probes are merged
    #[arg(short = 'I', long, default_value = "0.5")]
    pub overlap: f64,

    /// Score threshold step used when relaxing oligo filters
    #[arg(short = 's', long, default_value = "0.1")]
    pub score_step: f64,

    /// Fixed oligo length, checked against the probe size
    #[arg(short = 'k', long)]
    pub oligo_length: Option<u32>,

    /// Allowed off-target counts
    #[arg(short = 'F', long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub off_target: Option<Vec<u64>>,

    /// Allowed secondary structure free energies
    #[arg(short = 'G', long, num_args = 2, value_names = ["MIN", "MAX"], allow_hyphen_values = true)]
    pub free_energy: Option<Vec<f64>>,

    /// Number of worker threads
    #[arg(short = 'j', long, default_value = "1")]
    pub threads: usize,

    /// Load windows completed by a previous run into the same output
    #[arg(long)]
    pub reuse: bool,
}

impl QueryArgs {
    /// Converts the arguments, reporting a region start outside of `u32`
    pub fn settings(&self) -> Result<QuerySettings, clap::Error> {
        let pair = |values: &Option<Vec<f64>>, default: (f64, f64)| match values.as_deref() {
            Some(&[lo, hi]) => (lo, hi),
            _ => default,
        };
        let off_target_range = match self.off_target.as_deref() {
            Some(&[lo, hi]) => (lo, hi),
            _ => DEFAULT_OFF_TARGET_RANGE,
        };
        let region = match self.region.as_deref() {
            Some(&[start, end]) => {
                let start = u32::try_from(start).map_err(|_| {
                    Cli::command().error(
                        ErrorKind::ValueValidation,
                        format!("region start {start} is out of range 0..={}", u32::MAX),
                    )
                })?;
                (start, end)
            }
            _ => (0, -1),
        };

        Ok(QuerySettings {
            database: self.database.clone(),
            chromosome: self.chromosome.clone(),
            output: self.output.clone(),
            region,
            probes: self.probes,
            window_size: self.window_size,
            window_shift: self.window_shift,
            single: self.single,
            focus_size: self.focus_size,
            focus_step: self.focus_step,
            builder: ProbeBuilderConfig {
                oligos_per_probe: self.oligos,
                min_gap: self.min_gap,
                tm_half_width: self.tm_half_width,
                max_probe_size: self.max_size,
                max_hole_fraction: self.max_hole,
                overlap_fraction: self.overlap,
                score_step: self.score_step,
                oligo_length: self.oligo_length,
                scoring: ScoreSettings {
                    off_target_range,
                    free_energy_range: pair(&self.free_energy, DEFAULT_FREE_ENERGY_RANGE),
                },
            },
            threads: self.threads,
            reuse: self.reuse,
        })
    }
}
