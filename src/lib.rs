//! # oligoprobe
//!
//! An indexed binary database of candidate oligos, and an engine building
//! FISH probes out of them.
//!
//! The database stores one flat file of fixed-width records per chromosome,
//! sorted by start, next to a JSON manifest describing the record layout and a
//! sparse index of every chromosome (see [`db`]). Databases are assembled from
//! the outputs of off-target, melting temperature and secondary structure
//! tools (see [`build`]).
//!
//! Probe design walks a chromosome region through overlapping window sets
//! (see [`window`]). The oligos of every window are scored ([`oligo`]) and
//! chained into probes of non-overlapping oligos ([`probe`]), relaxing the
//! score threshold and growing the searched focus until candidates are found.
//! Finally one probe per window is combined into probe sets ([`query`]).
//!
//! ## Example
//!
//! ```no_run
//! use oligoprobe::query::{run_query, QuerySettings};
//!
//! let mut settings = QuerySettings::new("oligo_db".into(), "chr1".into(), "probes".into());
//! settings.region = (1_000_000, 1_100_000);
//! settings.probes = Some(5);
//! settings.threads = 4;
//! let probe_sets = run_query(&settings)?;
//! println!("{} probe sets", probe_sets.len());
//! # Ok::<(), oligoprobe::Error>(())
//! ```

pub mod build;
pub mod db;
mod error;
pub mod oligo;
pub mod parallel;
pub mod probe;
pub mod query;
pub mod region;
mod tsv;
pub mod window;

pub use db::Record;
pub use error::{
    BuildError, ConfigError, Error, IntegrityError, ProbeError, ReadError, Result, WorkerError,
    WriteError,
};
