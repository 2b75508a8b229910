#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use oligoprobe::db::{gc_content, Database, DatabaseWriterBuilder, Schema};
use oligoprobe::{Record, Result};

/// Evenly spaced oligos with melting temperatures cycling over 60, 61 and 62 degC
pub fn oligos(chromosome: &str, n: usize, spacing: u32, length: u32) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let start = i as u32 * spacing;
            let sequence: String = "ACGT".chars().cycle().take(length as usize).collect();
            Record {
                name: format!("oligo_{i}"),
                chromosome: chromosome.to_string(),
                start,
                end: start + length,
                gc_content: gc_content(&sequence),
                sequence,
                off_target_no: 0,
                tm_dg: -30.0,
                tm_dh: -200.0,
                tm_ds: -0.5,
                tm: 60.0 + (i % 3) as f32,
                ss_dg: -1.0,
                score: None,
            }
        })
        .collect()
}

/// Writes a database with one chromosome per `(name, records)` pair
pub fn write_database(path: &Path, chromosomes: &[(&str, Vec<Record>)]) -> Result<Database> {
    let schema = Schema::fitting(chromosomes.iter().flat_map(|(_, records)| records));
    let mut writer = DatabaseWriterBuilder::default()
        .bin_size(1000)
        .build(path, schema)?;
    for (name, records) in chromosomes {
        writer.write_chromosome(name, records)?;
    }
    writer.finish()
}

/// Writes off-target and melting tool outputs for `n` oligos per chromosome
///
/// Returns the paths of the off-target and melting files.
pub fn write_tool_outputs(dir: &Path, chromosomes: &[&str], n: usize) -> std::io::Result<(PathBuf, PathBuf)> {
    let mut hush = String::new();
    let mut melting = String::from("name\tdG\tdH\tdS\tTm\tSeq\n");
    for chromosome in chromosomes {
        // written in reverse order, sorted when the database is built
        for record in oligos(chromosome, n, 25, 20).iter().rev() {
            let header = format!(
                "{} pos={}:{}-{}",
                record.name, record.chromosome, record.start, record.end
            );
            let _ = writeln!(hush, ">{header}\n{}, {}", record.sequence, record.start % 7);
            let _ = writeln!(
                melting,
                "{header}\t{}\t{}\t{}\t{}\t{}",
                record.tm_dg, record.tm_dh, record.tm_ds, record.tm, record.sequence
            );
        }
    }
    let hush_path = dir.join("oligos.hush.fa");
    let melting_path = dir.join("oligos.melting.tsv");
    std::fs::write(&hush_path, hush)?;
    std::fs::write(&melting_path, melting)?;
    Ok((hush_path, melting_path))
}
