mod common;

use std::fs;

use oligoprobe::build::{make_database, MakeSettings};
use oligoprobe::db::{ChromosomeWalker, Database};

#[test]
fn test_build_check_dump() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (hush, melting) = common::write_tool_outputs(dir.path(), &["1", "2"], 500)?;
    let mut settings = MakeSettings::new(dir.path().join("db"));
    settings.off_target = vec![hush];
    settings.melting = vec![melting];
    settings.prefix = "chr".to_string();
    settings.bin_size = 1000;

    let db = make_database(&settings)?;
    db.check(2)?;

    let db = Database::open(dir.path().join("db"))?;
    let names: Vec<&str> = db.chromosomes().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["chr1", "chr2"]);
    assert_eq!(db.chromosome("chr1")?.recordno, 500);
    assert_eq!(db.args().prefix, "chr");

    let records = ChromosomeWalker::new(&db, "chr2")?.collect_range(0, None)?;
    assert_eq!(records.len(), 500);
    assert!(records.windows(2).all(|pair| pair[0].start < pair[1].start));
    assert_eq!(records[3].off_target_no, u64::from(records[3].start % 7));
    assert!(records[3].ss_dg.is_nan());

    let mut out = Vec::new();
    assert_eq!(db.dump(&mut out, None, 0, None)?, 1000);
    let text = String::from_utf8(out)?;
    assert_eq!(text.lines().count(), 1001);
    assert!(text.lines().nth(1).is_some_and(|l| l.starts_with("oligo_0\tchr1\t0\t20\t")));
    Ok(())
}

#[test]
fn test_corrupted_store_fails_check() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("db");
    let db = common::write_database(&path, &[("chr1", common::oligos("chr1", 3000, 10, 8))])?;
    db.check(4)?;

    // swap two records in the middle of the file
    let size = db.record_byte_size();
    let file = db.chromosome_path("chr1")?;
    let mut bytes = fs::read(&file)?;
    let (a, b) = (1500 * size, 1501 * size);
    let first = bytes[a..b].to_vec();
    bytes.copy_within(b..b + size, a);
    bytes[b..b + size].copy_from_slice(&first);
    fs::write(&file, &bytes)?;

    assert!(db.check(1).is_err());
    assert!(db.check(4).is_err());
    Ok(())
}

#[test]
fn test_missing_chromosome_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("db");
    let db = common::write_database(&path, &[("chr1", common::oligos("chr1", 10, 10, 8))])?;
    fs::remove_file(db.chromosome_path("chr1")?)?;
    assert!(Database::open(&path).is_err());
    Ok(())
}

#[test]
fn test_fastforward_reaches_first_record() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = common::write_database(
        &dir.path().join("db"),
        &[("chr1", common::oligos("chr1", 2000, 7, 5))],
    )?;
    let mut walker = ChromosomeWalker::new(&db, "chr1")?;
    for pos in [1, 999, 1000, 1001, 6999, 13_993] {
        walker.fastforward(pos)?;
        let record = walker.read_next_record()?;
        let expected = pos.div_ceil(7) * 7;
        assert_eq!(record.map(|r| r.start), Some(expected), "position {pos}");
    }
    Ok(())
}
