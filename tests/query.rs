mod common;

use std::fs;
use std::path::Path;

use oligoprobe::probe::ProbeBuilderConfig;
use oligoprobe::query::{run_query, QuerySettings};
use oligoprobe::{Error, WriteError};

fn settings(dir: &Path) -> anyhow::Result<QuerySettings> {
    let db = dir.join("db");
    common::write_database(&db, &[("chr1", common::oligos("chr1", 2000, 10, 8))])?;
    let mut settings = QuerySettings::new(db, "chr1".to_string(), dir.join("out"));
    settings.region = (0, 20000);
    settings.probes = Some(3);
    settings.window_shift = 0.5;
    settings.focus_size = 0.2;
    settings.focus_step = 0.5;
    settings.builder = ProbeBuilderConfig {
        oligos_per_probe: 20,
        max_probe_size: 1000,
        ..ProbeBuilderConfig::default()
    };
    settings.threads = 2;
    Ok(settings)
}

#[test]
fn test_query_output_tree() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = settings(dir.path())?;
    let probe_sets = run_query(&settings)?;

    // two window sets of three windows, one probe per window
    assert_eq!(probe_sets.len(), 2);
    for probe_set in &probe_sets {
        assert_eq!(probe_set.probes().len(), 3);
        for probe in probe_set.probes() {
            assert_eq!(probe.n_oligos(), 20);
            assert!(probe.size() <= 1000);
        }
        let starts: Vec<u32> = probe_set.probes().iter().map(|p| p.range().0).collect();
        assert!(starts.windows(2).all(|pair| pair[0] < pair[1]));
    }

    let out = &settings.output;
    for set_id in 0..2 {
        let set_path = out.join("window_sets").join(format!("set_{set_id}"));
        assert!(set_path.join("windows.tsv").is_file());
        for window_id in 0..3 {
            let window_path = set_path.join(format!("window_{window_id}"));
            for name in [
                "window.tsv",
                "walker.json",
                "builder.json",
                "probe_feat.tsv",
                "oligos.tsv",
                "probe_paths.tsv",
                ".done",
            ] {
                assert!(window_path.join(name).is_file(), "{}", window_path.join(name).display());
            }
        }
    }

    let sets = out.join("probe_sets");
    assert_eq!(fs::read_to_string(sets.join("probe_sets.tsv"))?.lines().count(), 3);
    let first = sets.join("probe_set_0");
    for name in ["set.tsv", "probes.tsv", "set.bed"] {
        assert!(first.join(name).is_file());
    }
    for name in ["probe.tsv", "oligos.tsv", "probe.fa"] {
        assert!(first.join("probe_0").join(name).is_file());
    }
    let fasta = fs::read_to_string(first.join("probe_0").join("probe.fa"))?;
    assert_eq!(fasta.lines().count(), 40);
    Ok(())
}

#[test]
fn test_existing_output_requires_reuse() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = settings(dir.path())?;
    fs::create_dir_all(&settings.output)?;
    assert!(matches!(
        run_query(&settings),
        Err(Error::WriteError(WriteError::OutputExists(_)))
    ));
    Ok(())
}

#[test]
fn test_resume() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut settings = settings(dir.path())?;
    let first = run_query(&settings)?;

    // drop one window result as if the run was interrupted
    let window = settings
        .output
        .join("window_sets")
        .join("set_1")
        .join("window_2");
    fs::remove_file(window.join(".done"))?;
    fs::remove_file(window.join("probe_paths.tsv"))?;
    let untouched = settings
        .output
        .join("window_sets")
        .join("set_0")
        .join("window_0")
        .join("probe_paths.tsv");
    let before = fs::metadata(&untouched)?.modified()?;

    settings.reuse = true;
    let second = run_query(&settings)?;
    assert!(window.join(".done").is_file());
    assert!(window.join("probe_paths.tsv").is_file());
    assert_eq!(fs::metadata(&untouched)?.modified()?, before);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.features(), b.features());
        for (p, q) in a.probes().iter().zip(b.probes()) {
            assert_eq!(p.path(), q.path());
            assert_eq!(p.oligos(), q.oligos());
        }
    }
    Ok(())
}

#[test]
fn test_full_chromosome() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut settings = settings(dir.path())?;
    settings.region = (0, -1);
    settings.probes = None;
    settings.window_size = Some(5000);
    let probe_sets = run_query(&settings)?;

    assert_eq!(probe_sets.len(), 2);
    let last_end = probe_sets
        .iter()
        .flat_map(|set| set.probes())
        .map(|probe| probe.range().1)
        .max()
        .unwrap_or_default();
    assert!(last_end > 15000);
    assert!(settings
        .output
        .join("window_sets")
        .join("set_0")
        .join("window_3")
        .join(".done")
        .is_file());
    Ok(())
}

#[test]
fn test_single_probe() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut settings = settings(dir.path())?;
    settings.region = (4000, 6000);
    settings.single = true;
    let probe_sets = run_query(&settings)?;
    assert!(!probe_sets.is_empty());
    assert!(probe_sets.iter().all(|set| set.probes().len() == 1));
    assert!(!settings.output.join("window_sets").join("set_1").exists());
    Ok(())
}
