mod common;

use std::collections::BTreeMap;

use oligoprobe::oligo::OligoGroup;
use oligoprobe::probe::{OligoProbe, OligoProbeBuilder, OligoProbeSetBuilder, ProbeBuilderConfig};
use oligoprobe::window::Window;
use oligoprobe::{Record, Result};

fn window(focus: Option<(u32, u32)>, end: u32) -> Window {
    Window {
        start: 0,
        mid: f64::from(end) / 2.0,
        end,
        focus,
        window_id: 0,
        set_id: 0,
    }
}

fn builder(n: usize, max_probe_size: u32) -> Result<OligoProbeBuilder> {
    OligoProbeBuilder::new(ProbeBuilderConfig {
        oligos_per_probe: n,
        min_gap: 2,
        max_probe_size,
        overlap_fraction: 0.5,
        ..ProbeBuilderConfig::default()
    })
}

fn probe(ids: impl IntoIterator<Item = usize>, records: &[Record]) -> Result<OligoProbe> {
    OligoProbe::new(ids.into_iter().map(|i| (i, records[i].clone())).collect())
}

#[test]
fn test_evenly_spaced_oligos_yield_a_probe() -> Result<()> {
    let records: Vec<Record> = common::oligos("chr1", 100, 10, 8)
        .into_iter()
        .map(|r| r.with_score(0.0))
        .collect();
    let builder = builder(10, 500)?;
    let mut group = OligoGroup::new(records);
    let probes = builder.start(&mut group, &window(None, 1000), 0)?;
    assert!(!probes.is_empty());
    assert!(probes
        .iter()
        .all(|p| p.n_oligos() == 10 && p.size() <= 500));

    let reduced = builder.reduce_probe_list(probes)?;
    assert!(reduced.windows(2).all(|pair| {
        pair[0].range().0 <= pair[1].range().0 && pair[0].count_shared_oligos(&pair[1]) < 5
    }));
    Ok(())
}

#[test]
fn test_overlapping_pair_is_merged() -> Result<()> {
    let records = common::oligos("chr1", 20, 10, 8);
    let builder = builder(10, 500)?;
    let a = probe(0..10, &records)?;
    let b = probe(4..14, &records)?;
    assert_eq!(a.count_shared_oligos(&b), 6);

    let reduced = builder.reduce_probe_list(vec![a.clone(), b])?;
    assert_eq!(reduced.len(), 1);
    // same size, melting range and spacing: the later probe is kept
    assert_eq!(reduced[0].path(), (4..14).collect::<Vec<_>>().as_slice());
    Ok(())
}

#[test]
fn test_relaxation_then_focus_growth() -> Result<()> {
    // a perfect oligo every 30 nt, others need a relaxed threshold
    let records: Vec<Record> = common::oligos("chr1", 300, 10, 8)
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.with_score(if i % 3 == 0 { 0.0 } else { 0.25 }))
        .collect();
    let builder = builder(30, 400)?;
    let mut group = OligoGroup::new(records);

    // the focus starts smaller than a probe, where the threshold is not relaxed
    let probes = builder.start(&mut group, &window(Some((1450, 1550)), 3000), 200)?;
    assert!(!probes.is_empty());
    let (start, end) = group.focus_window().unwrap_or_default();
    assert!(end - start >= 400);
    assert!(probes
        .iter()
        .any(|p| p.oligos().iter().any(|o| o.score.unwrap_or_default() > 0.0)));
    Ok(())
}

#[test]
fn test_probe_set_combinations() -> Result<()> {
    let records = common::oligos("chr1", 40, 10, 8);
    let p1 = probe(0..4, &records)?;
    let p2 = probe(2..6, &records)?;
    let p3 = probe(20..24, &records)?;
    let windows = BTreeMap::from([(0, vec![p1.clone(), p2.clone()]), (1, vec![p3.clone()])]);

    let sets = OligoProbeSetBuilder::combine(&windows);
    assert_eq!(sets.len(), 2);
    let paths: Vec<Vec<&[usize]>> = sets
        .iter()
        .map(|set| set.iter().map(OligoProbe::path).collect())
        .collect();
    assert_eq!(paths[0], vec![p1.path(), p3.path()]);
    assert_eq!(paths[1], vec![p2.path(), p3.path()]);
    Ok(())
}
