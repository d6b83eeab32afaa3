use minblast_core::builder::IndexBuilder;
use minblast_core::index::IndexStore;
use minblast_core::persist::{load_flat_index, load_meta, load_sequence_store, write_index, IndexPaths};
use minblast_core::search::{num_to_check, search};
use minblast_core::sketch::compute;
use minblast_core::SketchParams;

fn collection() -> Vec<(String, Vec<u8>)> {
    vec![
        ("sp|P0|ALPHA alpha chain".into(), b"MASTQNIVEEVQKMLDTYDTNKDGEITKAEAV".to_vec()),
        ("sp|P1|BETA beta chain".into(), b"GSHMKKLLPTAAAGLLLLAAQPAMAMDIGINSDP".to_vec()),
        ("sp|P2|GAMMA gamma chain".into(), b"MKVLAAGIVGLLLAAQPAMAQVQLQESGGGLVQ".to_vec()),
        ("short".into(), b"MKV".to_vec()),
        ("sp|P4|DELTA stop codons".into(), b"MWWRRHHKK*DEEPPQQ*".to_vec()),
    ]
}

#[test]
fn scenario_from_two_records() {
    let params = SketchParams::new(5, 10).unwrap();
    let (idx, _) = IndexBuilder::build(params, [("r0", "AAAAMVVVV"), ("r1", "MVVVVAAAA")]).unwrap();
    assert!(search(b"AAAAM", &idx, params, 0.5, 10).unwrap().hits.is_empty());
    let out = search(b"AAAAMVVVV", &idx, params, 0.5, 10).unwrap();
    assert_eq!(out.hits[0].seq_id, 0);
    assert!(out.hits[0].votes > 0);
}

#[test]
fn unique_minimizer_posts_only_its_sequence() {
    let params = SketchParams::new(4, 3).unwrap();
    let recs = collection();
    let (idx, _) = IndexBuilder::build(params, recs.iter().map(|(d, r)| (d.as_str(), r.as_slice()))).unwrap();
    let sketches: Vec<_> = recs.iter().map(|(_, r)| compute(r, params)).collect();
    let mut checked = 0;
    for (i, sk) in sketches.iter().enumerate() {
        for m in sk {
            if sketches.iter().enumerate().all(|(j, other)| j == i || !other.contains(m)) {
                assert_eq!(idx.lookup(m).unwrap().unwrap().to_vec(), vec![i as u32]);
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}

#[test]
fn resolve_returns_original_residues_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("index");
    let params = SketchParams::default();
    let recs = collection();
    let (idx, seqs) = IndexBuilder::build(params, recs.iter().map(|(d, r)| (d.as_str(), r.as_slice()))).unwrap();
    write_index(&root, &idx, &seqs, params, false).unwrap();

    let paths = IndexPaths::new(&root);
    let store = load_sequence_store(&paths).unwrap();
    assert_eq!(store.len(), recs.len());
    for (i, (desc, residues)) in recs.iter().enumerate() {
        let rec = store.resolve(i as u32).unwrap();
        assert_eq!(&rec.residues, residues);
        assert_eq!(&rec.description, desc);
    }
    assert!(store.resolve(recs.len() as u32).is_err());
    assert_eq!(load_meta(&paths).unwrap().num_sequences as usize, recs.len());
    assert_eq!(load_flat_index(&paths).unwrap().size(), idx.size());
}

#[test]
fn ranking_is_monotonic_and_budget_is_respected() {
    let params = SketchParams::new(3, 2).unwrap();
    let recs = collection();
    let (idx, _) = IndexBuilder::build(params, recs.iter().map(|(d, r)| (d.as_str(), r.as_slice()))).unwrap();
    let query = b"MKVLAAGLLLLAAQPAMAMDIGIN";
    for (frac, min) in [(0.1, 0), (0.5, 2), (1.0, 0), (0.3, 100)] {
        let out = search(query, &idx, params, frac, min).unwrap();
        let retained = compute(query, params).iter().filter(|m| idx.lookup(m).unwrap().is_some()).count();
        assert_eq!(out.retained, retained);
        assert_eq!(out.checked, num_to_check(retained, frac, min));
        assert!(out.hits.windows(2).all(|w| w[0].votes >= w[1].votes));
    }
}
