use minblast_core::sketch::compute;
use minblast_core::SketchParams;

const PROTEIN: &[u8] = b"MASTQNIVEEVQKMLDTYDTNKDGEITKAEAVEYFKGKKAFNPERSIDFKGLVALLEY";

#[test]
fn it_is_deterministic() {
    let p = SketchParams::default();
    assert_eq!(compute(PROTEIN, p), compute(PROTEIN, p));
}

#[test]
fn it_respects_the_window_bound() {
    let p = SketchParams::new(5, 10).unwrap();
    for n in 0..=5 {
        assert!(compute(&PROTEIN[..n], p).is_empty(), "len {n}");
    }
    let one = compute(&PROTEIN[..6], p);
    assert_eq!(one.len(), 1);
    assert!(one.contains(&PROTEIN[..5].to_vec()));
}

#[test]
fn every_minimizer_is_a_kmer_of_the_sequence() {
    let p = SketchParams::new(4, 6).unwrap();
    let mins = compute(PROTEIN, p);
    assert!(!mins.is_empty());
    assert!(mins.len() <= PROTEIN.len() - p.k);
    for m in &mins {
        assert_eq!(m.len(), 4);
        assert!(PROTEIN.windows(4).any(|w| w == m.as_slice()));
    }
}

#[test]
fn wider_windows_select_fewer_minimizers() {
    let narrow = compute(PROTEIN, SketchParams::new(3, 1).unwrap());
    let wide = compute(PROTEIN, SketchParams::new(3, 20).unwrap());
    assert!(wide.len() < narrow.len());
}

#[test]
fn invalid_params_are_rejected() {
    assert!(SketchParams::new(0, 10).is_err());
    assert!(SketchParams::new(5, 0).is_err());
}
