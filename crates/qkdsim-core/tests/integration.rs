//! Integration tests for qkdsim-core.
//!
//! These tests drive the public API end to end:
//! measurement source → sifting → Cascade → amplification, and
//! shell commands → sweep → ledger → export.

use qkdsim_core::{
    AbortReason, BackendSelector, CascadeParams, ChannelParam, DerivationOptions, Mode,
    ParamRange, Session, SessionExport, Shell, SweepMode, amplify, derive_key,
    derive_key_configured, reconcile, sift,
};

use rand::SeedableRng;
use rand::rngs::StdRng;

fn shell(seed: u64, photons: usize) -> Shell {
    let mut session = Session::new(Some(seed)).expect("seeded session");
    session.simulation.photons = photons;
    Shell::new(session)
}

fn feed(sh: &mut Shell, script: &str) -> Vec<String> {
    script
        .lines()
        .flat_map(|line| sh.execute(line).lines)
        .collect()
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

#[test]
fn derive_key_local_end_to_end() {
    let run = derive_key(2000, &BackendSelector::Local, 2024).unwrap();
    let n = run.sender_bits.len();
    assert_eq!(n, 2000);
    assert_eq!(run.receiver_bits.len(), n);
    assert!(run.sifted.len() > 850 && run.sifted.len() < 1150);
    assert_eq!(run.qber, 0.0);
    assert_eq!(run.secret_key.bit_len(), (run.sifted.len() as f64 * 0.9).floor() as usize);
    assert_eq!(run.secret_key.to_hex().len(), run.secret_key.bit_len().div_ceil(8) * 2);
}

#[test]
fn derive_key_noisy_matches_manual_pipeline_invariants() {
    let run = derive_key(4096, &"noisy:0.05".parse().unwrap(), 5).unwrap();
    assert!(run.qber > 0.02 && run.qber < 0.08, "qber = {}", run.qber);
    assert!(run.abort.is_none());
    assert_eq!(run.reconciled, run.sifted.reference);
    assert!(run.secret_key.bit_len() < run.reconciled.len());
}

#[test]
fn derive_key_eavesdropped_lossy_link_is_refused() {
    let options = DerivationOptions {
        eavesdropper: true,
        loss_probability: 0.15,
    };
    let run = derive_key_configured(3000, &BackendSelector::Local, &options, 77).unwrap();
    assert!((run.loss - 0.15).abs() < 0.04, "loss = {}", run.loss);
    assert!(run.qber > 0.15, "qber = {}", run.qber);
    assert_eq!(run.abort, Some(AbortReason::QberAboveThreshold));
    assert!(!run.is_secure());
    assert_eq!(run.interception.as_ref().map(|e| e.bits.len()), Some(3000));
}

#[test]
fn manual_pipeline_with_library_stages() {
    use qkdsim_core::bits::{bases_from_bits, random_bits};

    let mut rng = StdRng::seed_from_u64(31);
    let a_bits = random_bits(&mut rng, 512);
    let a_bases = bases_from_bits(&random_bits(&mut rng, 512));
    let b_bases = bases_from_bits(&random_bits(&mut rng, 512));
    // Receiver reads correctly where bases match, plus a handful of channel errors.
    let mut b_bits = a_bits.clone();
    for i in [3, 77, 200, 201, 450] {
        b_bits[i] ^= 1;
    }

    let pair = sift(&a_bits, &a_bases, &b_bits, &b_bases).unwrap();
    let r = reconcile(&pair.reference, &pair.peer, CascadeParams::default(), &mut rng).unwrap();
    assert_eq!(r.corrected, pair.reference);
    assert_eq!(r.bits_flipped, pair.error_count());

    let key = amplify(&r.corrected, Some(pair.qber()), &mut rng);
    assert!(key.bit_len() <= r.corrected.len());
    assert!(key.bit_len() >= 8);
}

#[test]
fn derive_key_rejects_zero_bits() {
    assert!(derive_key(0, &BackendSelector::Local, 1).is_err());
}

// ---------------------------------------------------------------------------
// Shell-driven sweeps
// ---------------------------------------------------------------------------

const COMBO_SCRIPT: &str = "\
enable
experiment configure
sweep mode combo
sweep parameter loss 0 0.2 step 0.05
sweep parameter channel-noise 0 0.2 step 0.05
exit
run bb84
";

#[test]
fn combo_sweep_produces_twenty_five_runs() {
    let mut sh = shell(8, 300);
    let out = feed(&mut sh, COMBO_SCRIPT);
    assert_eq!(out.last().map(String::as_str), Some("Experiment completed."));
    let results = sh.session().ledger().results();
    assert_eq!(results.len(), 25);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.run_index, i + 1);
        assert_eq!(r.params.len(), 2);
    }
    // Last-declared parameter varies fastest.
    assert_eq!(results[1].params[1].value, 0.05);
    assert_eq!(results[5].params[0].value, 0.05);
    // Noise 0.2 is far above threshold.
    assert!(results.iter().filter(|r| r.params[1].value == 0.2).all(|r| !r.secure));
    assert_eq!(sh.mode(), Mode::Privileged);
}

#[test]
fn same_seed_reproduces_ledger() {
    let mut a = shell(123, 500);
    let mut b = shell(123, 500);
    feed(&mut a, COMBO_SCRIPT);
    feed(&mut b, COMBO_SCRIPT);
    assert_eq!(a.session().ledger(), b.session().ledger());

    let mut c = shell(124, 500);
    feed(&mut c, COMBO_SCRIPT);
    assert_ne!(a.session().ledger(), c.session().ledger());
}

#[test]
fn parallel_sweep_matches_sequential() {
    let mut seq = shell(77, 400);
    let mut par = shell(77, 400);
    par.session_mut().set_workers(4);
    feed(&mut seq, COMBO_SCRIPT);
    feed(&mut par, COMBO_SCRIPT);
    assert_eq!(seq.session().ledger(), par.session().ledger());
}

#[test]
fn lossy_long_link_loses_key() {
    let mut session = Session::new(Some(3)).unwrap();
    session.simulation.photons = 2000;
    session.sweep.set_mode(SweepMode::Single);
    session
        .sweep
        .set_parameter(ChannelParam::Distance, ParamRange::new(0.0, 400.0, 200.0).unwrap())
        .unwrap();
    session.channel.set(ChannelParam::Loss, 0.2).unwrap();

    let results = session.run_sweep(false).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].secure);
    assert!(results[0].sifted_length > results[1].sifted_length);
    assert_eq!(results[2].sifted_length, 0);
    assert_eq!(results[2].abort, Some(AbortReason::NoSiftedKey));
}

#[test]
fn errors_never_end_the_session() {
    let mut sh = shell(1, 100);
    let out = feed(
        &mut sh,
        "enable\nrun bb84\nconfigure terminal\nset loss -1\nsweep mode single\nbogus\nexit",
    );
    assert_eq!(out.iter().filter(|l| l.starts_with("% ")).count(), 4);
    assert_eq!(sh.mode(), Mode::Privileged);
    assert!(!sh.is_finished());
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn export_round_trips_through_json_file() {
    let mut sh = shell(55, 200);
    feed(&mut sh, COMBO_SCRIPT);
    let export = sh.session().export();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, serde_json::to_string_pretty(&export).unwrap()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let back: SessionExport = serde_json::from_str(&text).unwrap();
    assert_eq!(back.meta.seed, 55);
    assert_eq!(back.results.len(), 25);
    for (a, b) in back.results.iter().zip(&export.results) {
        assert_eq!(a.run_index, b.run_index);
        assert_eq!(a.sifted_length, b.sifted_length);
        assert_eq!(a.secure, b.secure);
        assert_eq!(a.abort, b.abort);
        assert!((a.qber - b.qber).abs() < 1e-12);
    }
    assert!(text.contains("\"channel-noise\""));
}
