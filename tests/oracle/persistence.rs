//! Snapshot round-trips: mid-sweep state survives save/load intact.

use hyperband::prelude::*;

use crate::{complete, expect_running, score_oracle};

fn temp_path() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut path = std::env::temp_dir();
    path.push(format!(
        "hyperband_snapshot_test_{}_{}.json",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path
}

/// Drives a (max_epochs=4, factor=2) sweep to the point where bracket 2
/// is about to promote: all 10 round-0 trials created, bracket 2's four
/// completed.
fn mid_sweep_oracle() -> HyperbandOracle {
    let oracle = score_oracle(4, 2.0, 1);
    let round0: Vec<Trial> = (0..10)
        .map(|i| expect_running(&oracle, &format!("worker-{i}")))
        .collect();
    for (i, trial) in round0
        .iter()
        .filter(|t| t.allocation().bracket == 2)
        .enumerate()
    {
        complete(&oracle, trial, i as f64);
    }
    oracle
}

#[test]
fn blob_round_trip_preserves_the_snapshot_exactly() {
    let oracle = mid_sweep_oracle();

    let blob = oracle.to_blob().unwrap();
    let restored = HyperbandOracle::from_blob(&blob).unwrap();

    assert_eq!(restored.snapshot(), oracle.snapshot());
    assert_eq!(restored.current_iteration(), oracle.current_iteration());
    assert_eq!(restored.live_brackets(), oracle.live_brackets());
    assert_eq!(restored.n_trials(), oracle.n_trials());
    assert_eq!(restored.ongoing_trials(), oracle.ongoing_trials());
}

#[test]
fn restored_oracle_makes_the_same_next_decision() {
    let oracle = mid_sweep_oracle();
    let restored = HyperbandOracle::from_blob(&oracle.to_blob().unwrap()).unwrap();

    // Both should promote bracket 2's champion into round 1.
    let original_next = expect_running(&oracle, "worker-0");
    let restored_next = expect_running(&restored, "worker-0");

    assert_eq!(restored_next.id(), original_next.id());
    assert_eq!(restored_next.allocation(), original_next.allocation());
    assert_eq!(
        restored_next.hyperparameters().warm_start(),
        original_next.hyperparameters().warm_start()
    );
    // Promotions copy the champion's assignment, so the whole trial
    // matches — sampling is not involved.
    assert_eq!(restored_next, original_next);
}

#[test]
fn restored_oracle_finishes_the_sweep() {
    let restored = HyperbandOracle::from_blob(&mid_sweep_oracle().to_blob().unwrap()).unwrap();

    let mut score = 100.0;
    let mut created = 0;
    loop {
        match restored.create_trial("worker-0").unwrap() {
            TrialResponse::Running(trial) => {
                created += 1;
                score += 1.0;
                complete(&restored, &trial, score);
            }
            TrialResponse::Idle => {
                // The only outstanding work is the six still-running
                // round-0 trials from before the snapshot.
                for trial in restored.trials() {
                    if trial.status() == TrialStatus::Running {
                        score += 1.0;
                        complete(&restored, &trial, score);
                    }
                }
            }
            TrialResponse::Stopped => break,
        }
    }

    // 2 + 1 promotions in bracket 2, 1 in bracket 1: 4 created after resume.
    assert_eq!(created, 4);
    assert!(restored.live_brackets().is_empty());
    assert!(restored
        .trials()
        .iter()
        .all(|t| t.status().is_terminal()));
}

#[test]
fn save_and_load_through_a_file() {
    let oracle = mid_sweep_oracle();
    let path = temp_path();

    oracle.save(&path).unwrap();
    let loaded = HyperbandOracle::load(&path).unwrap();

    assert_eq!(loaded.snapshot(), oracle.snapshot());

    std::fs::remove_file(&path).ok();
}

#[test]
fn version_mismatch_is_surfaced_distinctly() {
    let mut snapshot = mid_sweep_oracle().snapshot();
    snapshot.version = 99;

    let err = HyperbandOracle::from_snapshot(snapshot).unwrap_err();
    assert!(matches!(
        err,
        Error::SnapshotVersion {
            expected: 1,
            found: 99
        }
    ));
}

#[test]
fn corrupt_blob_is_a_snapshot_error() {
    let err = HyperbandOracle::from_blob(b"{ not json").unwrap_err();
    assert!(matches!(err, Error::Snapshot(_)));
}

#[test]
fn snapshot_referencing_missing_trials_is_rejected() {
    let mut snapshot = mid_sweep_oracle().snapshot();
    // Drop a trial record that bracket bookkeeping still references.
    snapshot.trials.remove(0);

    let err = HyperbandOracle::from_snapshot(snapshot).unwrap_err();
    assert!(matches!(err, Error::Snapshot(_)));
}

#[test]
fn snapshot_with_invalid_config_is_rejected() {
    let mut snapshot = mid_sweep_oracle().snapshot();
    snapshot.factor = 0.5;

    let err = HyperbandOracle::from_snapshot(snapshot).unwrap_err();
    assert!(matches!(err, Error::InvalidFactor(_)));
}
