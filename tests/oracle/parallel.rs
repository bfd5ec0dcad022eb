//! Many workers filling brackets concurrently, plus a threaded soak.

use std::sync::Arc;

use hyperband::prelude::*;

use crate::{complete, expect_running, score_oracle};

#[test]
fn round0_fills_across_brackets_then_goes_idle() {
    let oracle = score_oracle(4, 2.0, 1);
    assert_eq!(oracle.num_brackets(), 3);

    // All round-0 slots of all brackets can run in parallel:
    // bracket 2 holds 4, brackets 1 and 0 hold 3 each.
    let mut round0 = Vec::new();
    for i in 0..10 {
        let trial = expect_running(&oracle, &format!("worker-{i}"));
        assert_eq!(trial.status(), TrialStatus::Running);
        assert_eq!(trial.allocation().round, 0);
        round0.push(trial);
    }

    let per_bracket = |bracket: usize| {
        round0
            .iter()
            .filter(|t| t.allocation().bracket == bracket)
            .count()
    };
    assert_eq!(per_bracket(2), 4);
    assert_eq!(per_bracket(1), 3);
    assert_eq!(per_bracket(0), 3);
    assert_eq!(oracle.live_brackets(), vec![2, 1, 0]);
    assert_eq!(oracle.ongoing_trials().len(), 10);

    // Round 1 cannot start until round-0 results are in.
    assert!(oracle.create_trial("worker-10").unwrap().is_idle());
}

#[test]
fn completions_unblock_exactly_the_next_rounds_slots() {
    let oracle = score_oracle(4, 2.0, 1);

    let mut round0 = Vec::new();
    for i in 0..10 {
        round0.push(expect_running(&oracle, &format!("worker-{i}")));
    }

    // Finish only bracket 2's round 0.
    for (i, trial) in round0
        .iter()
        .filter(|t| t.allocation().bracket == 2)
        .enumerate()
    {
        complete(&oracle, trial, i as f64);
    }

    // Exactly size(2, 1) = 2 promotions open up.
    let promo_a = expect_running(&oracle, "worker-0");
    let promo_b = expect_running(&oracle, "worker-1");
    for promoted in [&promo_a, &promo_b] {
        assert_eq!(promoted.allocation().bracket, 2);
        assert_eq!(promoted.allocation().round, 1);
        assert!(promoted.hyperparameters().warm_start().is_some());
    }
    assert!(oracle.create_trial("worker-2").unwrap().is_idle());

    // Finish bracket 0; it only has round 0, so the next request
    // retires it.
    for (i, trial) in round0
        .iter()
        .filter(|t| t.allocation().bracket == 0)
        .enumerate()
    {
        complete(&oracle, trial, 100.0 + i as f64);
    }
    assert!(oracle.create_trial("worker-2").unwrap().is_idle());
    assert_eq!(oracle.live_brackets(), vec![2, 1]);

    // Finish bracket 1's round 0: one promotion (its round 1 holds 1).
    for (i, trial) in round0
        .iter()
        .filter(|t| t.allocation().bracket == 1)
        .enumerate()
    {
        complete(&oracle, trial, 200.0 + i as f64);
    }
    let promo_c = expect_running(&oracle, "worker-2");
    assert_eq!(promo_c.allocation().bracket, 1);
    assert_eq!(promo_c.allocation().round, 1);
    assert!(oracle.create_trial("worker-3").unwrap().is_idle());

    complete(&oracle, &promo_c, 300.0);
    assert!(oracle.create_trial("worker-3").unwrap().is_idle());
    assert_eq!(oracle.live_brackets(), vec![2]);

    // Drain bracket 2: finish round 1, then its single round-2 trial.
    complete(&oracle, &promo_a, 10.0);
    complete(&oracle, &promo_b, 11.0);
    let last = expect_running(&oracle, "worker-0");
    assert_eq!(last.allocation().bracket, 2);
    assert_eq!(last.allocation().round, 2);
    assert!(oracle.create_trial("worker-1").unwrap().is_idle());

    complete(&oracle, &last, 12.0);
    assert!(oracle.create_trial("worker-0").unwrap().is_stopped());
    assert!(oracle.live_brackets().is_empty());
}

#[test]
fn threaded_workers_drive_a_sweep_to_completion() {
    let oracle = Arc::new(score_oracle(9, 3.0, 1));

    let handles: Vec<_> = (0..4)
        .map(|w| {
            let oracle = Arc::clone(&oracle);
            std::thread::spawn(move || {
                let worker = format!("worker-{w}");
                let mut metrics = std::collections::HashMap::new();
                loop {
                    match oracle.create_trial(&worker).unwrap() {
                        TrialResponse::Running(trial) => {
                            metrics.insert("score".to_string(), trial.id().raw() as f64);
                            oracle.update_trial(trial.id(), &metrics, 1).unwrap();
                            oracle
                                .end_trial(trial.id(), TrialStatus::Completed)
                                .unwrap();
                        }
                        TrialResponse::Idle => {
                            std::thread::sleep(core::time::Duration::from_millis(1));
                        }
                        TrialResponse::Stopped => break,
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // All 22 slots were scheduled exactly once and everything finished.
    assert_eq!(oracle.n_trials(), 22);
    assert!(oracle.live_brackets().is_empty());
    assert!(oracle.ongoing_trials().is_empty());
    assert!(oracle
        .trials()
        .iter()
        .all(|t| t.status() == TrialStatus::Completed));
    assert!(oracle.best_trial().is_ok());
}
