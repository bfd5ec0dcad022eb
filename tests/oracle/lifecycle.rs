//! Trial lifecycle contracts: updates, finalization, ranking, failures.

use std::collections::HashMap;

use hyperband::prelude::*;

use crate::{complete, expect_running, score_oracle};

fn score_metrics(score: f64) -> HashMap<String, f64> {
    let mut metrics = HashMap::new();
    metrics.insert("score".to_string(), score);
    metrics
}

#[test]
fn re_reporting_a_step_overwrites_instead_of_duplicating() {
    let oracle = score_oracle(2, 2.0, 1);
    let trial = expect_running(&oracle, "worker-0");

    oracle.update_trial(trial.id(), &score_metrics(0.5), 1).unwrap();
    oracle.update_trial(trial.id(), &score_metrics(0.9), 1).unwrap();

    let stored = oracle.get_trial(trial.id()).unwrap();
    assert_eq!(stored.metrics().observations("score"), &[(1, 0.9)]);
    assert_eq!(stored.score(), Some(0.9));
}

#[test]
fn unknown_trial_ids_are_rejected() {
    let oracle = score_oracle(2, 2.0, 1);
    let ghost = TrialId::new(999);

    assert!(matches!(
        oracle.update_trial(ghost, &score_metrics(1.0), 1),
        Err(Error::UnknownTrial(_))
    ));
    assert!(matches!(
        oracle.end_trial(ghost, TrialStatus::Completed),
        Err(Error::UnknownTrial(_))
    ));
}

#[test]
fn end_trial_requires_a_terminal_status() {
    let oracle = score_oracle(2, 2.0, 1);
    let trial = expect_running(&oracle, "worker-0");

    assert!(matches!(
        oracle.end_trial(trial.id(), TrialStatus::Running),
        Err(Error::NotTerminalStatus(TrialStatus::Running))
    ));
}

#[test]
fn finalizing_twice_is_an_error() {
    let oracle = score_oracle(2, 2.0, 1);
    let trial = expect_running(&oracle, "worker-0");
    complete(&oracle, &trial, 1.0);

    assert!(matches!(
        oracle.end_trial(trial.id(), TrialStatus::Invalid),
        Err(Error::TrialAlreadyFinished { .. })
    ));
    assert!(matches!(
        oracle.update_trial(trial.id(), &score_metrics(2.0), 2),
        Err(Error::TrialAlreadyFinished { .. })
    ));
}

#[test]
fn invalid_trials_are_skipped_for_promotion() {
    // Bracket 1 of (max_epochs=2, factor=2) runs rounds of 2 then 1.
    let oracle = score_oracle(2, 2.0, 1);

    let strong = expect_running(&oracle, "worker-0");
    let weak = expect_running(&oracle, "worker-1");
    assert_eq!(strong.allocation().bracket, 1);
    assert_eq!(weak.allocation().bracket, 1);

    // The higher scorer fails; the survivor must be promoted instead.
    oracle.update_trial(strong.id(), &score_metrics(9.0), 1).unwrap();
    oracle.end_trial(strong.id(), TrialStatus::Invalid).unwrap();
    oracle.update_trial(weak.id(), &score_metrics(1.0), 1).unwrap();
    oracle.end_trial(weak.id(), TrialStatus::Completed).unwrap();

    let promoted = expect_running(&oracle, "worker-0");
    assert_eq!(promoted.allocation().round, 1);
    assert_eq!(promoted.hyperparameters().warm_start(), Some(weak.id()));
}

#[test]
fn abandoned_failures_do_not_stall_the_bracket() {
    // All of round 0 fails: the bracket collapses and the sweep moves on.
    let oracle = score_oracle(2, 2.0, 1);

    for worker in ["worker-0", "worker-1"] {
        let trial = expect_running(&oracle, worker);
        assert_eq!(trial.allocation().bracket, 1);
        oracle.end_trial(trial.id(), TrialStatus::Invalid).unwrap();
    }

    // No survivor to promote; the next slots come from bracket 0.
    let trial = expect_running(&oracle, "worker-0");
    assert_eq!(trial.allocation().bracket, 0);
}

#[test]
fn best_trials_rank_by_score_with_earliest_created_tiebreak() {
    let oracle = score_oracle(4, 2.0, 1);

    let trials: Vec<Trial> = (0..10)
        .map(|i| expect_running(&oracle, &format!("worker-{i}")))
        .collect();

    // Two trials tie at the top; one fails with an even higher score.
    let scores = [5.0, 9.0, 3.0, 9.0, 1.0, 2.0, 4.0, 6.0, 7.0, 8.0];
    for (trial, score) in trials.iter().zip(scores) {
        oracle.update_trial(trial.id(), &score_metrics(score), 1).unwrap();
        let status = if trial.id() == trials[4].id() {
            TrialStatus::Invalid
        } else {
            TrialStatus::Completed
        };
        oracle.end_trial(trial.id(), status).unwrap();
    }

    let best = oracle.get_best_trials(3);
    assert_eq!(best.len(), 3);
    // 9.0 twice (earliest id first), then 8.0.
    assert_eq!(best[0].id(), trials[1].id());
    assert_eq!(best[1].id(), trials[3].id());
    assert_eq!(best[2].score(), Some(8.0));

    // Asking for more than exists returns what exists; the invalid
    // trial is never ranked.
    let all = oracle.get_best_trials(100);
    assert_eq!(all.len(), 9);
    assert!(all.iter().all(|t| t.id() != trials[4].id()));
}

#[test]
fn best_trial_errors_before_any_completion() {
    let oracle = score_oracle(2, 2.0, 1);
    assert!(matches!(oracle.best_trial(), Err(Error::NoCompletedTrials)));
}

#[test]
fn ongoing_trials_tracks_workers_until_finalization() {
    let oracle = score_oracle(2, 2.0, 1);

    let trial = expect_running(&oracle, "worker-7");
    assert_eq!(oracle.ongoing_trials().get("worker-7"), Some(&trial.id()));

    complete(&oracle, &trial, 1.0);
    assert!(oracle.ongoing_trials().get("worker-7").is_none());
}

/// A sampler that always introduces a name the configured space never
/// declared, the way a conditional search space does.
struct ExpandingSampler {
    inner: RandomSampler,
}

impl Sampler for ExpandingSampler {
    fn sample(&self, space: &HyperparameterSpace) -> HyperparameterSpace {
        let mut assignment = self.inner.sample(space);
        assignment
            .declare("units_extra", ParamDomain::int(1, 5))
            .unwrap();
        assignment.set("units_extra", ParamValue::Int(3)).unwrap();
        assignment
    }
}

#[test]
fn search_space_grows_by_union_as_samplers_add_names() {
    let oracle = HyperbandOracle::builder()
        .max_epochs(2)
        .factor(2.0)
        .objective(Objective::maximize("score"))
        .search_space(crate::demo_space())
        .sampler(ExpandingSampler {
            inner: RandomSampler::with_seed(1),
        })
        .build()
        .unwrap();

    assert!(oracle.search_space().domain("units_extra").is_none());
    let _ = expect_running(&oracle, "worker-0");

    let grown = oracle.search_space();
    assert_eq!(grown.domain("units_extra"), Some(&ParamDomain::int(1, 5)));
    // The original names are still there, in declaration order.
    let names: Vec<_> = grown.names().collect();
    assert_eq!(names, vec!["a", "b", "units_extra"]);
}
