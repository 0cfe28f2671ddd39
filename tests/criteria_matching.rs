// tests/criteria_matching.rs

use taro::criteria::RunCriteria;
use taro::errors::TaroError;
use taro::types::MatchingStrategy;
use taro_test_utils::builders::{id, JobRunBuilder};

#[test]
fn empty_criteria_match_everything() {
    let criteria = RunCriteria::all();
    assert!(criteria.is_all());
    assert!(criteria.matches_id(&id("anything", "at-all")));
    assert_eq!(criteria.to_string(), "*");
}

#[test]
fn bare_pattern_matches_job_or_run_id() {
    let criteria = RunCriteria::parse("nightly", MatchingStrategy::Exact).unwrap();
    assert!(criteria.matches_id(&id("nightly", "1")));
    assert!(criteria.matches_id(&id("backup", "nightly")));
    assert!(!criteria.matches_id(&id("nightly-2", "1")));
}

#[test]
fn at_sign_selects_job_run_or_both() {
    let job_only = RunCriteria::parse("backup@", MatchingStrategy::Exact).unwrap();
    assert!(job_only.matches_id(&id("backup", "x")));
    assert!(!job_only.matches_id(&id("x", "backup")));

    let run_only = RunCriteria::parse("@42", MatchingStrategy::Exact).unwrap();
    assert!(run_only.matches_id(&id("any", "42")));
    assert!(!run_only.matches_id(&id("42", "1")));

    let both = RunCriteria::parse("backup@42", MatchingStrategy::Exact).unwrap();
    assert!(both.matches_id(&id("backup", "42")));
    assert!(!both.matches_id(&id("backup", "43")));
    assert!(!both.matches_id(&id("restore", "42")));
}

#[test]
fn partial_strategy_matches_substrings() {
    let criteria = RunCriteria::parse("back", MatchingStrategy::Partial).unwrap();
    assert!(criteria.matches(&JobRunBuilder::new("db-backup", "1").build()));
    assert!(!criteria.matches(&JobRunBuilder::new("report", "1").build()));
}

#[test]
fn fn_match_strategy_uses_shell_globs() {
    let criteria = RunCriteria::parse("back*@2026-*", MatchingStrategy::FnMatch).unwrap();
    assert!(criteria.matches_id(&id("backup", "2026-01-01")));
    assert!(!criteria.matches_id(&id("backup", "2025-12-31")));
    assert!(!criteria.matches_id(&id("db-backup", "2026-01-01")));
}

#[test]
fn several_patterns_are_ored() {
    let criteria =
        RunCriteria::parse_all(["alpha@", "@7"], MatchingStrategy::Exact).unwrap();
    assert!(criteria.matches_id(&id("alpha", "1")));
    assert!(criteria.matches_id(&id("beta", "7")));
    assert!(!criteria.matches_id(&id("beta", "1")));
    assert_eq!(criteria.to_string(), "alpha@ @7");
}

#[test]
fn patterns_without_any_id_are_rejected() {
    for pattern in ["", "@", "  "] {
        let err = RunCriteria::parse(pattern, MatchingStrategy::Exact).unwrap_err();
        assert!(matches!(err, TaroError::InvalidPattern(_)), "{pattern:?}: {err}");
    }
}

#[test]
fn invalid_globs_are_rejected() {
    let err = RunCriteria::parse("job[", MatchingStrategy::FnMatch).unwrap_err();
    assert!(matches!(err, TaroError::InvalidPattern(_)));
}
