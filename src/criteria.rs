// src/criteria.rs

//! Instance id patterns used to filter runs.
//!
//! A pattern addresses the job id, the run id, or both:
//!
//! | pattern    | matches                                |
//! |------------|----------------------------------------|
//! | `backup`   | job id **or** run id                   |
//! | `backup@7` | job id **and** run id                  |
//! | `backup@`  | job id only                            |
//! | `@7`       | run id only                            |
//!
//! Multiple patterns are OR-ed; an empty criteria set matches everything.
//! The same predicate is handed to `get_active_runs` and applied again to
//! every incoming event, because events are not pre-filtered.

use std::fmt;

use globset::{Glob, GlobMatcher};

use crate::errors::{Result, TaroError};
use crate::job::{InstanceId, JobRun};
use crate::types::MatchingStrategy;

#[derive(Debug, Clone)]
enum IdMatcher {
    Exact(String),
    Partial(String),
    Glob(GlobMatcher),
}

impl IdMatcher {
    fn new(text: &str, strategy: MatchingStrategy) -> Result<Self> {
        Ok(match strategy {
            MatchingStrategy::Exact => IdMatcher::Exact(text.to_string()),
            MatchingStrategy::Partial => IdMatcher::Partial(text.to_string()),
            MatchingStrategy::FnMatch => {
                let glob = Glob::new(text)
                    .map_err(|e| TaroError::InvalidPattern(format!("'{text}': {e}")))?;
                IdMatcher::Glob(glob.compile_matcher())
            }
        })
    }

    fn is_match(&self, value: &str) -> bool {
        match self {
            IdMatcher::Exact(s) => value == s,
            IdMatcher::Partial(s) => value.contains(s.as_str()),
            IdMatcher::Glob(m) => m.is_match(value),
        }
    }
}

#[derive(Debug, Clone)]
enum IdPattern {
    Either(IdMatcher),
    Job(IdMatcher),
    Run(IdMatcher),
    Both { job: IdMatcher, run: IdMatcher },
}

impl IdPattern {
    fn parse(pattern: &str, strategy: MatchingStrategy) -> Result<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "@" {
            return Err(TaroError::InvalidPattern(format!(
                "'{pattern}' addresses neither a job nor a run"
            )));
        }

        Ok(match pattern.split_once('@') {
            None => IdPattern::Either(IdMatcher::new(pattern, strategy)?),
            Some((job, "")) => IdPattern::Job(IdMatcher::new(job, strategy)?),
            Some(("", run)) => IdPattern::Run(IdMatcher::new(run, strategy)?),
            Some((job, run)) => IdPattern::Both {
                job: IdMatcher::new(job, strategy)?,
                run: IdMatcher::new(run, strategy)?,
            },
        })
    }

    fn matches(&self, id: &InstanceId) -> bool {
        match self {
            IdPattern::Either(m) => m.is_match(&id.job_id) || m.is_match(&id.run_id),
            IdPattern::Job(m) => m.is_match(&id.job_id),
            IdPattern::Run(m) => m.is_match(&id.run_id),
            IdPattern::Both { job, run } => job.is_match(&id.job_id) && run.is_match(&id.run_id),
        }
    }
}

/// Filter predicate over runs, built from command-line patterns.
#[derive(Debug, Clone, Default)]
pub struct RunCriteria {
    raw: Vec<String>,
    patterns: Vec<IdPattern>,
}

impl RunCriteria {
    /// Criteria matching every run.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(pattern: &str, strategy: MatchingStrategy) -> Result<Self> {
        Self::parse_all([pattern], strategy)
    }

    pub fn parse_all<I, S>(patterns: I, strategy: MatchingStrategy) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut criteria = Self::default();
        for p in patterns {
            let p = p.as_ref();
            criteria.patterns.push(IdPattern::parse(p, strategy)?);
            criteria.raw.push(p.to_string());
        }
        Ok(criteria)
    }

    pub fn is_all(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches_id(&self, id: &InstanceId) -> bool {
        self.is_all() || self.patterns.iter().any(|p| p.matches(id))
    }

    pub fn matches(&self, run: &JobRun) -> bool {
        self.matches_id(&run.instance_id)
    }
}

impl fmt::Display for RunCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            f.write_str("*")
        } else {
            f.write_str(&self.raw.join(" "))
        }
    }
}
