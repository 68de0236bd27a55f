// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A step of the editorial process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Proposed,
    Drafting,
    InReview,
    Editing,
    Approved,
    Published,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Proposed,
        Stage::Drafting,
        Stage::InReview,
        Stage::Editing,
        Stage::Approved,
        Stage::Published,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Proposed => "proposed",
            Stage::Drafting => "drafting",
            Stage::InReview => "in-review",
            Stage::Editing => "editing",
            Stage::Approved => "approved",
            Stage::Published => "published",
        }
    }

    /// Stages reachable in one step. `InReview -> Drafting` is the only backwards edge.
    pub fn successors(self) -> &'static [Stage] {
        match self {
            Stage::Proposed => &[Stage::Drafting],
            Stage::Drafting => &[Stage::InReview],
            Stage::InReview => &[Stage::Editing, Stage::Drafting],
            Stage::Editing => &[Stage::Approved],
            Stage::Approved => &[Stage::Published],
            Stage::Published => &[],
        }
    }

    pub fn can_transition_to(self, to: Stage) -> bool {
        self.successors().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|stage| stage.as_str()).collect()
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Proposed
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown workflow stage `{0}`")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    /// Case-insensitive; `in_review` and `in-review` are the same stage.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase().replace('_', "-");

        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| ParseStageError(value.to_owned()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("illegal transition from `{from}` to `{to}`")]
    IllegalTransition { from: Stage, to: Stage },
    #[error("stale revision: expected {expected}, article is at {actual}")]
    StaleRevision { expected: u64, actual: u64 },
    #[error("article was superseded by `{by}`")]
    Superseded { by: String },
    #[error("inconsistent journal: {0}")]
    Inconsistent(String),
}

/// One recorded stage change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Stage, revision counter and audit trail of one article.
///
/// Every mutating call takes the revision the caller last saw; a mismatch is
/// rejected before anything changes, so two reviewers cannot both advance
/// the same article from the same starting point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    stage: Stage,
    revision: u64,
    #[serde(default)]
    history: Vec<Transition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    superseded: Option<Supersession>,
}

/// Marks an article replaced by another one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supersession {
    pub by: String,
    pub at: DateTime<Utc>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            stage: Stage::Proposed,
            revision: 0,
            history: vec![],
            superseded: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    pub fn superseded(&self) -> Option<&Supersession> {
        self.superseded.as_ref()
    }

    pub fn advance(
        &mut self,
        to: Stage,
        expected_revision: u64,
        at: DateTime<Utc>,
    ) -> Result<&Transition, WorkflowError> {
        self.transition(to, expected_revision, at, None)
    }

    /// The reviewer's "changes requested" edge, `InReview -> Drafting`.
    pub fn request_changes(
        &mut self,
        expected_revision: u64,
        at: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<&Transition, WorkflowError> {
        if self.stage != Stage::InReview {
            self.check_live()?;
            self.check_revision(expected_revision)?;
            return Err(WorkflowError::IllegalTransition {
                from: self.stage,
                to: Stage::Drafting,
            });
        }

        self.transition(Stage::Drafting, expected_revision, at, note)
    }

    /// Retire the article in favour of `by`. Nothing is deleted; the journal
    /// keeps the full history and refuses any further transitions.
    pub fn supersede(
        &mut self,
        by: &str,
        expected_revision: u64,
        at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        self.check_live()?;
        self.check_revision(expected_revision)?;

        self.superseded = Some(Supersession {
            by: by.to_owned(),
            at,
        });
        self.revision += 1;

        Ok(())
    }

    fn transition(
        &mut self,
        to: Stage,
        expected_revision: u64,
        at: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<&Transition, WorkflowError> {
        self.check_live()?;
        self.check_revision(expected_revision)?;

        if !self.stage.can_transition_to(to) {
            return Err(WorkflowError::IllegalTransition {
                from: self.stage,
                to,
            });
        }

        log::debug!("{} -> {} at revision {}", self.stage, to, self.revision);

        self.history.push(Transition {
            from: self.stage,
            to,
            at,
            note,
        });
        self.stage = to;
        self.revision += 1;

        Ok(&self.history[self.history.len() - 1])
    }

    /// Checks that a journal read from disk could have been produced by
    /// this state machine: a chain of legal steps from `Proposed` that ends
    /// at the current stage, with one revision per change.
    pub fn verify(&self) -> Result<(), WorkflowError> {
        let inconsistent = |reason: String| Err(WorkflowError::Inconsistent(reason));
        let mut stage = Stage::Proposed;

        for (index, transition) in self.history.iter().enumerate() {
            if transition.from != stage {
                return inconsistent(format!(
                    "step {} starts at `{}` but the article was `{}`",
                    index + 1,
                    transition.from,
                    stage
                ));
            }
            if !transition.from.can_transition_to(transition.to) {
                return inconsistent(format!(
                    "step {} goes from `{}` to `{}`",
                    index + 1,
                    transition.from,
                    transition.to
                ));
            }
            stage = transition.to;
        }

        if stage != self.stage {
            return inconsistent(format!(
                "history ends at `{}` but the stage is `{}`",
                stage, self.stage
            ));
        }

        let changes = self.history.len() as u64 + u64::from(self.superseded.is_some());
        if self.revision != changes {
            return inconsistent(format!(
                "revision {} after {} change(s)",
                self.revision, changes
            ));
        }

        Ok(())
    }

    fn check_live(&self) -> Result<(), WorkflowError> {
        match &self.superseded {
            Some(superseded) => Err(WorkflowError::Superseded {
                by: superseded.by.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_revision(&self, expected: u64) -> Result<(), WorkflowError> {
        if expected == self.revision {
            Ok(())
        } else {
            Err(WorkflowError::StaleRevision {
                expected,
                actual: self.revision,
            })
        }
    }
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Default, Clone, Copy, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};

    use super::{Stage, Workflow, WorkflowError};

    const ALLOWED: [(Stage, Stage); 6] = [
        (Stage::Proposed, Stage::Drafting),
        (Stage::Drafting, Stage::InReview),
        (Stage::InReview, Stage::Editing),
        (Stage::InReview, Stage::Drafting),
        (Stage::Editing, Stage::Approved),
        (Stage::Approved, Stage::Published),
    ];

    fn at(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    /// Walks a fresh workflow along forward edges until it sits at `stage`.
    fn workflow_at(stage: Stage) -> Workflow {
        let mut workflow = Workflow::new();
        let path = [
            Stage::Drafting,
            Stage::InReview,
            Stage::Editing,
            Stage::Approved,
            Stage::Published,
        ];

        for next in path {
            if workflow.stage() == stage {
                break;
            }
            let revision = workflow.revision();
            workflow.advance(next, revision, at(1)).unwrap();
        }

        assert_eq!(workflow.stage(), stage);
        workflow
    }

    #[test]
    fn transition_table() {
        for from in Stage::ALL {
            for to in Stage::ALL {
                let mut workflow = workflow_at(from);
                let before = workflow.clone();
                let result = workflow.advance(to, before.revision(), at(2));

                if ALLOWED.contains(&(from, to)) {
                    assert!(result.is_ok(), "{from} -> {to} should be allowed");
                    assert_eq!(workflow.stage(), to);
                    assert_eq!(workflow.revision(), before.revision() + 1);
                } else {
                    assert_eq!(result, Err(WorkflowError::IllegalTransition { from, to }));
                    assert_eq!(workflow, before);
                }
            }
        }
    }

    #[test]
    fn history_records_each_step() {
        let mut workflow = Workflow::new();
        workflow.advance(Stage::Drafting, 0, at(1)).unwrap();
        workflow.advance(Stage::InReview, 1, at(2)).unwrap();
        workflow
            .request_changes(2, at(3), Some("tighten the intro".into()))
            .unwrap();

        let history = workflow.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].from, Stage::InReview);
        assert_eq!(history[2].to, Stage::Drafting);
        assert_eq!(history[2].at, at(3));
        assert_eq!(history[2].note.as_deref(), Some("tighten the intro"));
    }

    #[test]
    fn request_changes_only_from_review() {
        let mut workflow = workflow_at(Stage::Editing);
        let revision = workflow.revision();
        assert_eq!(
            workflow.request_changes(revision, at(4), None),
            Err(WorkflowError::IllegalTransition {
                from: Stage::Editing,
                to: Stage::Drafting
            })
        );
    }

    #[test]
    fn stale_revision_is_rejected() {
        let mut workflow = Workflow::new();
        workflow.advance(Stage::Drafting, 0, at(1)).unwrap();

        let before = workflow.clone();
        assert_eq!(
            workflow.advance(Stage::InReview, 0, at(2)),
            Err(WorkflowError::StaleRevision {
                expected: 0,
                actual: 1
            })
        );
        assert_eq!(workflow, before);
    }

    #[test]
    fn superseded_article_is_frozen() {
        let mut workflow = workflow_at(Stage::Drafting);
        workflow.supersede("ruby/bundler-2", 1, at(5)).unwrap();

        assert_eq!(workflow.superseded().map(|s| s.by.as_str()), Some("ruby/bundler-2"));
        assert_eq!(workflow.revision(), 2);
        assert_eq!(
            workflow.advance(Stage::InReview, 2, at(6)),
            Err(WorkflowError::Superseded {
                by: "ruby/bundler-2".into()
            })
        );
    }

    #[test]
    fn stage_names() {
        assert_eq!("in-review".parse::<Stage>(), Ok(Stage::InReview));
        assert_eq!("In_Review".parse::<Stage>(), Ok(Stage::InReview));
        assert!("archived".parse::<Stage>().is_err());
        assert!(Stage::Published.is_terminal());
    }

    #[test]
    fn journal_yaml_uses_kebab_names() {
        let workflow = workflow_at(Stage::InReview);
        let yaml = serde_yaml::to_string(&workflow).unwrap();

        assert!(yaml.contains("stage: in-review"));
        assert_eq!(serde_yaml::from_str::<Workflow>(&yaml).unwrap(), workflow);
    }

    #[test]
    fn recorded_workflows_verify() {
        for stage in Stage::ALL {
            assert_eq!(workflow_at(stage).verify(), Ok(()));
        }

        let mut superseded = workflow_at(Stage::Editing);
        superseded.supersede("ruby/bundler-2", 3, at(2)).unwrap();
        assert_eq!(superseded.verify(), Ok(()));
    }

    #[test]
    fn forged_journals_fail_verification() {
        let skipped: Workflow =
            serde_yaml::from_str("stage: approved\nrevision: 0\nhistory: []\n").unwrap();
        assert!(matches!(skipped.verify(), Err(WorkflowError::Inconsistent(_))));

        let jump: Workflow = serde_yaml::from_str(
            "stage: approved\nrevision: 1\nhistory:\n- from: proposed\n  to: approved\n  at: 2024-03-01T12:00:00Z\n",
        )
        .unwrap();
        assert!(matches!(jump.verify(), Err(WorkflowError::Inconsistent(_))));

        let mut miscounted = workflow_at(Stage::Drafting);
        miscounted.revision = 7;
        assert!(matches!(miscounted.verify(), Err(WorkflowError::Inconsistent(_))));
    }
}
