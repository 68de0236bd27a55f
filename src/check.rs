// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use relative_path::{RelativePath, RelativePathBuf};

use crate::{
    lint::{Linter, Severity, Violation},
    schema::{Schema, SchemaError},
    store::BundleStore,
    workflow::Stage,
};

/// Everything wrong with one bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub slug: RelativePathBuf,
    pub stage: Stage,
    pub schema: Vec<SchemaError>,
    pub violations: Vec<Violation>,
    /// The sidecar's `status`, when it disagrees with the journal.
    pub stale_status: Option<Stage>,
}

impl Report {
    pub fn has_errors(&self) -> bool {
        !self.schema.is_empty()
            || self
                .violations
                .iter()
                .any(|violation| violation.severity == Severity::Error)
    }

    pub fn is_clean(&self) -> bool {
        self.schema.is_empty() && self.violations.is_empty() && self.stale_status.is_none()
    }
}

/// Validates and lints the bundle at `slug`.
pub fn check(
    store: &BundleStore,
    schema: &Schema,
    linter: &Linter,
    slug: &RelativePath,
) -> crate::Result<Report> {
    let article = store.load(slug)?;
    let problems = schema.problems(article.sidecar());

    // The journal is authoritative; the sidecar field is only a hint for readers.
    let stale_status = match article.metadata(schema) {
        Ok(metadata) => metadata.status.filter(|status| *status != article.stage()),
        Err(_) => None,
    };

    if let Some(status) = stale_status {
        log::warn!(
            "`{}` says status {} but its journal is at {}",
            slug,
            status,
            article.stage()
        );
    }

    Ok(Report {
        slug: slug.to_owned(),
        stage: article.stage(),
        schema: problems,
        violations: article.lint(linter).collect(),
        stale_status,
    })
}
