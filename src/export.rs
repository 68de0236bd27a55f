// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::path::Path;

use chrono::{DateTime, Utc};
use relative_path::{RelativePath, RelativePathBuf};
use thiserror::Error;

use crate::{
    article::Article,
    config::{BundleConfig, Config},
    lint::{Linter, Severity, Violation},
    metadata::Metadata,
    schema::{Schema, SchemaError},
    store::{BundleStore, StoreError},
    workflow::{Stage, Workflow, WorkflowError},
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("`{slug}` is {stage}; only approved articles can be exported")]
    NotReady { slug: String, stage: Stage },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("`{slug}` has {count} style error(s), first at {first}")]
    Lint {
        slug: String,
        count: usize,
        first: Violation,
    },
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not serialize metadata: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("handoff to the publishing collaborator failed: {0:#}")]
    Handoff(#[source] anyhow::Error),
}

/// What the publishing collaborator receives. Fixed once built.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportBundle {
    slug: RelativePathBuf,
    metadata: Metadata,
    sidecar_yaml: String,
    body: String,
    workflow: Workflow,
    digest: String,
    exported_at: DateTime<Utc>,
}

impl ExportBundle {
    fn new(
        slug: RelativePathBuf,
        metadata: Metadata,
        body: String,
        workflow: Workflow,
        exported_at: DateTime<Utc>,
    ) -> Result<Self, ExportError> {
        let sidecar_yaml = metadata.to_yaml()?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(sidecar_yaml.as_bytes());
        hasher.update(&[0]);
        hasher.update(body.as_bytes());

        Ok(Self {
            slug,
            metadata,
            sidecar_yaml,
            body,
            workflow,
            digest: hasher.finalize().to_hex().to_string(),
            exported_at,
        })
    }

    pub fn slug(&self) -> &RelativePath {
        &self.slug
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The normalized sidecar exactly as it is written out.
    pub fn sidecar_yaml(&self) -> &str {
        &self.sidecar_yaml
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The journal after publication.
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// BLAKE3 of the sidecar and body, hex encoded.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn exported_at(&self) -> DateTime<Utc> {
        self.exported_at
    }
}

/// Whoever takes finished bundles off our hands.
pub trait Collaborator {
    fn receive(&mut self, bundle: &ExportBundle) -> anyhow::Result<()>;
}

/// Drops bundles into a directory laid out like a content root.
pub struct DirectoryCollaborator {
    store: BundleStore,
}

impl DirectoryCollaborator {
    pub fn new(dest: &Path, files: &BundleConfig) -> Self {
        Self {
            store: BundleStore::open(dest, files),
        }
    }
}

impl Collaborator for DirectoryCollaborator {
    fn receive(&mut self, bundle: &ExportBundle) -> anyhow::Result<()> {
        log::info!(
            "Handing `{}` to {:?} ({}, exported {})",
            bundle.slug(),
            self.store.root(),
            bundle.digest(),
            bundle.exported_at().to_rfc3339()
        );

        self.store.write_bundle(
            bundle.slug(),
            bundle.body(),
            bundle.sidecar_yaml(),
            bundle.workflow(),
        )?;

        Ok(())
    }
}

pub struct Exporter {
    schema: Schema,
    linter: Linter,
    reject_lint_errors: bool,
}

impl Exporter {
    pub fn new(config: &Config) -> Self {
        Self {
            schema: Schema::new(&config.schema),
            linter: Linter::new(&config.lint),
            reject_lint_errors: config.export.reject_lint_errors,
        }
    }

    /// Builds the bundle for `article` without touching it. Fails if the
    /// article has moved on from `expected_revision`.
    pub fn prepare(
        &self,
        article: &Article,
        expected_revision: u64,
        now: DateTime<Utc>,
    ) -> Result<ExportBundle, ExportError> {
        if article.stage() != Stage::Approved {
            return Err(ExportError::NotReady {
                slug: article.slug().to_string(),
                stage: article.stage(),
            });
        }

        let mut metadata = article.metadata(&self.schema)?;

        if self.reject_lint_errors {
            let mut errors = article
                .lint(&self.linter)
                .filter(|violation| violation.severity == Severity::Error);

            if let Some(first) = errors.next() {
                return Err(ExportError::Lint {
                    slug: article.slug().to_string(),
                    count: 1 + errors.count(),
                    first,
                });
            }
        }

        let mut workflow = article.workflow().clone();
        workflow.advance(Stage::Published, expected_revision, now)?;
        metadata.status = Some(Stage::Published);

        ExportBundle::new(
            article.slug().to_owned(),
            metadata,
            article.body().to_owned(),
            workflow,
            now,
        )
    }

    /// Hands an approved article to `collaborator` and marks it published.
    /// If anything fails the article is left as it was.
    pub fn export(
        &self,
        article: &mut Article,
        expected_revision: u64,
        collaborator: &mut dyn Collaborator,
        now: DateTime<Utc>,
    ) -> Result<ExportBundle, ExportError> {
        let bundle = self.prepare(article, expected_revision, now)?;

        collaborator.receive(&bundle).map_err(ExportError::Handoff)?;

        *article.workflow_mut() = bundle.workflow().clone();
        log::info!("Published `{}`", article.slug());

        Ok(bundle)
    }

    /// Exports the bundle at `slug` straight from `store` and saves its
    /// journal. The article is read back from disk first, so a change saved
    /// by someone else since `expected_revision` stops the export before
    /// the collaborator sees anything.
    pub fn publish(
        &self,
        store: &BundleStore,
        slug: &RelativePath,
        expected_revision: u64,
        collaborator: &mut dyn Collaborator,
        now: DateTime<Utc>,
    ) -> Result<ExportBundle, ExportError> {
        let mut article = store.load(slug)?;
        let bundle = self.export(&mut article, expected_revision, collaborator, now)?;
        store.save_workflow(&article, expected_revision)?;

        Ok(bundle)
    }
}
