// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use relative_path::{RelativePath, RelativePathBuf};

use crate::{
    lint::{Linter, Violations},
    metadata::{Metadata, Sidecar},
    schema::{Schema, SchemaError},
    workflow::{Stage, Workflow},
};

/// One content bundle: body, sidecar and workflow journal.
///
/// Articles are never deleted. Retiring one goes through
/// [`Workflow::supersede`], which keeps the bundle and its history.
#[derive(Clone, Debug, PartialEq)]
pub struct Article {
    slug: RelativePathBuf,
    body: String,
    sidecar: Sidecar,
    workflow: Workflow,
}

impl Article {
    pub fn new(slug: RelativePathBuf, body: String, sidecar: Sidecar, workflow: Workflow) -> Self {
        Self {
            slug,
            body,
            sidecar,
            workflow,
        }
    }

    pub fn slug(&self) -> &RelativePath {
        &self.slug
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn sidecar(&self) -> &Sidecar {
        &self.sidecar
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn workflow_mut(&mut self) -> &mut Workflow {
        &mut self.workflow
    }

    pub fn stage(&self) -> Stage {
        self.workflow.stage()
    }

    pub fn metadata(&self, schema: &Schema) -> Result<Metadata, SchemaError> {
        schema.validate(&self.sidecar)
    }

    pub fn lint<'a>(&'a self, linter: &'a Linter) -> Violations<'a> {
        linter.lint(&self.body)
    }
}
