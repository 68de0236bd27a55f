// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::{export::ExportError, feed::FeedError, schema::SchemaError, store::StoreError, workflow::WorkflowError};

pub type Result<T> = std::result::Result<T, Error>;

/// Any failure a pipeline operation can report.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}
