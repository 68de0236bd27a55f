// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

pub mod article;
pub mod check;
pub mod config;
pub mod error;
pub mod export;
pub mod feed;
pub mod lint;
pub mod metadata;
pub mod schema;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
