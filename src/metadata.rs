// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_yaml::Value;
use thiserror::Error;

use crate::workflow::Stage;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("sidecar is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("sidecar must be a mapping of field names to values")]
    NotAMapping,
    #[error("sidecar key {0:?} is not a string")]
    NonStringKey(Value),
}

/// The raw key/value record stored next to an article body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sidecar(BTreeMap<String, Value>);

impl Sidecar {
    pub fn parse(contents: &str) -> Result<Self, SidecarError> {
        let mapping = match serde_yaml::from_str::<Value>(contents)? {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => return Err(SidecarError::NotAMapping),
        };

        mapping
            .into_iter()
            .map(|(key, value)| match key {
                Value::String(key) => Ok((key, value)),
                other => Err(SidecarError::NonStringKey(other)),
            })
            .collect()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Sidecar {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A sidecar that passed schema validation.
///
/// Field order here is the order fields are written back out, followed by any
/// keys the schema does not know about in sorted order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata {
    pub title: String,
    pub path: String,
    pub author: String,
    pub tags: Vec<String>,
    pub publish_date: NaiveDate,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Stage>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Title used for search engines and feeds.
    pub fn display_title(&self) -> &str {
        self.seo_title.as_deref().unwrap_or(&self.title)
    }
}

#[cfg(test)]
mod test {
    use super::{Sidecar, SidecarError};
    use serde_yaml::Value;

    #[test]
    fn parse_mapping() {
        let sidecar = Sidecar::parse("title: Pinning gems\ntags: [ruby, bundler]\n").unwrap();

        assert_eq!(sidecar.len(), 2);
        assert_eq!(sidecar.get("title"), Some(&Value::from("Pinning gems")));
    }

    #[test]
    fn empty_file_is_empty_record() {
        assert!(Sidecar::parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_mapping() {
        assert!(matches!(
            Sidecar::parse("- just\n- a list\n"),
            Err(SidecarError::NotAMapping)
        ));
        assert!(matches!(
            Sidecar::parse("1: one\n"),
            Err(SidecarError::NonStringKey(_))
        ));
    }
}
