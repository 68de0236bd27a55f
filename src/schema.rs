// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use chrono::NaiveDate;
use relative_path::{Component, RelativePath};
use serde_yaml::Value;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    config::SchemaConfig,
    metadata::{Metadata, Sidecar},
    workflow::Stage,
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SchemaError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },
    #[error("field `{field}` has value `{value}`, expected one of: {}", .allowed.join(", "))]
    InvalidEnum {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("field `{field}` is invalid: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Fields with a dedicated slot in [`Metadata`]. Anything else lands in `extra`.
pub const KNOWN_FIELDS: [&str; 10] = [
    "title",
    "path",
    "author",
    "tags",
    "publish_date",
    "description",
    "seo_title",
    "social_image",
    "canonical_url",
    "status",
];

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Text { max_graphemes: Option<usize> },
    Tags { allowed: Option<Vec<String>> },
    /// `YYYY-MM-DD`
    Date,
    /// Site-relative path; may not climb out of the root.
    Path,
    Url,
    Enum { allowed: Vec<String> },
    /// Presence check only; the value is kept as written.
    Any,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldRule {
    pub name: String,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldRule {
    fn new(name: &str, required: bool, kind: FieldKind) -> Self {
        Self {
            name: name.to_owned(),
            required,
            kind,
        }
    }

    fn check(&self, value: Option<&Value>) -> Result<Option<Field>, SchemaError> {
        let value = match value {
            Some(value) if !is_blank(value) => value,
            _ if self.required => {
                return Err(SchemaError::MissingField {
                    field: self.name.clone(),
                })
            }
            _ => return Ok(None),
        };

        let field = match &self.kind {
            FieldKind::Any => Field::Raw(value.clone()),
            FieldKind::Text { max_graphemes } => {
                let text = self.text(value)?;
                if let Some(max) = max_graphemes {
                    let length = text.graphemes(true).count();
                    if length > *max {
                        return Err(self.invalid(format!(
                            "{} characters, at most {} allowed",
                            length, max
                        )));
                    }
                }
                Field::Text(text)
            }
            FieldKind::Tags { allowed } => {
                let tags = self.tags(value)?;
                if tags.is_empty() {
                    return if self.required {
                        Err(SchemaError::MissingField {
                            field: self.name.clone(),
                        })
                    } else {
                        Ok(None)
                    };
                }
                if let Some(allowed) = allowed {
                    if let Some(tag) = tags.iter().find(|tag| !allowed.contains(*tag)) {
                        return Err(SchemaError::InvalidEnum {
                            field: self.name.clone(),
                            value: tag.clone(),
                            allowed: allowed.clone(),
                        });
                    }
                }
                Field::Tags(tags)
            }
            FieldKind::Date => {
                let text = self.text(value)?;
                Field::Date(
                    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                        .map_err(|_| self.invalid(format!("`{}` is not a YYYY-MM-DD date", text)))?,
                )
            }
            FieldKind::Path => Field::Text(self.path(value)?),
            FieldKind::Url => {
                let text = self.text(value)?;
                let has_scheme = text.starts_with("https://") || text.starts_with("http://");
                if !has_scheme || text.contains(char::is_whitespace) {
                    return Err(self.invalid(format!("`{}` is not an http(s) URL", text)));
                }
                Field::Text(text)
            }
            FieldKind::Enum { allowed } => {
                let text = self.text(value)?;
                let wanted = text.to_ascii_lowercase().replace('_', "-");
                match allowed.iter().find(|candidate| **candidate == wanted) {
                    Some(found) => Field::Text(found.clone()),
                    None => {
                        return Err(SchemaError::InvalidEnum {
                            field: self.name.clone(),
                            value: text,
                            allowed: allowed.clone(),
                        })
                    }
                }
            }
        };

        Ok(Some(field))
    }

    fn invalid(&self, reason: String) -> SchemaError {
        SchemaError::InvalidValue {
            field: self.name.clone(),
            reason,
        }
    }

    fn text(&self, value: &Value) -> Result<String, SchemaError> {
        scalar(value)
            .map(|text| text.trim().to_owned())
            .ok_or_else(|| self.invalid("expected a single value".into()))
    }

    /// Accepts a YAML list or a comma separated string. Order is kept, duplicates dropped.
    fn tags(&self, value: &Value) -> Result<Vec<String>, SchemaError> {
        let raw: Vec<String> = match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| {
                    scalar(item).ok_or_else(|| self.invalid("tags must be plain values".into()))
                })
                .collect::<Result<_, _>>()?,
            other => self
                .text(other)?
                .split(',')
                .map(|tag| tag.to_owned())
                .collect(),
        };

        let mut tags: Vec<String> = vec![];
        for tag in raw.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty()) {
            if !tags.iter().any(|seen| seen == tag) {
                tags.push(tag.to_owned());
            }
        }

        Ok(tags)
    }

    fn path(&self, value: &Value) -> Result<String, SchemaError> {
        let text = self.text(value)?;
        let relative = RelativePath::new(text.trim_start_matches('/'));

        if relative
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(self.invalid(format!("`{}` leaves the site root", text)));
        }

        let normalized = relative.normalize();
        if normalized.as_str().is_empty() {
            return Err(self.invalid("path is empty".into()));
        }

        Ok(normalized.as_str().to_owned())
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Sequence(items) => items.is_empty(),
        _ => false,
    }
}

enum Field {
    Text(String),
    Tags(Vec<String>),
    Date(NaiveDate),
    Raw(Value),
}

/// The field rules every sidecar is checked against, in check order.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    rules: Vec<FieldRule>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(&SchemaConfig::default())
    }
}

impl Schema {
    pub fn new(config: &SchemaConfig) -> Self {
        let required = |name: &str| config.require.iter().any(|field| field == name);

        let mut rules = vec![
            FieldRule::new(
                "title",
                true,
                FieldKind::Text {
                    max_graphemes: config.title_max,
                },
            ),
            FieldRule::new("path", true, FieldKind::Path),
            FieldRule::new("author", true, FieldKind::Text { max_graphemes: None }),
            FieldRule::new(
                "tags",
                true,
                FieldKind::Tags {
                    allowed: config.allowed_tags.clone(),
                },
            ),
            FieldRule::new("publish_date", true, FieldKind::Date),
            FieldRule::new(
                "description",
                true,
                FieldKind::Text {
                    max_graphemes: Some(config.description_max),
                },
            ),
            FieldRule::new(
                "seo_title",
                required("seo_title"),
                FieldKind::Text {
                    max_graphemes: Some(config.seo_title_max),
                },
            ),
            FieldRule::new("social_image", required("social_image"), FieldKind::Path),
            FieldRule::new("canonical_url", required("canonical_url"), FieldKind::Url),
            FieldRule::new(
                "status",
                required("status"),
                FieldKind::Enum {
                    allowed: Stage::names().into_iter().map(String::from).collect(),
                },
            ),
        ];

        for name in config
            .require
            .iter()
            .filter(|name| !KNOWN_FIELDS.contains(&name.as_str()))
        {
            rules.push(FieldRule::new(name, true, FieldKind::Any));
        }

        Self { rules }
    }

    /// Checks `record` and returns its normalized form, or the first problem in rule order.
    pub fn validate(&self, record: &Sidecar) -> Result<Metadata, SchemaError> {
        let mut fields: BTreeMap<&str, Field> = BTreeMap::new();

        for rule in &self.rules {
            if let Some(field) = rule.check(record.get(&rule.name))? {
                fields.insert(rule.name.as_str(), field);
            }
        }

        let status = match take_text(&mut fields, "status") {
            Some(status) => Some(status.parse::<Stage>().map_err(|_| SchemaError::InvalidEnum {
                field: "status".into(),
                value: status,
                allowed: Stage::names().into_iter().map(String::from).collect(),
            })?),
            None => None,
        };

        Ok(Metadata {
            title: require_text(&mut fields, "title")?,
            path: require_text(&mut fields, "path")?,
            author: require_text(&mut fields, "author")?,
            tags: match fields.remove("tags") {
                Some(Field::Tags(tags)) => tags,
                _ => return Err(missing("tags")),
            },
            publish_date: match fields.remove("publish_date") {
                Some(Field::Date(date)) => date,
                _ => return Err(missing("publish_date")),
            },
            description: require_text(&mut fields, "description")?,
            seo_title: take_text(&mut fields, "seo_title"),
            social_image: take_text(&mut fields, "social_image"),
            canonical_url: take_text(&mut fields, "canonical_url"),
            status,
            extra: record
                .fields()
                .filter(|(key, _)| !KNOWN_FIELDS.contains(key))
                .map(|(key, value)| (key.to_owned(), value.clone()))
                .collect(),
        })
    }

    /// Every problem with `record`, in rule order.
    pub fn problems(&self, record: &Sidecar) -> Vec<SchemaError> {
        self.rules
            .iter()
            .filter_map(|rule| rule.check(record.get(&rule.name)).err())
            .collect()
    }
}

fn missing(field: &str) -> SchemaError {
    SchemaError::MissingField {
        field: field.to_owned(),
    }
}

fn take_text(fields: &mut BTreeMap<&str, Field>, name: &str) -> Option<String> {
    match fields.remove(name) {
        Some(Field::Text(text)) => Some(text),
        _ => None,
    }
}

fn require_text(fields: &mut BTreeMap<&str, Field>, name: &str) -> Result<String, SchemaError> {
    take_text(fields, name).ok_or_else(|| missing(name))
}
