// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::path::Path;

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "copydesk.yaml";

/// Settings read from `copydesk.yaml` at the content root. Every section is optional.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub bundle: BundleConfig,
    pub schema: SchemaConfig,
    pub lint: LintConfig,
    pub export: ExportConfig,
    pub feed: Option<FeedConfig>,
}

impl Config {
    /// Reads `copydesk.yaml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = root.join(CONFIG_FILE);

        if !path.exists() {
            log::debug!("No {} in {:?}, using defaults", CONFIG_FILE, root);
            return Ok(Self::default());
        }

        log::info!("Reading configuration from {:?}", path);

        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct BundleConfig {
    pub body_file: String,
    pub sidecar_file: String,
    pub journal_file: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            body_file: "article.md".into(),
            sidecar_file: "meta.yaml".into(),
            journal_file: "workflow.yaml".into(),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct SchemaConfig {
    /// Optional fields promoted to required, e.g. `seo_title`.
    pub require: Vec<String>,
    pub title_max: Option<usize>,
    pub seo_title_max: usize,
    pub description_max: usize,
    /// When set, tags outside this list are rejected.
    pub allowed_tags: Option<Vec<String>>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            require: vec![],
            title_max: None,
            seo_title_max: 60,
            description_max: 160,
            allowed_tags: None,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TablePolicy {
    Allow,
    Warn,
    Deny,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct LintConfig {
    /// Limits headings to H2.
    pub strict: bool,
    /// Deepest heading allowed; never above H3.
    pub max_heading: u8,
    pub tables: TablePolicy,
    pub require_fence_language: bool,
    /// Fence languages accepted on top of the built-in syntax set.
    pub extra_languages: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_heading: 3,
            tables: TablePolicy::Warn,
            require_fence_language: true,
            extra_languages: vec![],
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct ExportConfig {
    /// Refuse to export bodies with error-level style violations.
    pub reject_lint_errors: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            reject_lint_errors: false,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct FeedConfig {
    pub title: String,
    pub site_url: String,
    pub description: String,
    pub language: Option<String>,
    pub copyright: Option<String>,
    pub managing_editor: Option<String>,
    pub ttl: Option<u32>,
}

#[cfg(test)]
mod test {
    use super::{Config, TablePolicy};

    #[test]
    fn partial_config() {
        let config: Config = serde_yaml::from_str(
            r#"
lint:
  strict: true
  tables: deny
schema:
  require: [seo_title]
feed:
  title: Field Notes
  site_url: https://blog.example.com
  description: Notes from the field
"#,
        )
        .unwrap();

        assert!(config.lint.strict);
        assert_eq!(config.lint.tables, TablePolicy::Deny);
        assert_eq!(config.lint.max_heading, 3);
        assert_eq!(config.schema.require, vec!["seo_title".to_owned()]);
        assert_eq!(config.schema.description_max, 160);
        assert_eq!(config.bundle.body_file, "article.md");
        assert_eq!(config.feed.unwrap().title, "Field Notes");
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }
}
