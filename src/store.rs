// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use relative_path::{Component, RelativePath, RelativePathBuf};
use thiserror::Error;

use crate::{
    article::Article,
    config::BundleConfig,
    metadata::{Sidecar, SidecarError},
    workflow::{Workflow, WorkflowError},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no bundle at `{0}`")]
    NotFound(String),
    #[error("`{0}` is not a bundle path")]
    BadSlug(String),
    #[error("bundle `{slug}` has no sidecar `{file}`")]
    MissingSidecar { slug: String, file: String },
    #[error("bundle `{slug}` has more than one sidecar: {}", .files.join(", "))]
    DuplicateSidecar { slug: String, files: Vec<String> },
    #[error("bundle `{slug}`: {source}")]
    Sidecar { slug: String, source: SidecarError },
    #[error("bundle `{slug}`: unreadable workflow journal: {source}")]
    Journal {
        slug: String,
        source: serde_yaml::Error,
    },
    #[error("bundle `{slug}`: {source}")]
    InvalidJournal { slug: String, source: WorkflowError },
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_owned(),
        source,
    }
}

fn writeable(path: &Path) -> std::io::Result<std::fs::File> {
    use std::fs::{create_dir_all, File};

    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    File::create(path)
}

/// Writes through a sibling temp file so readers never see half a file.
fn write_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let partial = path.with_extension("partial");

    writeable(&partial)
        .and_then(|mut file| file.write_all(contents))
        .map_err(io_error(&partial))?;
    std::fs::rename(&partial, path).map_err(io_error(path))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.'))
}

fn is_scratch(name: &str) -> bool {
    let is_backup = name.ends_with('~');
    let is_buffer = name.ends_with('#') && name.starts_with('#');

    is_backup || is_buffer
}

/// Bundles under one content root, one directory per article.
#[derive(Clone, Debug)]
pub struct BundleStore {
    root: PathBuf,
    files: BundleConfig,
}

impl BundleStore {
    pub fn open(root: impl AsRef<Path>, files: &BundleConfig) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            files: files.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks that `slug` names a directory below the root.
    pub fn slug(value: &str) -> Result<RelativePathBuf, StoreError> {
        let relative = RelativePath::new(value.trim_matches('/'));

        if relative
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(StoreError::BadSlug(value.to_owned()));
        }

        let normalized = relative.normalize();
        if normalized.as_str().is_empty() {
            return Err(StoreError::BadSlug(value.to_owned()));
        }

        Ok(normalized)
    }

    /// Every directory below the root holding a body file, sorted by path.
    pub fn discover(&self) -> Result<Vec<RelativePathBuf>, StoreError> {
        let mut slugs = vec![];

        let walker = walkdir::WalkDir::new(&self.root)
            .min_depth(0)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry?;

            if entry.depth() == 0 || !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if is_scratch(&name) {
                log::debug!("Skipping scratch directory {:?}", entry.path());
                continue;
            }

            if !entry.path().join(&self.files.body_file).is_file() {
                continue;
            }

            match entry.path().strip_prefix(&self.root) {
                Ok(relative) => match RelativePathBuf::from_path(relative) {
                    Ok(slug) => {
                        log::debug!("Found bundle `{}`", slug);
                        slugs.push(slug);
                    }
                    Err(err) => log::warn!("Skipping {:?}: {}", entry.path(), err),
                },
                Err(err) => log::warn!("Skipping {:?}: {}", entry.path(), err),
            }
        }

        Ok(slugs)
    }

    fn sidecar_candidates(&self) -> Vec<String> {
        let primary = self.files.sidecar_file.clone();
        let alternate = if let Some(stem) = primary.strip_suffix(".yaml") {
            Some(format!("{}.yml", stem))
        } else {
            primary.strip_suffix(".yml").map(|stem| format!("{}.yaml", stem))
        };

        std::iter::once(primary).chain(alternate).collect()
    }

    pub fn load(&self, slug: &RelativePath) -> Result<Article, StoreError> {
        let dir = slug.to_path(&self.root);
        let body_path = dir.join(&self.files.body_file);

        if !body_path.is_file() {
            return Err(StoreError::NotFound(slug.to_string()));
        }

        log::info!("Loading bundle `{}`", slug);

        let body = std::fs::read_to_string(&body_path).map_err(io_error(&body_path))?;

        let present: Vec<String> = self
            .sidecar_candidates()
            .into_iter()
            .filter(|name| dir.join(name).is_file())
            .collect();

        let sidecar_path = match present.as_slice() {
            [] => {
                return Err(StoreError::MissingSidecar {
                    slug: slug.to_string(),
                    file: self.files.sidecar_file.clone(),
                })
            }
            [only] => dir.join(only),
            _ => {
                return Err(StoreError::DuplicateSidecar {
                    slug: slug.to_string(),
                    files: present.clone(),
                })
            }
        };

        let contents = std::fs::read_to_string(&sidecar_path).map_err(io_error(&sidecar_path))?;
        let sidecar = Sidecar::parse(&contents).map_err(|source| StoreError::Sidecar {
            slug: slug.to_string(),
            source,
        })?;

        let workflow = self.read_journal(slug)?.unwrap_or_default();

        Ok(Article::new(slug.to_owned(), body, sidecar, workflow))
    }

    fn read_journal(&self, slug: &RelativePath) -> Result<Option<Workflow>, StoreError> {
        let path = slug.to_path(&self.root).join(&self.files.journal_file);

        if !path.is_file() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(io_error(&path))?;
        let workflow: Workflow =
            serde_yaml::from_str(&contents).map_err(|source| StoreError::Journal {
                slug: slug.to_string(),
                source,
            })?;

        workflow
            .verify()
            .map_err(|source| StoreError::InvalidJournal {
                slug: slug.to_string(),
                source,
            })?;

        Ok(Some(workflow))
    }

    /// Persists the article's journal, provided nobody else saved one since
    /// the caller loaded it at `expected_revision`.
    pub fn save_workflow(&self, article: &Article, expected_revision: u64) -> Result<(), StoreError> {
        let on_disk = self.read_journal(article.slug())?.unwrap_or_default();

        if on_disk.revision() != expected_revision {
            return Err(WorkflowError::StaleRevision {
                expected: expected_revision,
                actual: on_disk.revision(),
            }
            .into());
        }

        self.write_journal(article.slug(), article.workflow())
    }

    fn write_journal(&self, slug: &RelativePath, workflow: &Workflow) -> Result<(), StoreError> {
        let path = slug.to_path(&self.root).join(&self.files.journal_file);
        let yaml = serde_yaml::to_string(workflow).map_err(|source| StoreError::Journal {
            slug: slug.to_string(),
            source,
        })?;

        log::info!("Writing journal of `{}` at revision {}", slug, workflow.revision());
        write_file(&path, yaml.as_bytes())
    }

    /// Writes a complete bundle, replacing whatever was there.
    pub fn write_bundle(
        &self,
        slug: &RelativePath,
        body: &str,
        sidecar_yaml: &str,
        workflow: &Workflow,
    ) -> Result<(), StoreError> {
        let dir = slug.to_path(&self.root);

        write_file(&dir.join(&self.files.body_file), body.as_bytes())?;
        write_file(&dir.join(&self.files.sidecar_file), sidecar_yaml.as_bytes())?;
        self.write_journal(slug, workflow)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use chrono::Utc;
    use relative_path::RelativePath;

    use super::{BundleStore, StoreError};
    use crate::{
        config::BundleConfig,
        workflow::{Stage, WorkflowError},
    };

    fn bundle(root: &std::path::Path, slug: &str, sidecars: &[&str]) {
        let dir = root.join(slug);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("article.md"), "# Hello\n").unwrap();
        for sidecar in sidecars {
            fs::write(dir.join(sidecar), "title: Hello\n").unwrap();
        }
    }

    #[test]
    fn discovers_nested_bundles() {
        let root = tempfile::tempdir().unwrap();
        bundle(root.path(), "ruby/bundler", &["meta.yaml"]);
        bundle(root.path(), "gcp-functions", &["meta.yaml"]);
        bundle(root.path(), ".drafts/secret", &["meta.yaml"]);
        fs::create_dir_all(root.path().join("assets")).unwrap();

        let store = BundleStore::open(root.path(), &BundleConfig::default());
        let slugs: Vec<String> = store
            .discover()
            .unwrap()
            .iter()
            .map(|slug| slug.to_string())
            .collect();

        assert_eq!(slugs, vec!["gcp-functions", "ruby/bundler"]);
    }

    #[test]
    fn exactly_one_sidecar() {
        let root = tempfile::tempdir().unwrap();
        bundle(root.path(), "none", &[]);
        bundle(root.path(), "both", &["meta.yaml", "meta.yml"]);
        bundle(root.path(), "alternate", &["meta.yml"]);

        let store = BundleStore::open(root.path(), &BundleConfig::default());

        assert!(matches!(
            store.load(RelativePath::new("none")),
            Err(StoreError::MissingSidecar { .. })
        ));
        assert!(matches!(
            store.load(RelativePath::new("both")),
            Err(StoreError::DuplicateSidecar { .. })
        ));
        assert!(store.load(RelativePath::new("alternate")).is_ok());
        assert!(matches!(
            store.load(RelativePath::new("missing")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn fresh_bundle_is_proposed() {
        let root = tempfile::tempdir().unwrap();
        bundle(root.path(), "post", &["meta.yaml"]);

        let store = BundleStore::open(root.path(), &BundleConfig::default());
        let article = store.load(RelativePath::new("post")).unwrap();

        assert_eq!(article.stage(), Stage::Proposed);
        assert_eq!(article.body(), "# Hello\n");
    }

    #[test]
    fn concurrent_reviewers() {
        let root = tempfile::tempdir().unwrap();
        bundle(root.path(), "post", &["meta.yaml"]);
        let store = BundleStore::open(root.path(), &BundleConfig::default());

        let mut first = store.load(RelativePath::new("post")).unwrap();
        let mut second = store.load(RelativePath::new("post")).unwrap();

        first.workflow_mut().advance(Stage::Drafting, 0, Utc::now()).unwrap();
        store.save_workflow(&first, 0).unwrap();

        second.workflow_mut().advance(Stage::Drafting, 0, Utc::now()).unwrap();
        assert!(matches!(
            store.save_workflow(&second, 0),
            Err(StoreError::Workflow(WorkflowError::StaleRevision {
                expected: 0,
                actual: 1
            }))
        ));

        let reloaded = store.load(RelativePath::new("post")).unwrap();
        assert_eq!(reloaded.stage(), Stage::Drafting);
        assert_eq!(reloaded.workflow().revision(), 1);
    }

    #[test]
    fn journal_must_match_its_history() {
        let root = tempfile::tempdir().unwrap();
        bundle(root.path(), "post", &["meta.yaml"]);
        fs::write(
            root.path().join("post/workflow.yaml"),
            "stage: approved\nrevision: 0\nhistory: []\n",
        )
        .unwrap();

        let store = BundleStore::open(root.path(), &BundleConfig::default());

        assert!(matches!(
            store.load(RelativePath::new("post")),
            Err(StoreError::InvalidJournal {
                source: WorkflowError::Inconsistent(_),
                ..
            })
        ));
    }

    #[test]
    fn slugs_stay_inside_root() {
        assert_eq!(BundleStore::slug("/ruby/bundler/").unwrap().as_str(), "ruby/bundler");
        assert!(BundleStore::slug("../etc").is_err());
        assert!(BundleStore::slug("/").is_err());
    }
}
