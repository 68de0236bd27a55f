// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::fs;

use chrono::{TimeZone, Utc};
use copydesk::{
    config::Config,
    export::{DirectoryCollaborator, ExportError, Exporter},
    feed,
    schema::Schema,
    store::BundleStore,
    workflow::Stage,
};
use relative_path::RelativePath;

const BODY: &str = r#"# Autoloading with Zeitwerk

Zeitwerk maps constant names to file paths.

## Setup

- Add the gem
- Call `loader.setup`

![Directory layout of an autoloaded app](layout.png)
"#;

const SIDECAR: &str = r#"title: Autoloading with Zeitwerk
path: /blog/zeitwerk
author: jdoe
tags: ruby, zeitwerk
publish_date: 2024-08-20
description: How Zeitwerk turns file names into constants.
seo_title: "Zeitwerk: autoloading explained"
series: ruby-internals
reviewers: [kim, lee]
"#;

fn seed(root: &std::path::Path) {
    let dir = root.join("ruby/zeitwerk");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("article.md"), BODY).unwrap();
    fs::write(dir.join("meta.yaml"), SIDECAR).unwrap();
}

#[test]
fn draft_to_published_and_back_in() {
    let content = tempfile::tempdir().unwrap();
    let published = tempfile::tempdir().unwrap();
    seed(content.path());

    let config = Config::default();
    let store = BundleStore::open(content.path(), &config.bundle);
    let slug = RelativePath::new("ruby/zeitwerk");
    let exporter = Exporter::new(&config);
    let mut collaborator = DirectoryCollaborator::new(published.path(), &config.bundle);

    let mut step = 0;
    let mut at = || {
        step += 1;
        Utc.with_ymd_and_hms(2024, 8, step, 10, 0, 0).unwrap()
    };

    // Walk the article through review, with one round of changes requested.
    for stage in [Stage::Drafting, Stage::InReview] {
        let mut article = store.load(slug).unwrap();
        let revision = article.workflow().revision();
        article.workflow_mut().advance(stage, revision, at()).unwrap();
        store.save_workflow(&article, revision).unwrap();
    }

    let mut article = store.load(slug).unwrap();
    assert!(matches!(
        exporter.publish(&store, slug, 2, &mut collaborator, at()),
        Err(ExportError::NotReady {
            stage: Stage::InReview,
            ..
        })
    ));

    article
        .workflow_mut()
        .request_changes(2, at(), Some("explain eager loading".into()))
        .unwrap();
    store.save_workflow(&article, 2).unwrap();

    for stage in [Stage::InReview, Stage::Editing, Stage::Approved] {
        let mut article = store.load(slug).unwrap();
        let revision = article.workflow().revision();
        article.workflow_mut().advance(stage, revision, at()).unwrap();
        store.save_workflow(&article, revision).unwrap();
    }

    let bundle = exporter
        .publish(&store, slug, 6, &mut collaborator, at())
        .unwrap();

    let article = store.load(slug).unwrap();
    assert_eq!(article.stage(), Stage::Published);
    assert_eq!(article.workflow().history().len(), 7);
    assert_eq!(bundle.workflow(), article.workflow());

    // Exporting again from the now published source is refused.
    assert!(exporter
        .publish(&store, slug, 7, &mut collaborator, at())
        .is_err());

    // Re-import the exported bundle: same metadata, same bytes.
    let exported = BundleStore::open(published.path(), &config.bundle);
    let reimported = exported.load(slug).unwrap();
    let schema = Schema::new(&config.schema);
    let metadata = reimported.metadata(&schema).unwrap();

    assert_eq!(reimported.stage(), Stage::Published);
    assert_eq!(reimported.body(), BODY);
    assert_eq!(&metadata, bundle.metadata());
    assert_eq!(metadata.to_yaml().unwrap(), bundle.sidecar_yaml());
    assert_eq!(
        fs::read(published.path().join("ruby/zeitwerk/meta.yaml")).unwrap(),
        bundle.sidecar_yaml().as_bytes()
    );
    assert_eq!(metadata.path, "blog/zeitwerk");
    assert_eq!(metadata.tags, vec!["ruby".to_owned(), "zeitwerk".to_owned()]);
    assert_eq!(metadata.extra.len(), 2);

    let entries = feed::collect(&exported, &schema).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].display_title(), "Zeitwerk: autoloading explained");
}

#[test]
fn skipping_a_stage_leaves_the_journal_alone() {
    let content = tempfile::tempdir().unwrap();
    seed(content.path());

    let config = Config::default();
    let store = BundleStore::open(content.path(), &config.bundle);
    let slug = RelativePath::new("ruby/zeitwerk");

    let mut article = store.load(slug).unwrap();
    assert!(article
        .workflow_mut()
        .advance(Stage::Approved, 0, Utc::now())
        .is_err());
    assert_eq!(article.stage(), Stage::Proposed);
    assert_eq!(article.workflow().revision(), 0);

    assert!(!content.path().join("ruby/zeitwerk/workflow.yaml").exists());
    assert_eq!(store.load(slug).unwrap().stage(), Stage::Proposed);
}
