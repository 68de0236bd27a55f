// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use chrono::{TimeZone, Utc};
use rss::{CategoryBuilder, Channel, ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use thiserror::Error;

use crate::{
    config::FeedConfig,
    metadata::Metadata,
    schema::{Schema, SchemaError},
    store::{BundleStore, StoreError},
    workflow::Stage,
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bundle `{slug}`: {source}")]
    Schema { slug: String, source: SchemaError },
    #[error("could not write feed: {0}")]
    Rss(#[from] rss::Error),
}

/// Metadata of every published bundle under `store`, newest first.
pub fn collect(store: &BundleStore, schema: &Schema) -> Result<Vec<Metadata>, FeedError> {
    let mut entries = vec![];

    for slug in store.discover()? {
        let article = store.load(&slug)?;

        if article.stage() != Stage::Published {
            log::debug!("Leaving `{}` out of the feed, it is {}", slug, article.stage());
            continue;
        }

        entries.push(article.metadata(schema).map_err(|source| FeedError::Schema {
            slug: slug.to_string(),
            source,
        })?);
    }

    entries.sort_by(|a, b| {
        b.publish_date
            .cmp(&a.publish_date)
            .then_with(|| a.title.cmp(&b.title))
    });

    Ok(entries)
}

fn item(config: &FeedConfig, entry: &Metadata) -> Item {
    let link = format!("{}/{}", config.site_url.trim_end_matches('/'), entry.path);
    let published = entry
        .publish_date
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight).to_rfc2822());

    ItemBuilder::default()
        .title(Some(entry.display_title().to_owned()))
        .link(Some(link.clone()))
        .description(Some(entry.description.clone()))
        .author(Some(entry.author.clone()))
        .categories(
            entry
                .tags
                .iter()
                .map(|tag| CategoryBuilder::default().name(tag.clone()).build())
                .collect::<Vec<_>>(),
        )
        .guid(Some(GuidBuilder::default().value(link).permalink(true).build()))
        .pub_date(published)
        .build()
}

pub fn build_channel(config: &FeedConfig, entries: &[Metadata]) -> Channel {
    ChannelBuilder::default()
        .title(config.title.clone())
        .link(config.site_url.clone())
        .description(config.description.clone())
        .language(config.language.clone())
        .copyright(config.copyright.clone())
        .managing_editor(config.managing_editor.clone())
        .ttl(config.ttl.map(|ttl| ttl.to_string()))
        .items(entries.iter().map(|entry| item(config, entry)).collect::<Vec<_>>())
        .build()
}

pub fn write<W: std::io::Write>(channel: &Channel, writer: W) -> Result<W, FeedError> {
    Ok(channel.write_to(writer)?)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::{build_channel, write};
    use crate::{config::FeedConfig, metadata::Metadata, workflow::Stage};

    fn entry(title: &str, path: &str, day: u32) -> Metadata {
        Metadata {
            title: title.into(),
            path: path.into(),
            author: "jdoe".into(),
            tags: vec!["ruby".into()],
            publish_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            description: format!("About {}", title),
            seo_title: None,
            social_image: None,
            canonical_url: None,
            status: Some(Stage::Published),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn channel_items() {
        let config = FeedConfig {
            title: "Field Notes".into(),
            site_url: "https://blog.example.com/".into(),
            description: "Notes".into(),
            language: Some("en".into()),
            copyright: None,
            managing_editor: None,
            ttl: Some(60),
        };

        let channel = build_channel(&config, &[entry("Zeitwerk", "blog/zeitwerk", 13)]);
        let item = &channel.items()[0];

        assert_eq!(item.link(), Some("https://blog.example.com/blog/zeitwerk"));
        assert_eq!(item.categories()[0].name(), "ruby");
        assert_eq!(item.pub_date(), Some("Thu, 13 Jun 2024 00:00:00 +0000"));
        assert_eq!(channel.ttl(), Some("60"));

        let xml = String::from_utf8(write(&channel, Vec::new()).unwrap()).unwrap();
        assert!(xml.contains("<title>Zeitwerk</title>"));
    }
}
