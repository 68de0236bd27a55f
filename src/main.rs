// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use copydesk::{
    check::{check, Report},
    config::Config,
    export::{DirectoryCollaborator, Exporter},
    feed,
    lint::{Linter, Severity},
    schema::Schema,
    store::BundleStore,
    workflow::{Clock, Stage, SystemClock},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = ".", help = "The content root.")]
    root: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and lint one bundle, or every bundle under the root.
    Check { slug: Option<String> },
    /// Lint a bundle's body.
    Lint {
        slug: String,
        #[arg(long, help = "Only allow H1 and H2 headings.")]
        strict: bool,
    },
    /// Show a bundle's stage, revision and history.
    Status { slug: String },
    /// Move a bundle to the next stage.
    Advance {
        slug: String,
        stage: Stage,
        #[arg(long, help = "The revision shown by `status`.")]
        revision: u64,
    },
    /// Send a bundle under review back to drafting.
    RequestChanges {
        slug: String,
        #[arg(long)]
        revision: u64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Retire a bundle in favour of another one.
    Supersede {
        slug: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        revision: u64,
    },
    /// Export an approved bundle and mark it published.
    Export {
        slug: String,
        #[arg(short, long, help = "The destination directory.")]
        dest: String,
        #[arg(long, help = "The revision shown by `status`.")]
        revision: u64,
    },
    /// Write an RSS feed of the published bundles in an export directory.
    Feed {
        dir: String,
        #[arg(short, long, help = "Write here instead of stdout.")]
        output: Option<String>,
    },
}

fn print_report(report: &Report) {
    println!("{} ({})", report.slug, report.stage);

    for problem in &report.schema {
        println!("  meta: {}", problem);
    }
    if let Some(status) = report.stale_status {
        println!("  meta: status says {} but the journal says {}", status, report.stage);
    }
    for violation in &report.violations {
        println!("  {}", violation);
    }
}

/// Returns whether the command found nothing blocking.
fn run(args: Args) -> anyhow::Result<bool> {
    let root = Path::new(&args.root);
    let config = Config::load(root).context("reading configuration")?;
    let store = BundleStore::open(root, &config.bundle);
    let schema = Schema::new(&config.schema);
    let clock = SystemClock;

    match args.command {
        Command::Check { slug } => {
            let linter = Linter::new(&config.lint);
            let slugs = match slug {
                Some(slug) => vec![BundleStore::slug(&slug)?],
                None => store.discover()?,
            };

            log::info!("Checking {} bundle(s)", slugs.len());

            let mut clean = true;
            for slug in slugs {
                let report = check(&store, &schema, &linter, &slug)?;
                if !report.is_clean() {
                    print_report(&report);
                }
                clean &= !report.has_errors();
            }

            Ok(clean)
        }
        Command::Lint { slug, strict } => {
            let mut lint_config = config.lint.clone();
            lint_config.strict |= strict;
            let linter = Linter::new(&lint_config);
            log::debug!("Rules: {}", linter.rule_ids().join(", "));

            let article = store.load(&BundleStore::slug(&slug)?)?;
            let mut clean = true;
            for violation in article.lint(&linter) {
                clean &= violation.severity != Severity::Error;
                println!("{}", violation);
            }

            Ok(clean)
        }
        Command::Status { slug } => {
            let article = store.load(&BundleStore::slug(&slug)?)?;
            let workflow = article.workflow();

            println!("{}: {} (revision {})", article.slug(), workflow.stage(), workflow.revision());
            if let Some(superseded) = workflow.superseded() {
                println!("  superseded by {} at {}", superseded.by, superseded.at.to_rfc3339());
            }
            for transition in workflow.history() {
                print!("  {} {} -> {}", transition.at.to_rfc3339(), transition.from, transition.to);
                match &transition.note {
                    Some(note) => println!(" ({})", note),
                    None => println!(),
                }
            }

            Ok(true)
        }
        Command::Advance {
            slug,
            stage,
            revision,
        } => {
            let mut article = store.load(&BundleStore::slug(&slug)?)?;
            article
                .workflow_mut()
                .advance(stage, revision, clock.now())
                .with_context(|| format!("advancing `{}`", slug))?;
            store.save_workflow(&article, revision)?;

            log::info!("`{}` is now {}", slug, article.stage());
            Ok(true)
        }
        Command::RequestChanges {
            slug,
            revision,
            note,
        } => {
            let mut article = store.load(&BundleStore::slug(&slug)?)?;
            article
                .workflow_mut()
                .request_changes(revision, clock.now(), note)
                .with_context(|| format!("requesting changes on `{}`", slug))?;
            store.save_workflow(&article, revision)?;

            log::info!("`{}` is back in drafting", slug);
            Ok(true)
        }
        Command::Supersede { slug, by, revision } => {
            let replacement = BundleStore::slug(&by)?;
            store
                .load(&replacement)
                .with_context(|| format!("`{}` must exist to supersede `{}`", by, slug))?;

            let mut article = store.load(&BundleStore::slug(&slug)?)?;
            article
                .workflow_mut()
                .supersede(replacement.as_str(), revision, clock.now())?;
            store.save_workflow(&article, revision)?;

            log::info!("`{}` superseded by `{}`", slug, replacement);
            Ok(true)
        }
        Command::Export {
            slug,
            dest,
            revision,
        } => {
            let mut collaborator = DirectoryCollaborator::new(Path::new(&dest), &config.bundle);
            let bundle = Exporter::new(&config)
                .publish(
                    &store,
                    &BundleStore::slug(&slug)?,
                    revision,
                    &mut collaborator,
                    clock.now(),
                )
                .with_context(|| format!("exporting `{}`", slug))?;

            println!(
                "{} {} {}",
                bundle.slug(),
                bundle.digest(),
                bundle.exported_at().to_rfc3339()
            );
            Ok(true)
        }
        Command::Feed { dir, output } => {
            let feed_config = config
                .feed
                .as_ref()
                .context("no `feed` section in copydesk.yaml")?;

            let exported = BundleStore::open(&dir, &config.bundle);
            let entries = feed::collect(&exported, &schema)?;
            let channel = feed::build_channel(feed_config, &entries);

            log::info!("Feed has {} item(s)", entries.len());

            match output {
                Some(output) => {
                    let file = std::fs::File::create(&output)
                        .with_context(|| format!("creating {}", output))?;
                    feed::write(&channel, file)?;
                }
                None => {
                    feed::write(&channel, std::io::stdout().lock())?;
                    println!();
                }
            }

            Ok(true)
        }
    }
}

fn main() {
    // Initialize Logging.
    let log_environ = env_logger::Env::new()
        .filter("COPYDESK_LOG")
        .write_style("COPYDESK_LOG_STYLE");
    let mut log_builder = env_logger::Builder::new();

    log_builder.filter_level(log::LevelFilter::Info);
    log_builder.parse_env(log_environ);
    log_builder.init();

    // Parse Arguments.
    let args = Args::parse();

    log::debug!("Content root is `{}`", args.root);

    match run(args) {
        Ok(true) => log::info!("Done."),
        Ok(false) => std::process::exit(1),
        Err(err) => {
            log::error!("{:#}", err);
            std::process::exit(2);
        }
    }
}
