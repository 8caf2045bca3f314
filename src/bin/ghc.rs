#![deny(unused_must_use)]

#[macro_use]
extern crate tracing;
extern crate github_crawler as ghc;

use clap::Parser;

use ghc::policy::TraversalPolicy;
use ghc::store::{DocumentStore, MemoryStore, SnapshotStorage};
use ghc::urn::Urn;

mod crawl;
mod util;

#[derive(Debug, Parser)]
#[command(
    name = "GitHub Crawler",
    about = "Crawl the GitHub REST API into a content-addressed document snapshot."
)]
enum Cli {
    #[command(name = "crawl", about = "Crawl from a seed URL, draining discovered work.")]
    Crawl {
        #[arg(long = "type", help = "Entity type expected at the seed URL (e.g. 'org', 'repo').")]
        kind: String,
        #[arg(help = "The seed URL, GitHub API form.")]
        seed: String,
        #[arg(
            short = 's',
            long = "snapshot",
            help = "Snapshot to read/write: a file path or an s3://bucket/key URL."
        )]
        snapshot: Option<SnapshotStorage>,
        #[arg(long = "update", help = "Force-refresh everything reachable from the seed.")]
        update: bool,
        #[arg(
            short = 'm',
            long = "max-requests",
            default_value = "500",
            help = "Stop after handling this many requests."
        )]
        max_requests: usize,
    },

    #[command(name = "show", about = "Print one document from a snapshot by URN.")]
    Show {
        #[arg(short = 's', long = "snapshot", help = "Snapshot to read.")]
        snapshot: SnapshotStorage,
        #[arg(help = "The document URN.")]
        urn: String,
    },

    #[command(name = "list", about = "List the documents of a type in a snapshot.")]
    List {
        #[arg(short = 's', long = "snapshot", help = "Snapshot to read.")]
        snapshot: SnapshotStorage,
        #[arg(long = "type", help = "Entity type to list.")]
        kind: String,
    },

    #[command(name = "count", about = "Count the documents of a type in a snapshot.")]
    Count {
        #[arg(short = 's', long = "snapshot", help = "Snapshot to read.")]
        snapshot: SnapshotStorage,
        #[arg(long = "type", help = "Entity type to count.")]
        kind: String,
    },
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert()
}

fn main() {
    dotenv::dotenv().ok();
    util::run(|| match Cli::parse() {
        Cli::Crawl {
            kind,
            seed,
            snapshot,
            update,
            max_requests,
        } => {
            let policy = if update {
                TraversalPolicy::update()
            } else {
                TraversalPolicy::default_policy()
            };
            let crawler = crawl::Crawler::new()?;
            crawler.crawl(&kind, &seed, policy, snapshot.as_ref(), max_requests)
        }
        Cli::Show { snapshot, urn } => {
            let store = load(&snapshot)?;
            let urn = Urn::from(urn);
            match store
                .documents()?
                .into_iter()
                .find(|d| d.self_urn() == Some(&urn))
            {
                Some(document) => {
                    println!("{}", serde_json::to_string_pretty(&document)?);
                    Ok(())
                }
                None => anyhow::bail!("no document for {}", urn),
            }
        }
        Cli::List { snapshot, kind } => {
            let store = load(&snapshot)?;
            for summary in store.list(&kind)? {
                println!(
                    "{}\t{}\tv{}",
                    summary.urn,
                    summary.url,
                    summary.version.unwrap_or(0)
                );
            }
            Ok(())
        }
        Cli::Count { snapshot, kind } => {
            let store = load(&snapshot)?;
            println!("{}", store.count(&kind)?);
            Ok(())
        }
    });
}

fn load(snapshot: &SnapshotStorage) -> ghc::Result<MemoryStore> {
    let store = MemoryStore::new();
    match snapshot.read()? {
        Some(documents) => store.restore(documents)?,
        None => anyhow::bail!("no snapshot at {}", snapshot),
    }
    Ok(store)
}
