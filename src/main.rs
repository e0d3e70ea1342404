mod auth;
mod block;
mod config;
mod error;
mod feed;
mod fetcher;
mod github;
mod navigate;
mod render;
mod repo_id;
mod types;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::block::NavTarget;
use crate::config::Config;
use crate::error::FeedError;
use crate::feed::{EventFeed, FeedEntry, LoadOutcome};
use crate::fetcher::FeedSource;
use crate::github::GitHub;
use crate::navigate::{Navigator, WebNavigator};
use crate::render::RenderContext;
use crate::repo_id::RepositoryIdentifier;

#[derive(Debug, Parser)]
#[command(name = "ghfeed", version, about = "Read GitHub activity feeds in the terminal")]
struct Cli {
    #[command(subcommand)]
    source: SourceArg,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,

    /// Bypass HTTP caches for the first page
    #[arg(long)]
    refresh: bool,

    /// Open the primary target of entry INDEX in the browser
    #[arg(long, value_name = "INDEX")]
    open: Option<usize>,

    /// With --open, follow the Nth inline link of the entry instead
    #[arg(long, value_name = "N", requires = "open")]
    link: Option<usize>,

    /// Render as this account instead of the authenticated one
    #[arg(long = "as", value_name = "LOGIN")]
    as_user: Option<String>,
}

#[derive(Debug, Subcommand)]
enum SourceArg {
    /// Events performed by a user
    User { login: String },
    /// A user's news feed
    Received { login: String },
    /// Events in one repository (owner/name)
    Repo { full_name: String },
    /// Events in an organization
    Org { org: String },
    /// Public events across GitHub
    Public,
}

impl TryFrom<SourceArg> for FeedSource {
    type Error = FeedError;

    fn try_from(arg: SourceArg) -> Result<Self, Self::Error> {
        Ok(match arg {
            SourceArg::User { login } => FeedSource::User(login),
            SourceArg::Received { login } => FeedSource::Received(login),
            SourceArg::Repo { full_name } => {
                let id = RepositoryIdentifier::parse(&full_name);
                let (owner, name) = id.owner_and_name().ok_or_else(|| {
                    FeedError::Config(format!("expected owner/name, got '{}'", full_name))
                })?;
                FeedSource::Repository {
                    owner: owner.to_string(),
                    name: name.to_string(),
                }
            }
            SourceArg::Org { org } => FeedSource::Organization(org),
            SourceArg::Public => FeedSource::Public,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load();
    let token = auth::load_token(&config.github)?;
    let github = GitHub::new(&config.github.api_url, token)?;

    let pages = cli.pages.max(1);
    let refresh = cli.refresh;
    let open_index = cli.open;
    let link_index = cli.link;
    let source = FeedSource::try_from(cli.source)?;

    let account = match cli.as_user.or(config.general.username.clone()) {
        Some(login) => Some(login),
        None => match github.current_user().await {
            Ok(login) => Some(login),
            Err(e) => {
                warn!(error = %e, "could not resolve current account");
                None
            }
        },
    };

    let ctx = RenderContext {
        report_repository: source.report_repository(),
        account,
    };
    info!(%source, pages, "loading feed");

    let fetcher = Arc::new(github.events(source, config.general.per_page));
    let feed = EventFeed::new(fetcher, ctx);

    feed.load_full(refresh).await?;
    for _ in 1..pages {
        if let LoadOutcome::EndOfStream = feed.load_more().await? {
            break;
        }
    }

    let snapshot = feed.snapshot();
    print_entries(&snapshot.entries);
    if snapshot.has_more {
        println!("(more available, use --pages to load further)");
    }

    if let Some(index) = open_index {
        let entry = snapshot
            .entries
            .get(index)
            .ok_or_else(|| FeedError::Config(format!("no entry at index {}", index)))?;
        match select_target(entry, link_index)?.filter(|target| !target.is_noop()) {
            Some(target) => {
                info!(event = %entry.event.id, ?target, "opening");
                WebNavigator::new(&config.github.web_url).navigate(target)?
            }
            None => eprintln!("Entry {} has nothing to open", index),
        }
    }

    Ok(())
}

/// The entry's own target, or its Nth inline anchor when `link` is given.
fn select_target(entry: &FeedEntry, link: Option<usize>) -> Result<Option<&NavTarget>, FeedError> {
    match link {
        None => Ok(entry.rendered.primary.as_ref()),
        Some(n) => entry
            .rendered
            .anchors()
            .nth(n)
            .map(|(_, target)| Some(target))
            .ok_or_else(|| FeedError::Config(format!("entry has no link {}", n))),
    }
}

fn print_entries(entries: &[FeedEntry]) {
    for (index, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}  {:>4}  {}",
            index,
            format_age(entry.event.created_at),
            entry.rendered.header_text()
        );
        for line in entry
            .rendered
            .body_text()
            .lines()
            .filter(|l| !l.trim().is_empty())
        {
            println!("           {}", line);
        }
    }
}

fn format_age(dt: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        "now".to_string()
    }
}
