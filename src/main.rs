//! Command-line front end: reads captured posts from a JSON file and writes
//! them out as a ZIP archive or a plain-text file.

use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::BufWriter;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use feedzip::cli::{Command, ExportArgs, InputArgs, TextArgs};
use feedzip::export::{ExportOutcome, ProgressEvent};
use feedzip::posts::{self, Post};
use feedzip::{Cli, HttpFetcher, VecSource};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Command::Export(args) => export(args, cli.is_quiet()).await,
        Command::Text(args) => text(args).await,
        Command::Plan(args) => plan(args).await,
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("feedzip={}", cli.log_level())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read the posts file and apply `--since`.
async fn load_posts(args: &InputArgs) -> Result<Vec<Post>> {
    let json = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    let mut posts =
        posts::parse_posts(&json).with_context(|| format!("parsing {}", args.input.display()))?;

    if let Some(since) = args.since {
        if since > Local::now().date_naive() {
            bail!("--since {since} is in the future");
        }
        let before = posts.len();
        posts = posts::filter_since(posts, since);
        debug!(kept = posts.len(), dropped = before - posts.len(), %since, "filtered posts");
    }

    if posts.is_empty() {
        warn!("no posts to export");
    }
    Ok(posts)
}

fn output_path(explicit: Option<&Path>, posts: &[Post], extension: &str) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let user = posts.first().map_or("", |p| p.user_name.as_str());
            PathBuf::from(posts::archive_file_name(user, Utc::now(), extension))
        }
    }
}

async fn export(args: &ExportArgs, quiet: bool) -> Result<()> {
    let config = args.resolve_config()?;
    let posts = load_posts(&args.input).await?;
    let mut source = VecSource::new(posts::prepare_items(&posts))?;

    let fetcher = HttpFetcher::new(&config.user_agent).context("building HTTP client")?;
    let mut exporter = config.exporter(fetcher);

    let cancel = exporter.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing archive");
            cancel.cancel();
        }
    });

    let path = output_path(args.output.as_deref(), &posts, "zip");
    let file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;

    let result = exporter
        .export(&mut source, BufWriter::new(file), |p: ProgressEvent<'_>| {
            if !quiet {
                let mark = if p.success { "ok" } else { "FAILED" };
                eprintln!("[{}/{}] {} {}", p.current, p.total, mark, p.name);
            }
        })
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    if !quiet {
        match result.outcome {
            ExportOutcome::Completed => {}
            ExportOutcome::TimedOut => eprintln!("\nTime limit reached, archive is partial"),
            ExportOutcome::Cancelled => eprintln!("\nCancelled, archive is partial"),
        }
        eprintln!(
            "\n{}: {} items ({} failed), {}",
            path.display(),
            result.total_items,
            result.failed_items,
            format_size(result.bytes_written)
        );
        eprintln!(
            "Total bytes downloaded: {}",
            format_size(exporter.fetcher().fetcher().transferred_bytes())
        );
    }

    Ok(())
}

async fn text(args: &TextArgs) -> Result<()> {
    let posts = load_posts(&args.input).await?;
    let path = output_path(args.output.as_deref(), &posts, "txt");
    tokio::fs::write(&path, posts::render_text_export(&posts))
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

async fn plan(args: &InputArgs) -> Result<()> {
    let posts = load_posts(args).await?;
    let items = posts::prepare_items(&posts);

    println!("{:>6}  Name", "Kind");
    println!("{}", "-".repeat(70));
    for item in &items {
        println!("{:>6}  {}", format!("{:?}", item.kind()).to_lowercase(), item.name);
    }
    println!("{}", "-".repeat(70));
    println!("{} posts, {} entries", posts.len(), items.len());
    Ok(())
}

/// Human-readable byte count.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
