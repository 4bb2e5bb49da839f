mod archive;
mod error;
mod fetch;
mod materialize;
mod parser;
mod post;
mod runner;
mod settings;
mod snapshot;
mod wordpress;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::fetch::HttpFetcher;
use crate::materialize::Materializer;
use crate::parser::ExtractOptions;
use crate::settings::{Settings, DEFAULT_CONFIG_FILE};
use crate::wordpress::{PostQuery, WordPressClient};

#[derive(Parser)]
#[command(name = "wp-archiver", about = "Archive a WordPress blog's posts and images to disk")]
struct Cli {
    /// Settings file (TOML); WPA_* environment variables override it
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch posts and archive every one not already marked done
    Run {
        /// Max posts to request (default: post_count setting)
        #[arg(short = 'n', long)]
        limit: Option<u32>,
        /// Decide inline-image wrapper removal from the parent of the last
        /// anchor seen, reproducing bodies cleaned by earlier archive runs
        #[arg(long)]
        legacy_inline_parent: bool,
    },
    /// Count done and incomplete post directories in the archive
    Status,
    /// Summarize a saved post_object snapshot
    Inspect {
        path: PathBuf,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {:?}", cli.config))?;

    match cli.command {
        Commands::Run {
            limit,
            legacy_inline_parent,
        } => {
            if let Some(n) = limit {
                settings.post_count = n;
            }
            settings.legacy_inline_parent |= legacy_inline_parent;
            settings.require_remote()?;
            info!("Starting execution...");

            let mut wp = WordPressClient::new(settings.blog_id, settings.timeout());
            wp.login(&settings.xmlrpc_url, &settings.username, &settings.password)?;

            let fetcher = HttpFetcher::new(settings.timeout())?;
            let opts = ExtractOptions {
                base_url: settings.base_url().to_string(),
                legacy_inline_parent: settings.legacy_inline_parent,
            };
            let materializer = Materializer::new(&settings.save_dir, opts, &fetcher);
            let query = PostQuery {
                number: settings.post_count,
                post_status: settings.post_status.clone(),
                order_by: settings.order_by.clone(),
                order: settings.order.clone(),
            };

            let stats = runner::run(&wp, &query, &materializer)?;
            stats.print();
        }
        Commands::Status => {
            let st = runner::status(&settings.save_dir)?;
            println!("Archive:    {:?}", settings.save_dir);
            println!("Done:       {}", st.done);
            println!("Incomplete: {}", st.incomplete);
        }
        Commands::Inspect { path } => {
            let snap = snapshot::load(&path)?;
            let images = snap.decode_images()?;
            println!("Post {} ({})", snap.id, snap.date);
            println!("Title:   {}", snap.title);
            println!("Slug:    {}", snap.slug);
            println!("Tags:    {}", snap.post().tags_csv());
            println!("Dir:     {:?}", snap.save_dir);
            println!(
                "Body:    {} chars original, {} chars cleaned",
                snap.content.chars().count(),
                snap.clean_body.chars().count()
            );
            println!("Images:  {}", images.len());
            for img in &images {
                println!("  {} ({} bytes) <- {}", img.filename, img.data.len(), img.original_url);
            }
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}
