use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::archive;
use crate::error::{ApiError, ArchiveError};
use crate::materialize::{Materializer, Outcome};
use crate::wordpress::{ContentSource, PostQuery};

/// Counts returned after a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
    pub images: usize,
}

impl RunStats {
    pub fn print(&self) {
        println!(
            "{} posts: {} archived ({} images), {} skipped, {} failed.",
            self.total, self.archived, self.images, self.skipped, self.failed
        );
    }
}

/// List posts, then archive each one that is not yet marked done. A post
/// that fails is reported and left for the next run; the rest continue.
pub fn run(
    source: &dyn ContentSource,
    query: &PostQuery,
    materializer: &Materializer,
) -> Result<RunStats, ApiError> {
    info!("Fetching {} posts: {:?}", query.number, query);
    let posts = source.get_posts(query)?;
    info!("Posts found: {}", posts.len());

    let pb = ProgressBar::new(posts.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut stats = RunStats {
        total: posts.len(),
        ..Default::default()
    };
    for post in &posts {
        pb.set_message(post.slug.clone());
        match materializer.materialize(post) {
            Ok(Outcome::Archived { images }) => {
                stats.archived += 1;
                stats.images += images;
            }
            Ok(Outcome::AlreadyDone) => stats.skipped += 1,
            Err(e) => {
                error!("Post {} ({}) not archived: {}", post.id, post.dir_name(), e);
                stats.failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        archived = stats.archived,
        skipped = stats.skipped,
        failed = stats.failed,
        "Run complete"
    );
    Ok(stats)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveStatus {
    pub done: usize,
    pub incomplete: usize,
}

/// Count post directories under `root` with and without a `done` marker.
pub fn status(root: &Path) -> Result<ArchiveStatus, ArchiveError> {
    let mut st = ArchiveStatus::default();
    if !root.exists() {
        return Ok(st);
    }
    let entries = fs::read_dir(root).map_err(|e| ArchiveError::io("read", root, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ArchiveError::io("read", root, e))?.path();
        if !path.is_dir() {
            continue;
        }
        if archive::is_done(&path) {
            st.done += 1;
        } else {
            st.incomplete += 1;
        }
    }
    Ok(st)
}
