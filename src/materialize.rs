//! Turns one post into its on-disk artifact set.
//!
//! Steps run in a fixed order and the `done` marker is written last, so a
//! post that fails part-way is simply retried on the next run.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::archive::{
    is_image_filename, FileLog, PostDir, PostLog, BODY_FILE, DONE_MARKER, ORIGINAL_BODY_FILE,
    TAGS_FILE, TITLE_FILE,
};
use crate::error::ArchiveError;
use crate::fetch::ImageFetcher;
use crate::parser::{extract_images, ExtractOptions, Extraction};
use crate::post::Post;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Archived { images: usize },
    AlreadyDone,
}

pub struct Materializer<'a> {
    root: PathBuf,
    opts: ExtractOptions,
    fetcher: &'a dyn ImageFetcher,
}

impl<'a> Materializer<'a> {
    pub fn new(root: &Path, opts: ExtractOptions, fetcher: &'a dyn ImageFetcher) -> Self {
        Materializer {
            root: root.to_path_buf(),
            opts,
            fetcher,
        }
    }

    /// Ensure the save directory, skip if already marked done, otherwise
    /// archive with the post's own log files.
    pub fn materialize(&self, post: &Post) -> Result<Outcome, ArchiveError> {
        let dir = PostDir::ensure(post.save_dir(&self.root))?;
        if dir.is_done() {
            return Ok(Outcome::AlreadyDone);
        }
        let mut log = FileLog::new(dir.clone());
        self.archive(post, &dir, &mut log)
    }

    /// Fatal errors are written to the error channel before being returned.
    pub fn archive(
        &self,
        post: &Post,
        dir: &PostDir,
        log: &mut dyn PostLog,
    ) -> Result<Outcome, ArchiveError> {
        match self.run_steps(post, dir, log) {
            Ok(images) => Ok(Outcome::Archived { images }),
            // Encoding failures are reported where they happen.
            Err(e @ ArchiveError::Encoding(_)) => Err(e),
            Err(e) => {
                let message = format!("Failed archiving post {}: {}", post.id, e);
                if let Err(log_err) = log.error(&message) {
                    warn!("Could not record failure of post {}: {}", post.id, log_err);
                }
                Err(e)
            }
        }
    }

    fn run_steps(
        &self,
        post: &Post,
        dir: &PostDir,
        log: &mut dyn PostLog,
    ) -> Result<usize, ArchiveError> {
        save_title(post, dir, log)?;

        let body = String::from_utf8_lossy(&post.content);
        let extraction = extract_images(&body, &self.opts, self.fetcher, log)?;

        save_images(&extraction, dir, log)?;
        save_tags(post, dir, log)?;
        let content = save_body(post, &extraction, dir, log)?;

        log.log("Saving post object")?;
        Snapshot::new(post, content, dir.path(), &extraction).write(dir)?;

        mark_done(dir, log)?;
        Ok(extraction.images.len())
    }
}

fn save_title(post: &Post, dir: &PostDir, log: &mut dyn PostLog) -> Result<(), ArchiveError> {
    log.log(&format!("Saving title: {}", post.title_text()))?;
    dir.write(TITLE_FILE, &post.title)
}

/// Colliding filenames overwrite each other; the last one wins.
fn save_images(
    extraction: &Extraction,
    dir: &PostDir,
    log: &mut dyn PostLog,
) -> Result<(), ArchiveError> {
    for img in &extraction.images {
        if !is_image_filename(&img.filename) {
            log.error(&format!(
                "Skipping image with unusable filename `{}`: {}",
                img.filename, img.original_url
            ))?;
            continue;
        }
        log.log(&format!("Saving image {}", img.filename))?;
        dir.write(&img.filename, &img.data)?;
    }
    Ok(())
}

fn save_tags(post: &Post, dir: &PostDir, log: &mut dyn PostLog) -> Result<(), ArchiveError> {
    let csv = post.tags_csv();
    log.log(&format!("Saving tags: {}", csv))?;
    dir.write(TAGS_FILE, csv.as_bytes())
}

/// Returns the original body as text for the snapshot.
fn save_body<'p>(
    post: &'p Post,
    extraction: &Extraction,
    dir: &PostDir,
    log: &mut dyn PostLog,
) -> Result<&'p str, ArchiveError> {
    let content = match std::str::from_utf8(&post.content) {
        Ok(s) => s,
        Err(e) => {
            log.error(&format!("Unicode failure: {}", e))?;
            return Err(e.into());
        }
    };
    if !extraction.clean_body.is_empty() {
        log.log("Saving cleaned body")?;
        dir.write(BODY_FILE, extraction.clean_body.as_bytes())?;
    }
    log.log("Saving original body")?;
    dir.write(ORIGINAL_BODY_FILE, &post.content)?;
    Ok(content)
}

fn mark_done(dir: &PostDir, log: &mut dyn PostLog) -> Result<(), ArchiveError> {
    log.log("Marking done")?;
    let now = Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f");
    dir.write(DONE_MARKER, now.to_string().as_bytes())
}
