//! Versioned JSON snapshot of a processed post (`post_object`).

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::archive::{PostDir, SNAPSHOT_FILE};
use crate::error::ArchiveError;
use crate::parser::Extraction;
use crate::post::{ImageRecord, Post, Term};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub id: u64,
    pub date: NaiveDateTime,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub terms: Vec<Term>,
    pub save_dir: PathBuf,
    pub clean_body: String,
    pub images: Vec<SnapshotImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotImage {
    pub filename: String,
    pub original_url: String,
    /// Base64 of the fetched bytes.
    pub data: String,
}

impl Snapshot {
    /// `content` must already be known to be UTF-8; the materializer only
    /// snapshots after the body has been saved.
    pub fn new(post: &Post, content: &str, save_dir: &Path, extraction: &Extraction) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            id: post.id,
            date: post.date,
            slug: post.slug.clone(),
            title: post.title_text().into_owned(),
            content: content.to_string(),
            terms: post.terms.clone(),
            save_dir: save_dir.to_path_buf(),
            clean_body: extraction.clean_body.clone(),
            images: extraction
                .images
                .iter()
                .map(|img| SnapshotImage {
                    filename: img.filename.clone(),
                    original_url: img.original_url.clone(),
                    data: STANDARD.encode(&img.data),
                })
                .collect(),
        }
    }

    pub fn write(&self, dir: &PostDir) -> Result<(), ArchiveError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| ArchiveError::Snapshot {
            path: dir.file(SNAPSHOT_FILE),
            source,
        })?;
        dir.write(SNAPSHOT_FILE, &json)
    }

    pub fn post(&self) -> Post {
        Post {
            id: self.id,
            date: self.date,
            slug: self.slug.clone(),
            title: self.title.as_bytes().to_vec(),
            content: self.content.as_bytes().to_vec(),
            terms: self.terms.clone(),
        }
    }

    pub fn decode_images(&self) -> Result<Vec<ImageRecord>, ArchiveError> {
        self.images
            .iter()
            .map(|img| {
                let data = STANDARD
                    .decode(&img.data)
                    .map_err(|_| ArchiveError::SnapshotImage {
                        path: self.save_dir.join(SNAPSHOT_FILE),
                        filename: img.filename.clone(),
                    })?;
                Ok(ImageRecord {
                    filename: img.filename.clone(),
                    data,
                    original_url: img.original_url.clone(),
                })
            })
            .collect()
    }
}

/// Re-hydrate a snapshot from its file path.
pub fn load(path: &Path) -> Result<Snapshot, ArchiveError> {
    let raw = fs::read(path).map_err(|e| ArchiveError::io("read", path, e))?;
    let snap: Snapshot = serde_json::from_slice(&raw).map_err(|source| ArchiveError::Snapshot {
        path: path.to_path_buf(),
        source,
    })?;
    if snap.version != SNAPSHOT_VERSION {
        return Err(ArchiveError::SnapshotVersion {
            path: path.to_path_buf(),
            found: snap.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(snap)
}
