//! Image reference extraction: linked images first, then inline images.

use crate::archive::PostLog;
use crate::error::ArchiveError;
use crate::fetch::{filename_from_url, is_image_link, resolve_link, ImageFetcher};
use crate::post::ImageRecord;

use super::document::Document;

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub base_url: String,
    /// Decide inline-image wrapper removal from the last anchor examined
    /// in the linked pass instead of the image's own parent.
    pub legacy_inline_parent: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub images: Vec<ImageRecord>,
    pub clean_body: String,
}

pub fn extract_images(
    body: &str,
    opts: &ExtractOptions,
    fetcher: &dyn ImageFetcher,
    log: &mut dyn PostLog,
) -> Result<Extraction, ArchiveError> {
    log.log("Parsing and fetching images")?;
    let mut doc = Document::parse(body);
    let mut images = Vec::new();
    let base = opts.base_url.trim_end_matches('/');

    // ── Pattern A: <a href="...jpg|png|gif"> ──
    let mut last_anchor = None;
    for anchor in doc.anchors() {
        last_anchor = Some(anchor.id);
        let Some(href) = anchor.attr.as_deref().filter(|h| is_image_link(h)) else {
            continue;
        };
        let url = resolve_link(href, base);
        if let Some(image) = fetch_one(&url, fetcher, log)? {
            images.push(image);
            if let Some(div) = doc.centered_parent(anchor.id) {
                log.log(&format!("Removing centered img: {}", doc.outer_html(div)))?;
                doc.remove(div);
            }
        }
        doc.remove(anchor.id);
    }

    // ── Pattern B: <img src="..."> still attached after pass A ──
    for img in doc.images() {
        let Some(src) = img.attr.as_deref() else {
            continue;
        };
        if let Some(image) = fetch_one(src, fetcher, log)? {
            images.push(image);
            let wrapper = if opts.legacy_inline_parent {
                last_anchor.and_then(|a| doc.parent_div(a))
            } else {
                doc.parent_div(img.id)
            };
            if let Some(div) = wrapper {
                log.log(&format!("Removing div: {}", doc.outer_html(div)))?;
                doc.remove(div);
            }
        }
        doc.remove(img.id);
    }

    let clean_body = doc.to_html();
    log.log("Saved cleaned post body")?;
    Ok(Extraction { images, clean_body })
}

/// Fetch failures are reported on the error channel and swallowed.
fn fetch_one(
    url: &str,
    fetcher: &dyn ImageFetcher,
    log: &mut dyn PostLog,
) -> Result<Option<ImageRecord>, ArchiveError> {
    log.log(&format!("Image found: {}", url))?;
    match fetcher.fetch(url) {
        Ok(data) => Ok(Some(ImageRecord {
            filename: filename_from_url(url).to_string(),
            data,
            original_url: url.to_string(),
        })),
        Err(e) => {
            log.error(&format!("Error fetching image: {}, {}", url, e))?;
            Ok(None)
        }
    }
}
