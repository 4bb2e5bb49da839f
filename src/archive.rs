//! On-disk layout of one archived post and its two log channels.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{error, info};

use crate::error::ArchiveError;

pub const TITLE_FILE: &str = "title.txt";
pub const TAGS_FILE: &str = "tags.csv";
pub const BODY_FILE: &str = "body.txt";
pub const ORIGINAL_BODY_FILE: &str = "original_body.txt";
pub const SNAPSHOT_FILE: &str = "post_object";
pub const RESULTS_LOG: &str = "results.log";
pub const ERRORS_LOG: &str = "errors.log";
pub const DONE_MARKER: &str = "done";

const ARTIFACTS: [&str; 8] = [
    TITLE_FILE,
    TAGS_FILE,
    BODY_FILE,
    ORIGINAL_BODY_FILE,
    SNAPSHOT_FILE,
    RESULTS_LOG,
    ERRORS_LOG,
    DONE_MARKER,
];

/// Whether an image may be saved under `name` in a post directory without
/// clobbering an artifact or escaping the directory.
pub fn is_image_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !ARTIFACTS.contains(&name)
}

/// A post's save directory.
#[derive(Debug, Clone)]
pub struct PostDir {
    path: PathBuf,
}

impl PostDir {
    /// Create the directory if absent. Existing contents are left alone.
    pub fn ensure(path: PathBuf) -> Result<Self, ArchiveError> {
        fs::create_dir_all(&path).map_err(|e| ArchiveError::io("create", &path, e))?;
        Ok(PostDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Create or truncate `name` with `content`.
    pub fn write(&self, name: &str, content: &[u8]) -> Result<(), ArchiveError> {
        let path = self.file(name);
        fs::write(&path, content).map_err(|e| ArchiveError::io("write", &path, e))
    }

    pub fn append(&self, name: &str, content: &[u8]) -> Result<(), ArchiveError> {
        let path = self.file(name);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ArchiveError::io("open", &path, e))?;
        f.write_all(content)
            .map_err(|e| ArchiveError::io("append", &path, e))
    }

    pub fn is_done(&self) -> bool {
        is_done(&self.path)
    }
}

pub fn is_done(dir: &Path) -> bool {
    dir.join(DONE_MARKER).exists()
}

pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Per-post informational and error channels.
pub trait PostLog {
    fn log(&mut self, message: &str) -> Result<(), ArchiveError>;
    fn error(&mut self, message: &str) -> Result<(), ArchiveError>;
}

/// Appends timestamped lines to `results.log` / `errors.log` and mirrors
/// them to tracing.
pub struct FileLog {
    dir: PostDir,
}

impl FileLog {
    pub fn new(dir: PostDir) -> Self {
        FileLog { dir }
    }
}

/// One message per line; embedded line breaks become spaces.
fn log_line(message: &str) -> String {
    let flat: String = message
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("{} {}", timestamp(), flat)
}

impl PostLog for FileLog {
    fn log(&mut self, message: &str) -> Result<(), ArchiveError> {
        let line = log_line(message);
        info!("{}", line);
        self.dir.append(RESULTS_LOG, format!("{}\n", line).as_bytes())
    }

    fn error(&mut self, message: &str) -> Result<(), ArchiveError> {
        let line = log_line(message);
        error!("{}", line);
        self.dir.append(ERRORS_LOG, format!("{}\n", line).as_bytes())
    }
}

/// Captures lines without timestamps; used by tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub lines: Vec<String>,
    pub errors: Vec<String>,
}

#[cfg(test)]
impl PostLog for MemoryLog {
    fn log(&mut self, message: &str) -> Result<(), ArchiveError> {
        self.lines.push(message.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<(), ArchiveError> {
        self.errors.push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_keeps_existing_files() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("2013-01-04-(1)-x");
        let dir = PostDir::ensure(path.clone()).unwrap();
        dir.write("keep.txt", b"old").unwrap();

        let again = PostDir::ensure(path).unwrap();
        assert_eq!(fs::read(again.file("keep.txt")).unwrap(), b"old");
    }

    #[test]
    fn write_overwrites_append_accumulates() {
        let root = tempfile::tempdir().unwrap();
        let dir = PostDir::ensure(root.path().join("p")).unwrap();
        dir.write("t", b"first").unwrap();
        dir.write("t", b"2nd").unwrap();
        dir.append("l", b"a\n").unwrap();
        dir.append("l", b"b\n").unwrap();
        assert_eq!(fs::read(dir.file("t")).unwrap(), b"2nd");
        assert_eq!(fs::read(dir.file("l")).unwrap(), b"a\nb\n");
    }

    #[test]
    fn file_log_lines_are_timestamped() {
        let root = tempfile::tempdir().unwrap();
        let dir = PostDir::ensure(root.path().join("p")).unwrap();
        let mut log = FileLog::new(dir.clone());
        log.log("Saving title: x").unwrap();
        log.error("Error fetching image: http://x/a.jpg, boom").unwrap();

        let results = fs::read_to_string(dir.file(RESULTS_LOG)).unwrap();
        let errors = fs::read_to_string(dir.file(ERRORS_LOG)).unwrap();
        assert_eq!(results.lines().count(), 1);
        assert!(results.ends_with(" Saving title: x\n"));
        assert!(errors.contains("http://x/a.jpg"));
        // `YYYY-MM-DD HH:MM:SS.ffffff message`
        let ts: Vec<&str> = results.splitn(3, ' ').collect();
        assert_eq!(ts[0].len(), 10);
        assert!(ts[1].contains(':'));
    }

    #[test]
    fn multiline_messages_stay_on_one_line() {
        let root = tempfile::tempdir().unwrap();
        let dir = PostDir::ensure(root.path().join("p")).unwrap();
        let mut log = FileLog::new(dir.clone());
        log.log("Removing div: <div>\n<img src=\"a.png\">\r\n</div>").unwrap();
        log.error("Error fetching image: x,\nboom").unwrap();

        let results = fs::read_to_string(dir.file(RESULTS_LOG)).unwrap();
        assert_eq!(results.lines().count(), 1);
        assert!(results.ends_with(" Removing div: <div> <img src=\"a.png\">  </div>\n"));
        let errors = fs::read_to_string(dir.file(ERRORS_LOG)).unwrap();
        assert_eq!(errors.lines().count(), 1);
    }

    #[test]
    fn image_filenames_never_shadow_artifacts() {
        assert!(is_image_filename("a.jpg"));
        assert!(is_image_filename("done.png"));
        for name in ["", ".", "..", DONE_MARKER, TITLE_FILE, SNAPSHOT_FILE, ERRORS_LOG] {
            assert!(!is_image_filename(name), "{name:?}");
        }
    }

    #[test]
    fn done_marker_detection() {
        let root = tempfile::tempdir().unwrap();
        let dir = PostDir::ensure(root.path().join("p")).unwrap();
        assert!(!dir.is_done());
        dir.write(DONE_MARKER, b"2013-01-04T00:00:00").unwrap();
        assert!(dir.is_done());
    }
}
