use std::borrow::Cow;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One published post as returned by the content API.
///
/// `title` and `content` are kept as the bytes received so that
/// `title.txt` and `original_body.txt` reproduce them exactly, even when
/// they are not valid UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: u64,
    pub date: NaiveDateTime,
    pub slug: String,
    pub title: Vec<u8>,
    pub content: Vec<u8>,
    pub terms: Vec<Term>,
}

/// A taxonomy term attached to a post (tag or category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    pub taxonomy: Option<String>,
}

/// An image pulled out of a post body.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub filename: String,
    pub data: Vec<u8>,
    pub original_url: String,
}

impl Post {
    /// Directory name under the archive root: `<date>-(<id>)-<slug>`.
    pub fn dir_name(&self) -> String {
        format!("{}-({})-{}", self.date.date(), self.id, self.slug)
    }

    /// Title for log lines and the snapshot.
    pub fn title_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.title)
    }

    pub fn save_dir(&self, root: &Path) -> PathBuf {
        root.join(self.dir_name())
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.terms.iter().map(|t| t.name.as_str()).collect()
    }

    /// Comma-joined term names. Commas inside a name are not escaped.
    pub fn tags_csv(&self) -> String {
        self.tag_names().join(",")
    }
}

#[cfg(test)]
pub(crate) fn sample_post(content: &str) -> Post {
    use chrono::NaiveDate;

    Post {
        id: 42,
        date: NaiveDate::from_ymd_opt(2013, 1, 4)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .unwrap(),
        slug: "hello-world".into(),
        title: "Hello, wörld".into(),
        content: content.as_bytes().to_vec(),
        terms: vec![
            Term {
                name: "a".into(),
                taxonomy: Some("post_tag".into()),
            },
            Term {
                name: "b,c".into(),
                taxonomy: Some("category".into()),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_name_from_date_id_slug() {
        let post = sample_post("");
        assert_eq!(post.dir_name(), "2013-01-04-(42)-hello-world");
        assert_eq!(
            post.save_dir(Path::new("archive")),
            PathBuf::from("archive/2013-01-04-(42)-hello-world")
        );
    }

    #[test]
    fn tags_join_without_escaping() {
        // Known limitation: a comma inside a tag name is indistinguishable
        // from the separator.
        let post = sample_post("");
        assert_eq!(post.tags_csv(), "a,b,c");
    }

    #[test]
    fn no_terms_is_empty_csv() {
        let mut post = sample_post("");
        post.terms.clear();
        assert_eq!(post.tags_csv(), "");
    }
}
