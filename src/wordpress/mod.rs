//! WordPress XML-RPC content source.

pub mod xmlrpc;

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::post::{Post, Term};
use xmlrpc::Value;

/// Filter passed to `wp.getPosts`.
#[derive(Debug, Clone)]
pub struct PostQuery {
    pub number: u32,
    pub post_status: String,
    pub order_by: String,
    pub order: String,
}

/// Anything that can list posts for the run driver.
pub trait ContentSource {
    fn get_posts(&self, query: &PostQuery) -> Result<Vec<Post>, ApiError>;
}

struct Session {
    http: Client,
    url: String,
    username: String,
    password: String,
}

pub struct WordPressClient {
    blog_id: u32,
    timeout: Duration,
    session: Option<Session>,
}

impl WordPressClient {
    pub fn new(blog_id: u32, timeout: Duration) -> Self {
        WordPressClient {
            blog_id,
            timeout,
            session: None,
        }
    }

    /// XML-RPC sends credentials with each call, so logging in only sets up
    /// the session. Calling it again is a no-op.
    pub fn login(&mut self, url: &str, username: &str, password: &str) -> Result<&mut Self, ApiError> {
        if self.session.is_none() {
            let http = Client::builder()
                .timeout(self.timeout)
                .user_agent(concat!("wp-archiver/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|source| ApiError::Transport {
                    url: url.to_string(),
                    source,
                })?;
            self.session = Some(Session {
                http,
                url: url.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            });
            info!("Session ready for {}", url);
        }
        Ok(self)
    }

    fn call(&self, method: &str, params: &[Value]) -> Result<Value, ApiError> {
        let session = self.session.as_ref().ok_or(ApiError::NotLoggedIn)?;
        let body = xmlrpc::encode_call(method, params);
        debug!("POST {} {}", session.url, method);

        let transport = |source| ApiError::Transport {
            url: session.url.clone(),
            source,
        };
        let resp = session
            .http
            .post(&session.url)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: session.url.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().map_err(transport)?;
        xmlrpc::decode_response(&bytes)
    }
}

impl ContentSource for WordPressClient {
    fn get_posts(&self, query: &PostQuery) -> Result<Vec<Post>, ApiError> {
        let session = self.session.as_ref().ok_or(ApiError::NotLoggedIn)?;
        let filter = Value::Struct(vec![
            ("number".into(), Value::Int(i64::from(query.number))),
            ("post_status".into(), Value::str(&query.post_status)),
            ("orderby".into(), Value::str(&query.order_by)),
            ("order".into(), Value::str(&query.order)),
        ]);
        let params = [
            Value::Int(i64::from(self.blog_id)),
            Value::str(&session.username),
            Value::str(&session.password),
            filter,
        ];
        match self.call("wp.getPosts", &params)? {
            Value::Array(items) => items.iter().map(post_from_value).collect(),
            other => Err(ApiError::Post(format!("expected array of posts, got {:?}", other))),
        }
    }
}

fn post_from_value(v: &Value) -> Result<Post, ApiError> {
    let text = |key: &str| -> Result<String, ApiError> {
        v.member(key)
            .and_then(Value::as_text)
            .ok_or_else(|| ApiError::Post(format!("missing `{}`", key)))
    };

    let id_text = text("post_id")?;
    let id = id_text
        .trim()
        .parse()
        .map_err(|_| ApiError::Post(format!("bad post_id `{}`", id_text)))?;
    let date = parse_date(&text("post_date")?)?;

    // Title and body stay as received; only save_body insists on UTF-8.
    let raw = |key: &str| match v.member(key) {
        Some(Value::String(bytes)) => bytes.clone(),
        Some(other) => other.as_text().unwrap_or_default().into_bytes(),
        None => Vec::new(),
    };

    let terms = match v.member("terms") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|t| {
                Some(Term {
                    name: t.member("name")?.as_text()?,
                    taxonomy: t.member("taxonomy").and_then(Value::as_text),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(Post {
        id,
        date,
        slug: text("post_name").unwrap_or_default(),
        title: raw("post_title"),
        content: raw("post_content"),
        terms,
    })
}

/// `dateTime.iso8601` as WordPress sends it (`20130104T12:30:00`), with a
/// few tolerated variants.
fn parse_date(s: &str) -> Result<NaiveDateTime, ApiError> {
    let s = s.trim().trim_end_matches('Z');
    ["%Y%m%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ApiError::Post(format!("bad post_date `{}`", s)))
}
