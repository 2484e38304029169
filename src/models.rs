use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier shared by articles, comments and replies.
///
/// Records created locally use epoch milliseconds; seed data may carry either
/// numbers or strings. Equality is strict (`5` and `"5"` differ), while
/// [`Id::key`] gives the textual form used for map keys and route params.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Text(String),
}

impl Id {
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn as_num(&self) -> Option<i64> {
        match self {
            Id::Num(n) => Some(*n),
            Id::Text(_) => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Num(n) => write!(f, "{n}"),
            Id::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Num(n)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::Text(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::Text(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Id,
    pub title: String,
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub author: String,
    pub publish_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub views: u64,
    pub tags: Vec<String>,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
}

impl Article {
    /// Body shown on the reading page; records without content fall back to the summary.
    pub fn body(&self) -> &str {
        self.content.as_deref().unwrap_or(&self.desc)
    }

    pub fn likes(&self) -> u64 {
        self.likes.unwrap_or(0)
    }
}

/// Build an [`Article`] from one record of the seed document or of a
/// persisted snapshot, applying every default in one place.
///
/// Fields that are missing, `null` or of the wrong type fall back to their
/// defaults: empty text, `views` 0, `isPublic` true, no tags. Only a record
/// without a usable id (integer or non-empty string) yields `None`.
pub fn normalize_article(raw: &Value) -> Option<Article> {
    let id = record_id(raw.get("id")?)?;
    Some(Article {
        id,
        title: text(raw, "title").unwrap_or_default(),
        desc: text(raw, "desc").unwrap_or_default(),
        content: text(raw, "content"),
        author: text(raw, "author").unwrap_or_default(),
        publish_time: text(raw, "publishTime").unwrap_or_default(),
        image: text(raw, "image").filter(|i| !i.is_empty()),
        views: raw.get("views").and_then(counter).unwrap_or(0),
        tags: dedup_tags(
            raw.get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
        ),
        is_public: raw.get("isPublic").and_then(Value::as_bool).unwrap_or(true),
        likes: raw.get("likes").and_then(counter),
    })
}

fn record_id(v: &Value) -> Option<Id> {
    match v {
        Value::String(s) if !s.is_empty() => Some(Id::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(Id::Num),
        _ => None,
    }
}

fn text(raw: &Value, field: &str) -> Option<String> {
    raw.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Drop repeated tags, keeping first-insertion order.
pub fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

// Non-negative whole number, or None for anything that is not a JSON number.
fn counter(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id,
    pub article_id: Id,
    pub content: String,
    pub author: String,
    pub publish_time: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: Id,
    pub comment_id: Id,
    pub content: String,
    pub author: String,
    pub publish_time: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub password_encoded: String,
}

/// Persisted pointer to the logged-in user (`currentUser`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPointer {
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub username: Option<String>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }

    /// Generated avatar for the logged-in user.
    pub fn avatar_url(&self) -> Option<String> {
        self.username.as_deref().map(|name| {
            format!(
                "https://api.dicebear.com/7.x/miniavs/svg?seed={}",
                urlencoding::encode(name)
            )
        })
    }
}

/// Input of the publish form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub desc: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub image: Option<String>,
}

/// Input of the edit form. `image: None` keeps the current cover.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleChanges {
    pub title: String,
    pub desc: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub keyword: String,
    pub tag: Option<String>,
    pub sort: SortMode,
}

/// One row of a leaderboard. Article rows carry the id for navigation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub name: String,
    pub score: u64,
    pub id: Option<Id>,
}
