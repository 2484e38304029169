//! Derived views over article snapshots: visibility, filtering, ordering and
//! leaderboards. Everything here is pure; callers pass the snapshot in.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{Article, ListQuery, RankEntry, SortMode};

pub const LEADERBOARD_SIZE: usize = 5;

/// Private articles are only visible to their author.
pub fn is_visible_to(article: &Article, viewer: Option<&str>) -> bool {
    article.is_public || viewer == Some(article.author.as_str())
}

pub fn visible(articles: &[Article], viewer: Option<&str>) -> Vec<Article> {
    articles
        .iter()
        .filter(|a| is_visible_to(a, viewer))
        .cloned()
        .collect()
}

/// Case-insensitive substring match on title, summary and author.
pub fn matches_keyword(article: &Article, keyword: &str) -> bool {
    if keyword.is_empty() {
        return true;
    }
    let kw = keyword.to_lowercase();
    article.title.to_lowercase().contains(&kw)
        || article.desc.to_lowercase().contains(&kw)
        || article.author.to_lowercase().contains(&kw)
}

/// Exact tag match; untagged records match on title/summary text instead.
pub fn matches_tag(article: &Article, tag: &str) -> bool {
    if article.tags.is_empty() {
        let t = tag.to_lowercase();
        return article.title.to_lowercase().contains(&t) || article.desc.to_lowercase().contains(&t);
    }
    article.tags.iter().any(|x| x == tag)
}

pub fn sort_hot(articles: &mut [Article]) {
    articles.sort_by_key(|a| Reverse(a.views));
}

/// Newest first. Unparsable timestamps sort after every parsable one.
pub fn sort_new(articles: &mut [Article]) {
    articles.sort_by_cached_key(|a| Reverse(parse_publish_time(&a.publish_time)));
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and bare dates.
pub fn parse_publish_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Home listing. A non-empty keyword searches every article, private ones
/// included, so authors can find their drafts; otherwise only what `viewer`
/// may see is listed.
pub fn list(articles: &[Article], viewer: Option<&str>, query: &ListQuery) -> Vec<Article> {
    let mut out: Vec<Article> = articles
        .iter()
        .filter(|a| !query.keyword.is_empty() || is_visible_to(a, viewer))
        .filter(|a| matches_keyword(a, &query.keyword))
        .filter(|a| query.tag.as_deref().map_or(true, |t| matches_tag(a, t)))
        .cloned()
        .collect();
    match query.sort {
        SortMode::Hot => sort_hot(&mut out),
        SortMode::New => sort_new(&mut out),
    }
    out
}

/// Total views per author, highest first; ties keep first-seen order.
pub fn author_leaderboard(articles: &[Article]) -> Vec<RankEntry> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(String, u64)> = Vec::new();
    for a in articles {
        match slots.get(a.author.as_str()) {
            Some(&i) => totals[i].1 += a.views,
            None => {
                slots.insert(&a.author, totals.len());
                totals.push((a.author.clone(), a.views));
            }
        }
    }
    totals.sort_by_key(|(_, score)| Reverse(*score));
    totals
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .map(|(name, score)| RankEntry { name, score, id: None })
        .collect()
}

pub fn article_leaderboard(articles: &[Article]) -> Vec<RankEntry> {
    let mut sorted = articles.to_vec();
    sort_hot(&mut sorted);
    sorted
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .map(|a| RankEntry { name: a.title, score: a.views, id: Some(a.id) })
        .collect()
}
