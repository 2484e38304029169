use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{Comment, Id, Reply};
use crate::repo::{RepoError, RepoResult, Snapshot};
use crate::storage::{load_json, KeyValueStore};

pub const COMMENTS_KEY: &str = "allComments";

type CommentMap = BTreeMap<String, Vec<Comment>>;

/// Comment trees keyed by the textual article id. Comments are kept
/// most-recent-first, replies in arrival order.
///
/// Nothing here checks that the article exists, and deleting an article
/// leaves its comments in place.
#[derive(Clone)]
pub struct CommentStore {
    comments: Snapshot<CommentMap>,
}

impl CommentStore {
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let map: CommentMap = load_json(storage.as_ref(), COMMENTS_KEY).unwrap_or_default();
        Self { comments: Snapshot::new(storage, COMMENTS_KEY, map) }
    }

    pub fn by_article(&self, article_id: &Id) -> Vec<Comment> {
        self.comments
            .read(|m| m.get(&article_id.key()).cloned().unwrap_or_default())
    }

    pub fn count(&self, article_id: &Id) -> usize {
        self.comments
            .read(|m| m.get(&article_id.key()).map_or(0, Vec::len))
    }

    /// Largest numeric comment or reply id, if any.
    pub fn max_numeric_id(&self) -> Option<i64> {
        self.comments.read(|m| {
            m.values()
                .flatten()
                .flat_map(|c| std::iter::once(&c.id).chain(c.replies.iter().map(|r| &r.id)))
                .filter_map(Id::as_num)
                .max()
        })
    }

    pub fn add_comment(&self, article_id: &Id, comment: Comment) -> RepoResult<()> {
        self.comments.mutate(|m| {
            m.entry(article_id.key()).or_default().insert(0, comment);
            Ok(())
        })
    }

    pub fn add_reply(&self, article_id: &Id, comment_id: &Id, reply: Reply) -> RepoResult<()> {
        self.comments.mutate(|m| {
            let c = find_comment(m, article_id, comment_id)?;
            c.replies.push(reply);
            Ok(())
        })
    }

    pub fn like_comment(&self, article_id: &Id, comment_id: &Id) -> RepoResult<u64> {
        self.comments.mutate(|m| {
            let c = find_comment(m, article_id, comment_id)?;
            c.likes += 1;
            Ok(c.likes)
        })
    }

    pub fn like_reply(&self, article_id: &Id, comment_id: &Id, reply_id: &Id) -> RepoResult<u64> {
        self.comments.mutate(|m| {
            let c = find_comment(m, article_id, comment_id)?;
            let r = c
                .replies
                .iter_mut()
                .find(|r| r.id == *reply_id)
                .ok_or(RepoError::NotFound)?;
            r.likes += 1;
            Ok(r.likes)
        })
    }
}

fn find_comment<'a>(m: &'a mut CommentMap, article_id: &Id, comment_id: &Id) -> RepoResult<&'a mut Comment> {
    m.get_mut(&article_id.key())
        .and_then(|v| v.iter_mut().find(|c| c.id == *comment_id))
        .ok_or(RepoError::NotFound)
}
