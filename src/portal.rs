use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::articles::{ArticleStore, Bootstrap};
use crate::comments::CommentStore;
use crate::config::Settings;
use crate::engagement::{LikeLedger, ViewTracker};
use crate::error::{PortalError, PortalResult};
use crate::identity::IdentityStore;
use crate::models::*;
use crate::seed::{FileSeed, HttpSeed, SeedSource};
use crate::storage::{FsStore, KeyValueStore, MemoryStore};
use crate::views;

/// An article opened on its reading page.
#[derive(Debug, Clone)]
pub struct ArticleView {
    pub article: Article,
    pub comments: Vec<Comment>,
    pub liked: bool,
}

#[derive(Debug, Clone)]
pub struct HomeFeed {
    pub articles: Vec<Article>,
    pub author_rank: Vec<RankEntry>,
    pub article_rank: Vec<RankEntry>,
}

/// Entry point for presentation code. Owns one handle to each store and
/// enforces the session and authorship rules the stores leave to callers.
#[derive(Clone)]
pub struct Portal {
    identity: IdentityStore,
    articles: ArticleStore,
    comments: CommentStore,
    views: ViewTracker,
    likes: LikeLedger,
    seed: Arc<dyn SeedSource>,
    publish_delay: Duration,
    last_id: Arc<AtomicI64>,
}

impl Portal {
    /// `local` outlives the session (users, articles, comments, likes);
    /// `session` holds the viewed set.
    pub fn new(
        local: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        seed: Arc<dyn SeedSource>,
        publish_delay: Duration,
    ) -> Self {
        let portal = Self {
            identity: IdentityStore::open(local.clone()),
            articles: ArticleStore::new(local.clone()),
            comments: CommentStore::open(local.clone()),
            views: ViewTracker::new(session),
            likes: LikeLedger::new(local),
            seed,
            publish_delay,
            last_id: Arc::new(AtomicI64::new(0)),
        };
        portal.skip_stored_ids();
        portal
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let local: Arc<dyn KeyValueStore> = Arc::new(FsStore::new(&settings.data_dir));
        let seed: Arc<dyn SeedSource> = match &settings.seed_url {
            Some(url) => Arc::new(HttpSeed::new(url.clone())),
            None => Arc::new(FileSeed::new(settings.seed_path.clone())),
        };
        Self::new(local, Arc::new(MemoryStore::new()), seed, settings.publish_delay)
    }

    /// Load articles, falling back to the seed when nothing was persisted.
    pub async fn initialize(&self) -> Bootstrap {
        let boot = self.articles.initialize(self.seed.as_ref()).await;
        self.skip_stored_ids();
        boot
    }

    pub fn identity(&self) -> &IdentityStore { &self.identity }
    pub fn articles(&self) -> &ArticleStore { &self.articles }
    pub fn comments(&self) -> &CommentStore { &self.comments }

    // ---------------- Session ----------------

    pub fn register(&self, username: &str, password: &str) -> PortalResult<()> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(PortalError::Validation("username and password are required".into()));
        }
        if self.identity.register(username, password) {
            Ok(())
        } else {
            Err(PortalError::UsernameTaken)
        }
    }

    pub fn login(&self, username: &str, password: &str) -> PortalResult<()> {
        if self.identity.login(username.trim(), password) {
            Ok(())
        } else {
            Err(PortalError::InvalidCredentials)
        }
    }

    pub fn logout(&self) {
        self.identity.logout();
    }

    pub fn session(&self) -> Session {
        self.identity.session()
    }

    fn require_user(&self) -> PortalResult<String> {
        self.identity.current_user().ok_or(PortalError::Unauthenticated)
    }

    fn require_author(&self, id: &Id) -> PortalResult<(String, Article)> {
        let user = self.require_user()?;
        let article = self.articles.get(id).ok_or(PortalError::NotFound)?;
        if article.author != user {
            return Err(PortalError::Forbidden);
        }
        Ok((user, article))
    }

    // Stored records may carry ids at or past the current clock (seed data,
    // skew), so the counter starts above the newest one.
    fn skip_stored_ids(&self) {
        let newest = self
            .articles
            .max_numeric_id()
            .into_iter()
            .chain(self.comments.max_numeric_id())
            .max();
        if let Some(newest) = newest {
            self.last_id.fetch_max(newest, Ordering::SeqCst);
        }
    }

    // Epoch millis, bumped past every id issued or stored.
    fn fresh_id(&self) -> Id {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|v| v);
        Id::Num(now.max(prev + 1))
    }

    // ---------------- Articles ----------------

    /// Publish after the simulated submission latency.
    pub async fn publish(&self, draft: ArticleDraft) -> PortalResult<Article> {
        let author = self.require_user()?;
        require_text(&draft.title, "title is required")?;
        require_text(&draft.desc, "summary is required")?;
        require_text(&draft.content, "content is required")?;
        let tags = require_tags(draft.tags)?;

        if !self.publish_delay.is_zero() {
            tokio::time::sleep(self.publish_delay).await;
        }

        let article = Article {
            id: self.fresh_id(),
            title: draft.title.trim().to_string(),
            desc: draft.desc.trim().to_string(),
            content: Some(draft.content),
            author,
            publish_time: Utc::now().format("%Y-%m-%d").to_string(),
            image: draft.image.filter(|i| !i.is_empty()),
            views: 0,
            tags,
            is_public: draft.is_public,
            likes: Some(0),
        };
        self.articles.add(article.clone())?;
        info!(id = %article.id, author = %article.author, "published article");
        Ok(article)
    }

    pub fn edit(&self, id: &Id, changes: ArticleChanges) -> PortalResult<Article> {
        let (_, current) = self.require_author(id)?;
        require_text(&changes.title, "title is required")?;
        require_text(&changes.desc, "summary is required")?;
        let tags = require_tags(changes.tags)?;

        let updated = Article {
            title: changes.title.trim().to_string(),
            desc: changes.desc.trim().to_string(),
            tags,
            is_public: changes.is_public,
            image: changes.image.or(current.image.clone()),
            ..current
        };
        self.articles.update(updated.clone())?;
        info!(id = %id, "edited article");
        Ok(updated)
    }

    pub fn delete(&self, id: &Id) -> PortalResult<()> {
        self.require_author(id)?;
        self.articles.delete(id)?;
        info!(id = %id, "deleted article");
        Ok(())
    }

    /// Open the reading page. Counts a view the first time a logged-in
    /// viewer opens the article in this session.
    pub fn open_article(&self, id: &Id) -> PortalResult<ArticleView> {
        let viewer = self.identity.current_user();
        let mut article = self.articles.get(id).ok_or(PortalError::NotFound)?;
        if !views::is_visible_to(&article, viewer.as_deref()) {
            return Err(PortalError::Forbidden);
        }
        if viewer.is_some() && self.views.first_visit(id) {
            article.views += 1;
            self.articles.update(article.clone())?;
            debug!(id = %id, views = article.views, "counted view");
        }
        let liked = viewer.as_deref().map_or(false, |u| self.likes.is_liked(u, id));
        Ok(ArticleView {
            comments: self.comments.by_article(id),
            article,
            liked,
        })
    }

    /// Like or un-like; returns the new state.
    pub fn toggle_like(&self, id: &Id) -> PortalResult<bool> {
        let user = self.require_user()?;
        let mut article = self.articles.get(id).ok_or(PortalError::NotFound)?;
        if !views::is_visible_to(&article, Some(&user)) {
            return Err(PortalError::Forbidden);
        }
        let liked = self.likes.toggle(&user, id);
        let likes = article.likes();
        article.likes = Some(if liked { likes + 1 } else { likes.saturating_sub(1) });
        self.articles.update(article)?;
        Ok(liked)
    }

    pub fn is_liked(&self, id: &Id) -> bool {
        self.identity
            .current_user()
            .map_or(false, |u| self.likes.is_liked(&u, id))
    }

    pub fn home(&self, query: &ListQuery) -> HomeFeed {
        let viewer = self.identity.current_user();
        let all = self.articles.all();
        let ranked = views::visible(&all, viewer.as_deref());
        HomeFeed {
            articles: views::list(&all, viewer.as_deref(), query),
            author_rank: views::author_leaderboard(&ranked),
            article_rank: views::article_leaderboard(&ranked),
        }
    }

    /// Everything the session user wrote, private drafts included.
    pub fn my_articles(&self) -> PortalResult<Vec<Article>> {
        let user = self.require_user()?;
        Ok(self.articles.all().into_iter().filter(|a| a.author == user).collect())
    }

    pub fn author_articles(&self, author: &str) -> Vec<Article> {
        self.articles
            .all()
            .into_iter()
            .filter(|a| a.author == author && a.is_public)
            .collect()
    }

    // ---------------- Comments ----------------

    pub fn comment(&self, article_id: &Id, content: &str) -> PortalResult<Comment> {
        let author = self.require_user()?;
        require_text(content, "comment cannot be empty")?;
        self.readable(article_id, &author)?;
        let comment = Comment {
            id: self.fresh_id(),
            article_id: article_id.clone(),
            content: content.trim().to_string(),
            author,
            publish_time: now_stamp(),
            likes: 0,
            replies: Vec::new(),
        };
        self.comments.add_comment(article_id, comment.clone())?;
        Ok(comment)
    }

    pub fn reply(
        &self,
        article_id: &Id,
        comment_id: &Id,
        content: &str,
        reply_to: Option<&str>,
    ) -> PortalResult<Reply> {
        let author = self.require_user()?;
        require_text(content, "reply cannot be empty")?;
        self.readable(article_id, &author)?;
        let reply = Reply {
            id: self.fresh_id(),
            comment_id: comment_id.clone(),
            content: content.trim().to_string(),
            author,
            publish_time: now_stamp(),
            likes: 0,
            reply_to: reply_to.map(str::to_string),
        };
        self.comments.add_reply(article_id, comment_id, reply.clone())?;
        Ok(reply)
    }

    pub fn like_comment(&self, article_id: &Id, comment_id: &Id) -> PortalResult<u64> {
        self.require_user()?;
        Ok(self.comments.like_comment(article_id, comment_id)?)
    }

    pub fn like_reply(&self, article_id: &Id, comment_id: &Id, reply_id: &Id) -> PortalResult<u64> {
        self.require_user()?;
        Ok(self.comments.like_reply(article_id, comment_id, reply_id)?)
    }

    fn readable(&self, article_id: &Id, user: &str) -> PortalResult<()> {
        let article = self.articles.get(article_id).ok_or(PortalError::NotFound)?;
        if !views::is_visible_to(&article, Some(user)) {
            return Err(PortalError::Forbidden);
        }
        Ok(())
    }
}

fn require_text(s: &str, msg: &str) -> PortalResult<()> {
    if s.trim().is_empty() {
        return Err(PortalError::Validation(msg.to_string()));
    }
    Ok(())
}

fn require_tags(tags: Vec<String>) -> PortalResult<Vec<String>> {
    let tags = dedup_tags(
        tags.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    );
    if tags.is_empty() {
        return Err(PortalError::Validation("choose at least one tag".into()));
    }
    Ok(tags)
}

fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
