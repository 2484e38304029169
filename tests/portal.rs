use std::sync::Arc;
use std::time::{Duration, Instant};

use inkwell::models::{ArticleChanges, ArticleDraft, Id, ListQuery, SortMode};
use inkwell::seed::{SeedError, SeedSource};
use inkwell::articles::Bootstrap;
use inkwell::storage::{FsStore, KeyValueStore, MemoryStore};
use inkwell::{Portal, PortalError};
use serde_json::{json, Value};

struct EmptySeed;

#[async_trait::async_trait]
impl SeedSource for EmptySeed {
    async fn fetch(&self) -> Result<Vec<Value>, SeedError> { Ok(vec![]) }
    fn describe(&self) -> String { "empty".into() }
}

struct FixedSeed(Vec<Value>);

#[async_trait::async_trait]
impl SeedSource for FixedSeed {
    async fn fetch(&self) -> Result<Vec<Value>, SeedError> { Ok(self.0.clone()) }
    fn describe(&self) -> String { "fixed".into() }
}

fn portal_with(local: Arc<dyn KeyValueStore>) -> Portal {
    Portal::new(local, Arc::new(MemoryStore::new()), Arc::new(EmptySeed), Duration::ZERO)
}

async fn portal() -> Portal {
    let p = portal_with(Arc::new(MemoryStore::new()));
    p.initialize().await;
    p
}

fn draft(title: &str, public: bool) -> ArticleDraft {
    ArticleDraft {
        title: title.into(),
        desc: format!("{title} summary"),
        content: "body".into(),
        tags: vec!["Rust".into()],
        is_public: public,
        image: None,
    }
}

#[tokio::test]
async fn anonymous_users_cannot_write() {
    let p = portal().await;
    assert_eq!(p.publish(draft("x", true)).await.unwrap_err(), PortalError::Unauthenticated);
    assert_eq!(p.comment(&Id::Num(1), "hi").unwrap_err(), PortalError::Unauthenticated);
    assert_eq!(p.toggle_like(&Id::Num(1)).unwrap_err(), PortalError::Unauthenticated);
    assert_eq!(p.my_articles().unwrap_err(), PortalError::Unauthenticated);
}

#[tokio::test]
async fn register_and_login_errors() {
    let p = portal().await;
    p.register("alice", "pw1").unwrap();
    assert_eq!(p.register("alice", "pw2"), Err(PortalError::UsernameTaken));
    assert!(matches!(p.register("  ", "pw"), Err(PortalError::Validation(_))));
    p.logout();
    assert_eq!(p.login("alice", "pw2"), Err(PortalError::InvalidCredentials));
    p.login("alice", "pw1").unwrap();
    assert_eq!(p.session().username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn publish_fills_in_author_and_defaults() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let a = p.publish(draft("First", true)).await.unwrap();
    let b = p.publish(draft("Second", true)).await.unwrap();

    assert_eq!(a.author, "alice");
    assert_eq!(a.views, 0);
    assert_eq!(a.likes, Some(0));
    assert_eq!(a.publish_time.len(), "2024-01-01".len());
    assert_ne!(a.id, b.id);
    assert_eq!(p.articles().all()[0].id, b.id);
    assert_eq!(p.articles().get(&a.id), Some(a));
}

#[tokio::test]
async fn publish_validates_required_fields() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let mut d = draft("t", true);
    d.tags = vec![" ".into()];
    assert_eq!(
        p.publish(d).await.unwrap_err(),
        PortalError::Validation("choose at least one tag".into())
    );
    let mut d = draft("t", true);
    d.content.clear();
    assert!(matches!(p.publish(d).await, Err(PortalError::Validation(_))));
    assert!(p.articles().is_empty());
}

#[tokio::test]
async fn publish_waits_for_simulated_latency() {
    let p = Portal::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(EmptySeed),
        Duration::from_millis(30),
    );
    p.register("alice", "pw").unwrap();
    let start = Instant::now();
    p.publish(draft("slow", true)).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn publishing_before_initialize_keeps_stored_articles() {
    let dir = tempfile::tempdir().unwrap();
    {
        let p = portal_with(Arc::new(FsStore::new(dir.path())));
        p.initialize().await;
        p.register("alice", "pw").unwrap();
        for title in ["a", "b", "c"] {
            p.publish(draft(title, true)).await.unwrap();
        }
    }
    let p = portal_with(Arc::new(FsStore::new(dir.path())));
    // session pointer was rehydrated, so alice can publish straight away
    p.publish(draft("d", true)).await.unwrap();
    assert_eq!(p.initialize().await, Bootstrap::Restored(4));
    assert_eq!(p.articles().len(), 4);
}

#[tokio::test]
async fn fresh_ids_skip_past_stored_future_ids() {
    let future = chrono::Utc::now().timestamp_millis() + 1_000_000_000;
    let seed = FixedSeed(vec![json!({
        "id": future,
        "title": "From the future",
        "desc": "d",
        "author": "bob",
        "publishTime": "2030-01-01"
    })]);
    let p = Portal::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(seed),
        Duration::ZERO,
    );
    assert_eq!(p.initialize().await, Bootstrap::Seeded(1));
    p.register("alice", "pw").unwrap();

    let a = p.publish(draft("now", true)).await.unwrap();
    assert!(a.id.as_num().unwrap() > future);
    let c = p.comment(&a.id, "first").unwrap();
    assert!(c.id.as_num().unwrap() > a.id.as_num().unwrap());
    assert_eq!(p.articles().len(), 2);
}

#[tokio::test]
async fn views_count_once_per_session() {
    let local: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let p = portal_with(local.clone());
    p.register("alice", "pw").unwrap();
    let a = p.publish(draft("x", true)).await.unwrap();

    assert_eq!(p.open_article(&a.id).unwrap().article.views, 1);
    assert_eq!(p.open_article(&a.id).unwrap().article.views, 1);
    assert_eq!(p.articles().get(&a.id).unwrap().views, 1);

    // a new session over the same local storage counts again
    let next = portal_with(local);
    next.initialize().await;
    assert_eq!(next.open_article(&a.id).unwrap().article.views, 2);
}

#[tokio::test]
async fn anonymous_reads_do_not_count() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let a = p.publish(draft("x", true)).await.unwrap();
    p.logout();
    assert_eq!(p.open_article(&a.id).unwrap().article.views, 0);
}

#[tokio::test]
async fn private_articles_only_for_their_author() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let secret = p.publish(draft("secret", false)).await.unwrap();
    let open = p.publish(draft("open", true)).await.unwrap();

    let listed = |p: &Portal| -> Vec<Id> {
        p.home(&ListQuery::default()).articles.into_iter().map(|a| a.id).collect()
    };
    assert_eq!(listed(&p).len(), 2);
    assert!(p.open_article(&secret.id).is_ok());
    assert_eq!(p.my_articles().unwrap().len(), 2);

    p.register("bob", "pw").unwrap();
    assert_eq!(listed(&p), vec![open.id.clone()]);
    assert_eq!(p.open_article(&secret.id).unwrap_err(), PortalError::Forbidden);
    assert_eq!(p.author_articles("alice").len(), 1);
    assert!(p.home(&ListQuery::default()).article_rank.iter().all(|r| r.id != Some(secret.id.clone())));

    // searching bypasses the listing filter
    let search = ListQuery { keyword: "secret".into(), ..Default::default() };
    assert_eq!(p.home(&search).articles.len(), 1);
}

#[tokio::test]
async fn only_authors_edit_and_delete() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let a = p.publish(draft("mine", true)).await.unwrap();

    p.register("bob", "pw").unwrap();
    let changes = ArticleChanges {
        title: "hijacked".into(),
        desc: "d".into(),
        tags: vec!["Rust".into()],
        is_public: true,
        image: None,
    };
    assert_eq!(p.edit(&a.id, changes.clone()).unwrap_err(), PortalError::Forbidden);
    assert_eq!(p.delete(&a.id).unwrap_err(), PortalError::Forbidden);
    assert_eq!(p.articles().get(&a.id).unwrap().title, "mine");

    p.login("alice", "pw").unwrap();
    let edited = p.edit(&a.id, ArticleChanges { title: "renamed".into(), ..changes }).unwrap();
    assert_eq!(edited.title, "renamed");
    assert_eq!(edited.author, "alice");
    assert_eq!(edited.content.as_deref(), Some("body"));
    p.delete(&a.id).unwrap();
    assert_eq!(p.delete(&a.id).unwrap_err(), PortalError::NotFound);
}

#[tokio::test]
async fn like_toggles_per_user() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let a = p.publish(draft("x", true)).await.unwrap();

    assert!(p.toggle_like(&a.id).unwrap());
    assert!(p.is_liked(&a.id));
    assert_eq!(p.articles().get(&a.id).unwrap().likes, Some(1));

    p.register("bob", "pw").unwrap();
    assert!(!p.is_liked(&a.id));
    assert!(p.toggle_like(&a.id).unwrap());
    assert_eq!(p.articles().get(&a.id).unwrap().likes, Some(2));
    assert!(!p.toggle_like(&a.id).unwrap());
    assert_eq!(p.articles().get(&a.id).unwrap().likes, Some(1));
}

#[tokio::test]
async fn comment_reply_and_likes_through_portal() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let a = p.publish(draft("x", true)).await.unwrap();

    let c = p.comment(&a.id, "nice post").unwrap();
    p.register("bob", "pw").unwrap();
    let r = p.reply(&a.id, &c.id, "agreed", Some("alice")).unwrap();
    assert_eq!(p.like_comment(&a.id, &c.id), Ok(1));
    assert_eq!(p.like_reply(&a.id, &c.id, &r.id), Ok(1));
    assert_eq!(p.like_comment(&a.id, &Id::Num(1)), Err(PortalError::NotFound));
    assert!(matches!(p.comment(&a.id, "   "), Err(PortalError::Validation(_))));

    let view = p.open_article(&a.id).unwrap();
    assert_eq!(view.comments.len(), 1);
    assert_eq!(view.comments[0].replies[0].reply_to.as_deref(), Some("alice"));
    assert_eq!(view.comments[0].replies[0].author, "bob");
}

#[tokio::test]
async fn deleting_an_article_keeps_its_comments() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let a = p.publish(draft("x", true)).await.unwrap();
    p.comment(&a.id, "first").unwrap();
    p.delete(&a.id).unwrap();
    assert_eq!(p.comments().count(&a.id), 1);
}

#[tokio::test]
async fn home_sorts_by_mode() {
    let p = portal().await;
    p.register("alice", "pw").unwrap();
    let old = p.publish(draft("old", true)).await.unwrap();
    let new = p.publish(draft("new", true)).await.unwrap();
    p.open_article(&old.id).unwrap();

    let hot = p.home(&ListQuery { sort: SortMode::Hot, ..Default::default() });
    assert_eq!(hot.articles[0].id, old.id);
    assert_eq!(hot.author_rank[0].score, 1);
    // same publish date: the stable sort keeps store order (newest first)
    let latest = p.home(&ListQuery { sort: SortMode::New, ..Default::default() });
    assert_eq!(latest.articles[0].id, new.id);
}
