use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::models::{normalize_article, Article, Id};
use crate::repo::{RepoError, RepoResult, Snapshot};
use crate::seed::SeedSource;
use crate::storage::{load_json, save_json, KeyValueStore};

pub const ARTICLES_KEY: &str = "articles";

/// How the collection was obtained by [`ArticleStore::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// Loaded from the persisted `articles` key.
    Restored(usize),
    /// Loaded from the seed document and persisted.
    Seeded(usize),
    /// Seed unavailable; the store starts empty.
    Empty,
}

/// Apply defaults once, skipping records without a usable id and records
/// whose id was already seen.
pub fn normalize_all(raw: &[Value]) -> Vec<Article> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for (index, record) in raw.iter().enumerate() {
        let Some(article) = normalize_article(record) else {
            warn!(index, "article record without a usable id; skipping");
            continue;
        };
        if !seen.insert(article.id.clone()) {
            warn!(id = %article.id, "duplicate article id in dataset; keeping the first");
            continue;
        }
        out.push(article);
    }
    out
}

/// The article collection, most-recent-first.
#[derive(Clone)]
pub struct ArticleStore {
    articles: Snapshot<Vec<Article>>,
    // whether `articles` held a usable snapshot when the store was opened
    restored: bool,
    boot: Arc<OnceCell<Bootstrap>>,
}

impl ArticleStore {
    /// Open the store over `storage`, loading any persisted collection right
    /// away so writes made before [`ArticleStore::initialize`] land on top of
    /// it. The seed is only consulted by `initialize`.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let persisted = load_json::<Vec<Value>>(storage.as_ref(), ARTICLES_KEY);
        let restored = persisted.is_some();
        let initial = match persisted {
            Some(raw) => {
                let normalized = normalize_all(&raw);
                if serde_json::to_value(&normalized).ok() != Some(Value::Array(raw)) {
                    // rewrite so repaired defaults are persisted too
                    info!(count = normalized.len(), "repaired persisted articles");
                    if let Err(e) = save_json(storage.as_ref(), ARTICLES_KEY, &normalized) {
                        error!(error = %e, "failed to persist repaired articles");
                    }
                }
                normalized
            }
            None => Vec::new(),
        };
        let articles = Snapshot::new(storage, ARTICLES_KEY, initial);
        Self {
            articles,
            restored,
            boot: Arc::new(OnceCell::new()),
        }
    }

    /// Finish loading: keep the persisted collection, or fall back to the
    /// seed. Runs once per store; later calls return the first outcome.
    pub async fn initialize(&self, seed: &dyn SeedSource) -> Bootstrap {
        *self.boot.get_or_init(|| self.bootstrap(seed)).await
    }

    async fn bootstrap(&self, seed: &dyn SeedSource) -> Bootstrap {
        if self.restored {
            let n = self.len();
            info!(count = n, "restored articles from storage");
            return Bootstrap::Restored(n);
        }
        match seed.fetch().await {
            Ok(raw) => {
                let seeded = normalize_all(&raw);
                let n = seeded.len();
                // articles added before the seed arrived stay in front
                let merged = self.articles.mutate(|v| {
                    for article in seeded {
                        if !v.iter().any(|a| a.id == article.id) {
                            v.push(article);
                        }
                    }
                    Ok(v.len())
                });
                info!(count = n, total = merged.unwrap_or(n), source = %seed.describe(), "seeded articles");
                Bootstrap::Seeded(n)
            }
            Err(e) => {
                error!(source = %seed.describe(), error = %e, "failed to load seed articles; starting empty");
                Bootstrap::Empty
            }
        }
    }

    pub fn all(&self) -> Vec<Article> {
        self.articles.read(|v| v.clone())
    }

    pub fn get(&self, id: &Id) -> Option<Article> {
        self.articles.read(|v| v.iter().find(|a| a.id == *id).cloned())
    }

    /// Lookup by the textual id form, as it arrives from a route.
    pub fn find_by_key(&self, key: &str) -> Option<Article> {
        self.articles.read(|v| v.iter().find(|a| a.id.key() == key).cloned())
    }

    pub fn max_numeric_id(&self) -> Option<i64> {
        self.articles.read(|v| v.iter().filter_map(|a| a.id.as_num()).max())
    }

    pub fn len(&self) -> usize {
        self.articles.read(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prepend a new article. Ids must be unique.
    pub fn add(&self, article: Article) -> RepoResult<()> {
        self.articles.mutate(|v| {
            if v.iter().any(|a| a.id == article.id) {
                return Err(RepoError::Conflict);
            }
            v.insert(0, article);
            Ok(())
        })
    }

    /// Replace the record with the same id.
    pub fn update(&self, article: Article) -> RepoResult<()> {
        self.articles.mutate(|v| {
            let slot = v
                .iter_mut()
                .find(|a| a.id == article.id)
                .ok_or(RepoError::NotFound)?;
            *slot = article;
            Ok(())
        })
    }

    /// Remove by id. Authorship is the caller's concern.
    pub fn delete(&self, id: &Id) -> RepoResult<Article> {
        self.articles.mutate(|v| {
            let pos = v.iter().position(|a| a.id == *id).ok_or(RepoError::NotFound)?;
            Ok(v.remove(pos))
        })
    }
}
