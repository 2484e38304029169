use std::sync::Arc;

use tracing::error;

use crate::models::Id;
use crate::storage::{load_json, save_json, KeyValueStore};

pub const VIEWED_KEY: &str = "viewed_articles";

pub fn liked_key(username: &str) -> String {
    format!("liked_by_{username}")
}

/// Articles already counted as viewed in this session. Backed by
/// session-scoped storage so the set dies with the session.
#[derive(Clone)]
pub struct ViewTracker {
    storage: Arc<dyn KeyValueStore>,
}

impl ViewTracker {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn has_viewed(&self, id: &Id) -> bool {
        self.viewed().contains(id)
    }

    /// Record a view. Returns true only the first time `id` is seen.
    pub fn first_visit(&self, id: &Id) -> bool {
        let mut viewed = self.viewed();
        if viewed.contains(id) {
            return false;
        }
        viewed.push(id.clone());
        if let Err(e) = save_json(self.storage.as_ref(), VIEWED_KEY, &viewed) {
            error!(error = %e, "failed to persist viewed set");
        }
        true
    }

    fn viewed(&self) -> Vec<Id> {
        load_json(self.storage.as_ref(), VIEWED_KEY).unwrap_or_default()
    }
}

/// Per-user set of liked articles (`liked_by_<username>`).
#[derive(Clone)]
pub struct LikeLedger {
    storage: Arc<dyn KeyValueStore>,
}

impl LikeLedger {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn is_liked(&self, username: &str, id: &Id) -> bool {
        self.liked(username).contains(id)
    }

    /// Flip the like state and return the new one.
    pub fn toggle(&self, username: &str, id: &Id) -> bool {
        let mut liked = self.liked(username);
        let now_liked = match liked.iter().position(|x| x == id) {
            Some(pos) => {
                liked.remove(pos);
                false
            }
            None => {
                liked.push(id.clone());
                true
            }
        };
        if let Err(e) = save_json(self.storage.as_ref(), &liked_key(username), &liked) {
            error!(%username, error = %e, "failed to persist liked set");
        }
        now_liked
    }

    fn liked(&self, username: &str) -> Vec<Id> {
        load_json(self.storage.as_ref(), &liked_key(username)).unwrap_or_default()
    }
}
