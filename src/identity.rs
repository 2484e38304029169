use std::sync::{Arc, PoisonError, RwLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{error, info};

use crate::models::{Session, SessionPointer, UserRecord};
use crate::repo::{RepoError, Snapshot};
use crate::storage::{load_json, save_json, KeyValueStore};

pub const USERS_KEY: &str = "users";
pub const CURRENT_USER_KEY: &str = "currentUser";

/// Reversible password encoding (base64). Not a hash: anyone with the
/// credential table can recover every password.
pub fn encode_password(password: &str) -> String {
    STANDARD.encode(password.as_bytes())
}

/// Registered users plus the single session of this process.
#[derive(Clone)]
pub struct IdentityStore {
    users: Snapshot<Vec<UserRecord>>,
    storage: Arc<dyn KeyValueStore>,
    session: Arc<RwLock<Session>>,
}

impl IdentityStore {
    /// Load the credential table and rehydrate the session from the
    /// persisted pointer. The pointer is trusted as-is.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let users: Vec<UserRecord> = load_json(storage.as_ref(), USERS_KEY).unwrap_or_default();
        let session = match load_json::<SessionPointer>(storage.as_ref(), CURRENT_USER_KEY) {
            Some(p) => {
                info!(username = %p.username, "restored session");
                Session { username: Some(p.username) }
            }
            None => Session::default(),
        };
        Self {
            users: Snapshot::new(storage.clone(), USERS_KEY, users),
            storage,
            session: Arc::new(RwLock::new(session)),
        }
    }

    /// Returns false when the username is already taken.
    pub fn register(&self, username: &str, password: &str) -> bool {
        let res = self.users.mutate(|users| {
            if users.iter().any(|u| u.username == username) {
                return Err(RepoError::Conflict);
            }
            users.push(UserRecord {
                username: username.to_string(),
                password_encoded: encode_password(password),
            });
            Ok(())
        });
        match res {
            Ok(()) => {
                info!(%username, "registered user");
                self.open_session(username);
                true
            }
            Err(_) => false,
        }
    }

    pub fn login(&self, username: &str, password: &str) -> bool {
        let encoded = encode_password(password);
        let found = self.users.read(|users| {
            users
                .iter()
                .any(|u| u.username == username && u.password_encoded == encoded)
        });
        if found {
            self.open_session(username);
        }
        found
    }

    pub fn logout(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Session::default();
        if let Err(e) = self.storage.remove(CURRENT_USER_KEY) {
            error!(error = %e, "failed to clear session pointer");
        }
    }

    pub fn session(&self) -> Session {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn current_user(&self) -> Option<String> {
        self.session().username
    }

    pub fn user_count(&self) -> usize {
        self.users.read(Vec::len)
    }

    fn open_session(&self, username: &str) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Session {
            username: Some(username.to_string()),
        };
        let pointer = SessionPointer { username: username.to_string() };
        if let Err(e) = save_json(self.storage.as_ref(), CURRENT_USER_KEY, &pointer) {
            error!(%username, error = %e, "failed to persist session pointer");
        }
    }
}
