//! Persisted client storage.
//!
//! Sled plays the part of the browser's local storage: one tree, fixed string keys,
//! survives restarts. The session is written and cleared as a single batch so a
//! half-written session can never be observed.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, Db};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::models::{Session, UserId, UserProfile};

pub const TOKEN_KEY: &str = "token";
pub const USER_ID_KEY: &str = "userId";
pub const USER_KEY: &str = "user";

const SESSION_TREE: &str = "session";

#[derive(Clone)] // Clone shares the same sled handle
pub struct Storage {
    db: Db,
    session_tree: sled::Tree,
}

impl Storage {
    /// Open or create the store at the given path.
    pub fn open(path: &str) -> ClientResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store that disappears when the last handle is dropped.
    pub fn temporary() -> ClientResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> ClientResult<Self> {
        let session_tree = db.open_tree(SESSION_TREE)?;
        Ok(Self { db, session_tree })
    }

    /// Persist all three session keys atomically.
    pub fn write_session(&self, session: &Session) -> ClientResult<()> {
        let profile_json = serde_json::to_vec(&session.profile)?;

        let mut batch = Batch::default();
        batch.insert(TOKEN_KEY, session.token.as_bytes());
        match &session.user_id {
            Some(id) => batch.insert(USER_ID_KEY, id.to_string().as_bytes()),
            None => batch.remove(USER_ID_KEY),
        }
        batch.insert(USER_KEY, profile_json);

        self.session_tree.apply_batch(batch)?;
        self.db.flush()?;
        debug!("session persisted");
        Ok(())
    }

    /// Remove every session key. Removing absent keys is not an error.
    pub fn clear_session(&self) -> ClientResult<()> {
        let mut batch = Batch::default();
        batch.remove(TOKEN_KEY);
        batch.remove(USER_ID_KEY);
        batch.remove(USER_KEY);
        self.session_tree.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    /// Snapshot read of the persisted session.
    ///
    /// A missing or empty token means "not signed in" regardless of what the other
    /// keys hold. When `userId` is absent it is recovered from the stored profile.
    pub fn read_session(&self) -> ClientResult<Option<Session>> {
        let snapshot = self
            .session_tree
            .transaction(|tx| {
                Ok::<_, ConflictableTransactionError<()>>((
                    tx.get(TOKEN_KEY)?,
                    tx.get(USER_ID_KEY)?,
                    tx.get(USER_KEY)?,
                ))
            })
            .map_err(|err| match err {
                TransactionError::Storage(e) => ClientError::from(e),
                TransactionError::Abort(()) => ClientError::storage("session read aborted"),
            })?;
        let (token, user_id, user) = snapshot;

        let token = match token {
            Some(raw) => String::from_utf8_lossy(&raw).trim().to_string(),
            None => return Ok(None),
        };
        if token.is_empty() {
            return Ok(None);
        }

        let profile: UserProfile = match user {
            Some(raw) => serde_json::from_slice(&raw)?,
            None => UserProfile::default(),
        };
        let user_id = user_id
            .and_then(|raw| UserId::parse(&String::from_utf8_lossy(&raw)))
            .or_else(|| profile.user_id.clone());

        Ok(Some(Session {
            token,
            user_id,
            profile,
        }))
    }

    #[cfg(test)]
    pub(crate) fn get_raw(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self
            .session_tree
            .get(key)?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, value: &str) -> ClientResult<()> {
        self.session_tree.insert(key, value.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn sample_session() -> Session {
        let mut profile = UserProfile {
            user_id: Some(UserId::Number(5)),
            email: Some("ann@bank.test".into()),
            first_name: Some("Ann".into()),
            ..Default::default()
        };
        profile.roles.insert(Role::Admin);
        Session {
            token: "tok-5".into(),
            user_id: Some(UserId::Number(5)),
            profile,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let storage = Storage::temporary().expect("open storage");
        storage.write_session(&sample_session()).expect("write");
        let read = storage.read_session().expect("read").expect("session present");
        assert_eq!(read, sample_session());
    }

    #[test]
    fn clear_is_idempotent() {
        let storage = Storage::temporary().unwrap();
        storage.write_session(&sample_session()).unwrap();
        storage.clear_session().unwrap();
        storage.clear_session().unwrap();
        assert!(storage.read_session().unwrap().is_none());
        assert!(storage.get_raw(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn empty_token_reads_as_signed_out() {
        let storage = Storage::temporary().unwrap();
        storage.put_raw(TOKEN_KEY, "").unwrap();
        storage.put_raw(USER_ID_KEY, "9").unwrap();
        assert!(storage.read_session().unwrap().is_none());
    }

    #[test]
    fn user_id_recovered_from_profile() {
        let storage = Storage::temporary().unwrap();
        storage.put_raw(TOKEN_KEY, "tok").unwrap();
        storage
            .put_raw(USER_KEY, r#"{"userId":11,"email":"x@y.z"}"#)
            .unwrap();
        let session = storage.read_session().unwrap().unwrap();
        assert_eq!(session.user_id, Some(UserId::Number(11)));
    }

    #[test]
    fn session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        let path = path.to_str().unwrap();
        {
            let storage = Storage::open(path).unwrap();
            storage.write_session(&sample_session()).unwrap();
        }
        let reopened = Storage::open(path).unwrap();
        assert_eq!(reopened.read_session().unwrap(), Some(sample_session()));
    }
}
