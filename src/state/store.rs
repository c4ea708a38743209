use std::collections::BTreeSet;
use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info};

use super::error::{Result, StateError};
use super::keys::{
    MAX_KEY_LEN, MEMBER_PREFIX, SYNC_CURSOR_KEY, decode_member_key, encode_member_key,
};

/// Fjall-backed store for the sync cursor and the membership list
#[derive(Clone)]
pub struct StateStore {
    keyspace: Keyspace,
    state: PartitionHandle,
}

impl StateStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening state store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let state = keyspace.open_partition("state", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, state })
    }

    /// Cursor to resume the event stream from, if a sync has completed before
    pub fn sync_cursor(&self) -> Result<Option<String>> {
        match self.state.get(SYNC_CURSOR_KEY)? {
            Some(value) => {
                let cursor = String::from_utf8(value.to_vec())
                    .map_err(|_| StateError::InvalidKey("sync cursor is not UTF-8".to_string()))?;
                Ok(Some(cursor))
            }
            None => Ok(None),
        }
    }

    pub fn set_sync_cursor(&self, cursor: &str) -> Result<()> {
        self.state.insert(SYNC_CURSOR_KEY, cursor.as_bytes())?;
        debug!(cursor, "Stored sync cursor");
        Ok(())
    }

    pub fn add_member(&self, user_id: &str) -> Result<()> {
        self.state.insert(member_key(user_id)?, "1".as_bytes())?;
        debug!(user_id, "Member added");
        Ok(())
    }

    /// Returns true if the member was present
    pub fn remove_member(&self, user_id: &str) -> Result<bool> {
        let key = member_key(user_id)?;
        let present = self.state.contains_key(&key)?;
        if present {
            self.state.remove(key)?;
            info!(user_id, "Member removed");
        }
        Ok(present)
    }

    pub fn members(&self) -> Result<BTreeSet<String>> {
        let mut members = BTreeSet::new();
        for item in self.state.prefix(MEMBER_PREFIX) {
            let (key, _) = item?;
            let user_id = decode_member_key(&key)
                .ok_or_else(|| StateError::InvalidKey(String::from_utf8_lossy(&key).into_owned()))?;
            members.insert(user_id);
        }
        Ok(members)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

/// Member key for `user_id`, rejecting ids that cannot be stored
fn member_key(user_id: &str) -> Result<Vec<u8>> {
    if user_id.is_empty() {
        return Err(StateError::InvalidKey("empty user id".to_string()));
    }
    let key = encode_member_key(user_id);
    if key.len() > MAX_KEY_LEN {
        return Err(StateError::InvalidKey(format!(
            "member key is {} bytes, limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }
    Ok(key)
}
