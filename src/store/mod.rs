pub mod sqlite;

use crate::app::Result;

pub use sqlite::SqliteStore;

/// Device-local persistent key/value storage.
///
/// Every operation is atomic on its own; callers never need to lock
/// across several calls.
pub trait Store {
    // Payload cache
    fn get_cache(&self, key: &str) -> Result<Option<String>>;
    fn set_cache(&self, key: &str, payload: &str) -> Result<()>;
    fn clear_cache(&self, key: &str) -> Result<()>;
    fn clear_all_cache(&self) -> Result<usize>;
    /// Drop every payload and count whose key starts with `prefix`.
    fn clear_prefix(&self, prefix: &str) -> Result<usize>;

    // Last-count markers
    fn get_last_count(&self, key: &str) -> Result<Option<u64>>;
    fn set_last_count(&self, key: &str, count: u64) -> Result<()>;
    fn clear_last_count(&self, key: &str) -> Result<()>;

    // Auth token
    fn get_token(&self) -> Result<Option<String>>;
    fn set_token(&self, token: &str) -> Result<()>;
    fn clear_token(&self) -> Result<()>;
}

/// Store whose targeted deletes fail, for exercising invalidation errors.
/// Reads, writes and `clear_all_cache` go through to SQLite.
#[cfg(test)]
pub struct FailingClears(pub SqliteStore);

#[cfg(test)]
impl FailingClears {
    fn refuse<T>() -> Result<T> {
        Err(crate::app::MurmurError::Other("database is locked".into()))
    }
}

#[cfg(test)]
impl Store for FailingClears {
    fn get_cache(&self, key: &str) -> Result<Option<String>> {
        self.0.get_cache(key)
    }
    fn set_cache(&self, key: &str, payload: &str) -> Result<()> {
        self.0.set_cache(key, payload)
    }
    fn clear_cache(&self, _key: &str) -> Result<()> {
        Self::refuse()
    }
    fn clear_all_cache(&self) -> Result<usize> {
        self.0.clear_all_cache()
    }
    fn clear_prefix(&self, _prefix: &str) -> Result<usize> {
        Self::refuse()
    }
    fn get_last_count(&self, key: &str) -> Result<Option<u64>> {
        self.0.get_last_count(key)
    }
    fn set_last_count(&self, key: &str, count: u64) -> Result<()> {
        self.0.set_last_count(key, count)
    }
    fn clear_last_count(&self, _key: &str) -> Result<()> {
        Self::refuse()
    }
    fn get_token(&self) -> Result<Option<String>> {
        self.0.get_token()
    }
    fn set_token(&self, token: &str) -> Result<()> {
        self.0.set_token(token)
    }
    fn clear_token(&self) -> Result<()> {
        self.0.clear_token()
    }
}
