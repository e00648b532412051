use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{MurmurError, Result};
use crate::store::Store;

const TOKEN_KEY: &str = "auth_token";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| MurmurError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MurmurError::Other(format!("Store lock poisoned: {}", e)))
    }
}

impl Store for SqliteStore {
    fn get_cache(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let payload = conn
            .query_row(
                "SELECT payload FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn set_cache(&self, key: &str, payload: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cache_entries (key, payload, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET payload = ?2, updated_at = ?3",
            params![key, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear_cache(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear_all_cache(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let entries = tx.execute("DELETE FROM cache_entries", [])?;
        tx.execute("DELETE FROM cache_counts", [])?;
        tx.commit()?;
        Ok(entries)
    }

    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let entries = tx.execute(
            "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        tx.execute(
            "DELETE FROM cache_counts WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        tx.commit()?;
        Ok(entries)
    }

    fn get_last_count(&self, key: &str) -> Result<Option<u64>> {
        let conn = self.conn()?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM cache_counts WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c.max(0) as u64))
    }

    fn set_last_count(&self, key: &str, count: u64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cache_counts (key, count, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET count = ?2, updated_at = ?3",
            params![key, count as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear_last_count(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM cache_counts WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn get_token(&self) -> Result<Option<String>> {
        let conn = self.conn()?;
        let token = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![TOKEN_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token)
    }

    fn set_token(&self, token: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![TOKEN_KEY, token],
        )?;
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM settings WHERE key = ?1", params![TOKEN_KEY])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_cache() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_cache("liked_posts", "[]").unwrap();
        assert_eq!(store.get_cache("liked_posts").unwrap(), Some("[]".into()));
    }

    #[test]
    fn test_set_cache_overwrites() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_cache("liked_posts", "[1]").unwrap();
        store.set_cache("liked_posts", "[2]").unwrap();
        assert_eq!(store.get_cache("liked_posts").unwrap(), Some("[2]".into()));
    }

    #[test]
    fn test_clear_cache_leaves_count() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_cache("liked_posts", "[]").unwrap();
        store.set_last_count("liked_count", 4).unwrap();

        store.clear_cache("liked_posts").unwrap();

        assert!(store.get_cache("liked_posts").unwrap().is_none());
        assert_eq!(store.get_last_count("liked_count").unwrap(), Some(4));
    }

    #[test]
    fn test_last_count_roundtrip_and_clear() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_last_count("liked_count").unwrap().is_none());

        store.set_last_count("liked_count", 12).unwrap();
        assert_eq!(store.get_last_count("liked_count").unwrap(), Some(12));

        store.clear_last_count("liked_count").unwrap();
        assert!(store.get_last_count("liked_count").unwrap().is_none());
    }

    #[test]
    fn test_clear_all_cache() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_cache("a", "1").unwrap();
        store.set_cache("b", "2").unwrap();
        store.set_last_count("a", 1).unwrap();
        store.set_token("secret").unwrap();

        assert_eq!(store.clear_all_cache().unwrap(), 2);
        assert!(store.get_cache("a").unwrap().is_none());
        assert!(store.get_last_count("a").unwrap().is_none());
        // Token lives in settings, not the cache.
        assert_eq!(store.get_token().unwrap(), Some("secret".into()));
    }

    #[test]
    fn test_clear_prefix_is_literal() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_cache("liked_posts:l10", "a").unwrap();
        store.set_cache("liked_posts:l5", "b").unwrap();
        store.set_cache("likedXposts:l10", "c").unwrap();
        store.set_cache("user:u1:liked_posts:l10", "d").unwrap();
        store.set_last_count("liked_posts:l10:count", 3).unwrap();

        assert_eq!(store.clear_prefix("liked_posts:").unwrap(), 2);
        assert!(store.get_cache("liked_posts:l5").unwrap().is_none());
        assert!(store.get_last_count("liked_posts:l10:count").unwrap().is_none());
        assert!(store.get_cache("likedXposts:l10").unwrap().is_some());
        assert!(store.get_cache("user:u1:liked_posts:l10").unwrap().is_some());
    }

    #[test]
    fn test_token_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_token().unwrap().is_none());

        store.set_token("abc").unwrap();
        store.set_token("def").unwrap();
        assert_eq!(store.get_token().unwrap(), Some("def".into()));

        store.clear_token().unwrap();
        assert!(store.get_token().unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("murmur.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.set_cache("favorited_posts", "[\"x\"]").unwrap();
            store.set_last_count("favorited_count", 1).unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(
            store.get_cache("favorited_posts").unwrap(),
            Some("[\"x\"]".into())
        );
        assert_eq!(store.get_last_count("favorited_count").unwrap(), Some(1));
    }
}
