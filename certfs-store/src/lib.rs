//! Redis record store client.
//!
//! Thin adapter over `EXISTS` / `GET` / `KEYS *` with a bounded
//! connection pool.  Every transport failure is coerced to absence
//! here — `exists` reports `false`, `get` reports `None`, `list_all`
//! reports empty — so the filesystem layer above never has to
//! distinguish a missing record from an unreachable backend.  The
//! coercion lives in exactly one place (the [`RecordStore`] impl) and
//! is logged at debug level, keeping it auditable.

use certfs_core::RecordStore;
use r2d2::{Pool, PooledConnection};
use tracing::debug;

/// Idle connections kept warm in the pool.
const POOL_MIN_IDLE: u32 = 2;

/// Maximum concurrently checked-out connections.
const POOL_MAX_ACTIVE: u32 = 20;

/// Internal failure modes of a single store call.
///
/// Never crosses the crate boundary; public methods coerce it to an
/// absence value before returning.
#[derive(Debug, thiserror::Error)]
enum StoreError {
    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Redis-backed [`RecordStore`].
///
/// Connections are checked out per call and returned immediately —
/// never held across filesystem calls.  No retries, no timeouts: a
/// hung backend call hangs the one filesystem call that issued it.
pub struct RedisStore {
    pool: Pool<redis::Client>,
}

impl RedisStore {
    /// Build a store talking to `addr`, selecting database `db`.
    ///
    /// Connections are dialed lazily, so an unreachable backend does
    /// not fail construction — it degrades to absence at call time.
    /// Only a malformed address errors here.
    pub fn connect(addr: &str, db: u32) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url(addr, db))?;
        let pool = Pool::builder()
            .min_idle(Some(POOL_MIN_IDLE))
            .max_size(POOL_MAX_ACTIVE)
            .build_unchecked(client);
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<redis::Client>, StoreError> {
        Ok(self.pool.get()?)
    }

    fn try_exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let n: i64 = redis::cmd("EXISTS").arg(key).query(&mut *conn)?;
        Ok(n > 0)
    }

    fn try_get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn()?;
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query(&mut *conn)?;
        Ok(value)
    }

    fn try_list_all(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn()?;
        let keys: Vec<String> = redis::cmd("KEYS").arg("*").query(&mut *conn)?;
        Ok(keys)
    }
}

impl RecordStore for RedisStore {
    fn exists(&self, key: &str) -> bool {
        match self.try_exists(key) {
            Ok(present) => present,
            Err(e) => {
                debug!(key, "EXISTS failed, treating as absent: {e}");
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.try_get(key) {
            // Zero-length values are treated as absent so a read can
            // fall through to the wildcard candidate.
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                debug!(key, "GET failed, treating as absent: {e}");
                None
            }
        }
    }

    fn list_all(&self) -> Vec<String> {
        match self.try_list_all() {
            Ok(keys) => keys,
            Err(e) => {
                debug!("KEYS failed, treating as empty: {e}");
                Vec::new()
            }
        }
    }
}

/// Redis connection URL carrying the database index.
fn redis_url(addr: &str, db: u32) -> String {
    format!("redis://{addr}/{db}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_database_index() {
        assert_eq!(redis_url("127.0.0.1:6379", 15), "redis://127.0.0.1:6379/15");
        assert_eq!(redis_url("cert-store:6380", 0), "redis://cert-store:6380/0");
    }
}
