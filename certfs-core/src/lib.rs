//! Core types for certfs: storage-key resolution and the record store
//! seam.
//!
//! Records live in a flat key-value namespace.  A storage key is the
//! lowercased filename with no leading slash (`example.com.crt`); a
//! wildcard record is stored under the same name with the leftmost
//! label replaced by a leading dot (`.example.com.crt`) and matches
//! any subdomain that has no exact record of its own.

pub mod resolver;

pub use resolver::KeyResolver;

/// Default Redis backend address.
pub const DEFAULT_REDIS_ADDR: &str = "127.0.0.1:6379";

/// Default Redis database index holding certificate records.
pub const DEFAULT_REDIS_DB: u32 = 15;

/// Separator used by paths handed to the virtual filesystem.
pub const PATH_SEPARATOR: char = '/';

/// Read-only view of the key-value backend.
///
/// Absence and transport failure are indistinguishable by contract:
/// implementations coerce every error to `false` / `None` / empty
/// before it reaches a caller, so the filesystem layer never sees a
/// distinguishable error value.  The projection is written against
/// this trait so tests can substitute an in-memory store.
pub trait RecordStore: Send + Sync {
    /// Whether a record exists under `key`.
    fn exists(&self, key: &str) -> bool;

    /// Full record value.  `None` when the record is absent, empty,
    /// or the backend is unreachable.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Every key known to the backend, unfiltered.  Empty when the
    /// backend is unreachable.
    fn list_all(&self) -> Vec<String>;
}
