//! Path-level filesystem projection over a record store.
//!
//! Implements the four filesystem operations — open, getattr, read,
//! readdir — purely in terms of key resolution plus backend lookups.
//! Stateless per call: every operation re-resolves and re-queries, so
//! concurrent calls never interact.  The inode-level FUSE adapter in
//! [`crate::fs`] routes every kernel callback through this type.

use certfs_core::{KeyResolver, PATH_SEPARATOR, RecordStore};

/// Sentinel file handle: opens allocate no per-handle state.
pub const SENTINEL_HANDLE: u64 = 0;

/// What a path resolves to, attribute-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Read-only directory, `r-xr-xr-x`.
    Directory,
    /// Read-only regular file, `r--r--r--`.  Size is never reported
    /// eagerly; reads run under direct I/O and return short at EOF.
    RegularFile,
}

/// Read-only projection of the backend key-space as a flat directory.
pub struct Projection<S> {
    store: S,
    resolver: KeyResolver,
}

impl<S: RecordStore> Projection<S> {
    pub fn new(store: S, resolver: KeyResolver) -> Self {
        Self { store, resolver }
    }

    /// Open succeeds iff any candidate key exists.  Returns the
    /// sentinel handle; `None` means no such entry.
    pub fn open(&self, path: &str) -> Option<u64> {
        for key in self.resolver.resolve(path) {
            if self.store.exists(&key) {
                return Some(SENTINEL_HANDLE);
            }
        }
        None
    }

    /// Classify `path`.  A trailing separator denotes a directory and
    /// is answered without touching the backend; anything else is a
    /// regular file iff a candidate key exists.
    pub fn getattr(&self, path: &str) -> Option<EntryKind> {
        if path.ends_with(PATH_SEPARATOR) {
            return Some(EntryKind::Directory);
        }
        for key in self.resolver.resolve(path) {
            if self.store.exists(&key) {
                return Some(EntryKind::RegularFile);
            }
        }
        None
    }

    /// Read up to `size` bytes at `offset` from the first candidate
    /// record with a non-empty value.
    ///
    /// Absent and empty candidates are skipped so an exact miss falls
    /// through to the wildcard record.  An offset at or past the end
    /// of the record, or no candidate yielding data at all, returns
    /// zero bytes — end-of-file, not an error.
    pub fn read(&self, path: &str, size: u32, offset: u64) -> Vec<u8> {
        for key in self.resolver.resolve(path) {
            let Some(data) = self.store.get(&key) else {
                continue;
            };
            let end = offset.saturating_add(u64::from(size)).min(data.len() as u64);
            if offset >= end {
                return Vec::new();
            }
            return data[offset as usize..end as usize].to_vec();
        }
        Vec::new()
    }

    /// Directory listing: the two pseudo-entries, then every backend
    /// key verbatim — exact and wildcard keys alike, unfiltered.  A
    /// backend enumeration failure surfaces as just `.` and `..`.
    pub fn readdir(&self) -> Vec<String> {
        let mut entries = vec![".".to_string(), "..".to_string()];
        entries.extend(self.store.list_all());
        entries
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    /// In-memory substitute backend.  Honors the [`RecordStore`]
    /// contract, including "empty value reads as absent".
    #[derive(Default)]
    struct MemoryStore {
        records: BTreeMap<String, Vec<u8>>,
    }

    impl MemoryStore {
        fn with(records: &[(&str, &[u8])]) -> Self {
            Self {
                records: records
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
            }
        }
    }

    impl RecordStore for MemoryStore {
        fn exists(&self, key: &str) -> bool {
            self.records.contains_key(key)
        }

        fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.records.get(key).filter(|v| !v.is_empty()).cloned()
        }

        fn list_all(&self) -> Vec<String> {
            self.records.keys().cloned().collect()
        }
    }

    fn projection(records: &[(&str, &[u8])]) -> Projection<MemoryStore> {
        Projection::new(MemoryStore::with(records), KeyResolver::new(true))
    }

    #[test]
    fn open_and_read_exact_record() {
        let p = projection(&[("example.com.crt", b"CERT-A")]);

        assert_eq!(p.open("/example.com.crt"), Some(SENTINEL_HANDLE));
        assert_eq!(p.read("/example.com.crt", 4, 0), b"CERT");
        assert_eq!(p.read("/example.com.crt", 10, 4), b"-A");
        assert_eq!(p.read("/example.com.crt", 10, 6), b"");
    }

    #[test]
    fn read_never_exceeds_record_bounds() {
        let p = projection(&[("example.com.crt", b"CERT-A")]);

        // offset <= len: max(0, min(size, len - offset)) bytes.
        assert_eq!(p.read("/example.com.crt", 100, 0).len(), 6);
        assert_eq!(p.read("/example.com.crt", 3, 3), b"T-A");
        // offset past end: zero bytes, no panic.
        assert_eq!(p.read("/example.com.crt", 10, 7), b"");
        assert_eq!(p.read("/example.com.crt", u32::MAX, u64::MAX), b"");
    }

    #[test]
    fn wildcard_fallback_serves_subdomain() {
        let p = projection(&[(".example.com.crt", b"WILDCARD")]);

        assert_eq!(p.open("/test.example.com.crt"), Some(SENTINEL_HANDLE));
        assert_eq!(p.getattr("/test.example.com.crt"), Some(EntryKind::RegularFile));
        assert_eq!(p.read("/test.example.com.crt", 64, 0), b"WILDCARD");
    }

    #[test]
    fn exact_record_shadows_wildcard() {
        let p = projection(&[
            ("test.example.com.crt", b"EXACT"),
            (".example.com.crt", b"WILDCARD"),
        ]);

        assert_eq!(p.read("/test.example.com.crt", 64, 0), b"EXACT");
        // Siblings without an exact record still get the wildcard.
        assert_eq!(p.read("/other.example.com.crt", 64, 0), b"WILDCARD");
    }

    #[test]
    fn empty_exact_record_falls_through_to_wildcard() {
        let p = projection(&[
            ("test.example.com.crt", b"" as &[u8]),
            (".example.com.crt", b"WILDCARD"),
        ]);

        assert_eq!(p.read("/test.example.com.crt", 64, 0), b"WILDCARD");
    }

    #[test]
    fn missing_record_is_no_such_entry() {
        let p = projection(&[("example.com.crt", b"CERT-A")]);

        assert_eq!(p.open("/nosuch.domain.tld.crt"), None);
        assert_eq!(p.getattr("/nosuch.domain.tld.crt"), None);
        assert_eq!(p.read("/nosuch.domain.tld.crt", 64, 0), b"");
    }

    #[test]
    fn trailing_separator_is_a_directory_without_backend_calls() {
        let p = projection(&[]);

        assert_eq!(p.getattr("/"), Some(EntryKind::Directory));
    }

    #[test]
    fn readdir_mirrors_backend_keyspace() {
        let p = projection(&[
            ("example.com.crt", b"A" as &[u8]),
            ("example.com.key", b"B"),
            (".wilddomain.com.crt", b"C"),
        ]);

        assert_eq!(
            p.readdir(),
            vec![
                ".",
                "..",
                ".wilddomain.com.crt",
                "example.com.crt",
                "example.com.key",
            ]
        );
    }

    #[test]
    fn readdir_on_empty_backend_keeps_pseudo_entries() {
        let p = projection(&[]);

        assert_eq!(p.readdir(), vec![".", ".."]);
    }

    #[test]
    fn strict_variant_skips_wildcard_fallback() {
        let p = Projection::new(
            MemoryStore::with(&[(".example.com.crt", b"WILDCARD")]),
            KeyResolver::new(false),
        );

        assert_eq!(p.open("/test.example.com.crt"), None);
        assert_eq!(p.open("/.example.com.crt"), Some(SENTINEL_HANDLE));
    }
}
