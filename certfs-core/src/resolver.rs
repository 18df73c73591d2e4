//! Path-to-storage-key resolution.
//!
//! Maps a requested filesystem path to the ordered list of candidate
//! storage keys to try.  Order matters: the exact key comes first so a
//! per-subdomain record always shadows a wildcard record for the same
//! name — the conventional most-specific-match-wins rule for TLS
//! certificates.

use crate::PATH_SEPARATOR;

/// Resolves filesystem paths to candidate storage keys.
///
/// Two builds exist: the wildcard-aware resolver returns
/// `[exact, wildcard]`, the strict one returns `[exact]` only.
/// Resolution is a pure function of the path — no backend state, no
/// caching.
#[derive(Debug, Clone, Copy)]
pub struct KeyResolver {
    wildcard: bool,
}

impl KeyResolver {
    pub fn new(wildcard: bool) -> Self {
        Self { wildcard }
    }

    /// Candidate storage keys for `path`, most specific first.
    ///
    /// The exact key is the cleaned path, lowercased, with the leading
    /// slash stripped.  The wildcard key replaces everything up to and
    /// including the first dot with a single leading dot, so
    /// `test.example.com.crt` falls back to `.example.com.crt`.  A key
    /// with no dot yields a wildcard identical to the exact key; the
    /// duplicate is intentional and callers short-circuit on the first
    /// hit, so it costs at most one extra lookup.
    ///
    /// # Examples
    /// ```
    /// # use certfs_core::KeyResolver;
    /// let r = KeyResolver::new(true);
    /// assert_eq!(r.resolve("/a.b.c"), vec!["a.b.c", ".b.c"]);
    /// assert_eq!(r.resolve("/nodot"), vec!["nodot", "nodot"]);
    /// ```
    pub fn resolve(&self, path: &str) -> Vec<String> {
        let exact = normalize(path);
        if !self.wildcard {
            return vec![exact];
        }
        let wildcard = wildcard_key(&exact);
        vec![exact, wildcard]
    }
}

/// Lexically clean `path`, strip one leading separator, lowercase.
///
/// Cleaning collapses repeated separators and resolves `.` and `..`
/// segments without touching the backend.  Paths are treated as
/// rooted; `..` never escapes above the root.
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(PATH_SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/").to_lowercase()
}

/// Replace the leftmost label of `exact` (up to and including the
/// first dot) with a single leading dot.  No dot: unchanged.
fn wildcard_key(exact: &str) -> String {
    match exact.find('.') {
        Some(i) => format!(".{}", &exact[i + 1..]),
        None => exact.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_then_wildcard() {
        let r = KeyResolver::new(true);
        assert_eq!(r.resolve("/a.b.c"), vec!["a.b.c", ".b.c"]);
        assert_eq!(
            r.resolve("/test.example.com.crt"),
            vec!["test.example.com.crt", ".example.com.crt"]
        );
    }

    #[test]
    fn no_dot_duplicates_exact() {
        let r = KeyResolver::new(true);
        assert_eq!(r.resolve("/localhost"), vec!["localhost", "localhost"]);
    }

    #[test]
    fn dotted_key_stays_dotted() {
        // A path that is already a wildcard name strips its (empty)
        // leftmost label and comes back unchanged.
        let r = KeyResolver::new(true);
        assert_eq!(
            r.resolve("/.example.com.crt"),
            vec![".example.com.crt", ".example.com.crt"]
        );
    }

    #[test]
    fn lowercases_and_strips_leading_slash() {
        let r = KeyResolver::new(true);
        assert_eq!(
            r.resolve("/Example.COM.crt"),
            vec!["example.com.crt", ".com.crt"]
        );
    }

    #[test]
    fn cleans_dot_segments() {
        let r = KeyResolver::new(true);
        assert_eq!(r.resolve("//a.b"), vec!["a.b", ".b"]);
        assert_eq!(r.resolve("/x/../a.b"), vec!["a.b", ".b"]);
        assert_eq!(r.resolve("/./a.b"), vec!["a.b", ".b"]);
        // `..` cannot escape the root.
        assert_eq!(r.resolve("/../a.b"), vec!["a.b", ".b"]);
    }

    #[test]
    fn strict_variant_returns_single_key() {
        let r = KeyResolver::new(false);
        assert_eq!(r.resolve("/a.b.c"), vec!["a.b.c"]);
        assert_eq!(r.resolve("/nodot"), vec!["nodot"]);
    }
}
