//! FUSE virtual filesystem for Redis-hosted TLS certificates.
//!
//! Presents the backend key-space as a flat read-only directory:
//!
//! ```text
//! /mnt/certs/
//! ├── example.com.crt           exact record
//! ├── example.com.key
//! ├── .wilddomain.com.crt       wildcard record — serves any
//! └── .wilddomain.com.key       subdomain without an exact record
//! ```
//!
//! Opening `test.wilddomain.com.crt` succeeds via the wildcard record
//! even though no key of that name is stored; an exact record always
//! shadows the wildcard.  Nothing is cached — every syscall re-queries
//! the backend, so `redis-cli SET` is visible on the next read.
//!
//! Call [`mount`] to start the background FUSE thread.  The returned
//! [`MountHandle`] keeps the filesystem alive; drop it to unmount.

pub mod fs;
pub mod projection;

pub use fs::{CertFs, MountHandle, mount};
pub use projection::{EntryKind, Projection};
