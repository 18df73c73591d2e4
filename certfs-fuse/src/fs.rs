//! FUSE adapter: inode-level callbacks routed through the path-level
//! projection.
//!
//! FUSE addresses entries by inode while the projection (and the
//! backend key-space) is path-addressed, so the adapter keeps a small
//! interning table mapping inodes to root-level names.  Inode 1 is the
//! root directory; dynamic inodes are handed out on first `lookup` or
//! `readdir` and stay stable for the life of the mount.  Nothing else
//! is cached — every callback re-queries the backend via the
//! projection.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, UNIX_EPOCH};

use anyhow::Context as _;
use certfs_core::RecordStore;
use fuser::{
    AccessFlags, BackgroundSession, Config, Errno, FileAttr, FileHandle, FileType, Filesystem,
    FopenFlags, Generation, INodeNo, LockOwner, MountOption, OpenFlags, ReplyAttr, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, Request, SessionACL,
};
use tracing::debug;

use crate::projection::{EntryKind, Projection};

const INO_ROOT: u64 = 1;

/// First inode handed out for backend records.
const INO_DYNAMIC_START: u64 = 2;

/// Zero TTL: attributes and entries are re-resolved on every call, so
/// the kernel never serves a record the backend no longer has.
const TTL: Duration = Duration::ZERO;

/// Inode interning table.  Grows monotonically; a mount serving a
/// certificate store never sees enough distinct names for that to
/// matter.
struct InodeTable {
    paths: HashMap<u64, String>,
    inos: HashMap<String, u64>,
    next: u64,
}

impl InodeTable {
    fn new() -> Self {
        Self {
            paths: HashMap::new(),
            inos: HashMap::new(),
            next: INO_DYNAMIC_START,
        }
    }

    /// Inode for a rooted path, allocating on first sight.
    fn intern(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inos.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.inos.insert(path.to_string(), ino);
        self.paths.insert(ino, path.to_string());
        ino
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        if ino == INO_ROOT {
            return Some("/".to_string());
        }
        self.paths.get(&ino).cloned()
    }
}

fn make_attr(ino: INodeNo, kind: EntryKind) -> FileAttr {
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };
    let (file_type, perm, nlink, size) = match kind {
        EntryKind::Directory => (FileType::Directory, 0o555, 2u32, 4096u64),
        // Size stays 0: computing it would cost a GET per stat.  Opens
        // reply with direct I/O so the kernel reads to the short return
        // instead of trusting this field.
        EntryKind::RegularFile => (FileType::RegularFile, 0o444, 1u32, 0u64),
    };
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: UNIX_EPOCH,
        mtime: UNIX_EPOCH,
        ctime: UNIX_EPOCH,
        crtime: UNIX_EPOCH,
        kind: file_type,
        perm,
        nlink,
        uid,
        gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

/// The FUSE filesystem object.
///
/// `Filesystem` in fuser 0.17 takes `&self`; the inode table sits
/// behind an `RwLock` since `lookup` and `readdir` intern new names.
pub struct CertFs<S> {
    projection: Projection<S>,
    inodes: RwLock<InodeTable>,
}

impl<S: RecordStore> CertFs<S> {
    pub fn new(projection: Projection<S>) -> Self {
        Self {
            projection,
            inodes: RwLock::new(InodeTable::new()),
        }
    }

    fn path_of(&self, ino: INodeNo) -> Option<String> {
        match self.inodes.read() {
            Ok(table) => table.path_of(ino.0),
            Err(_) => None,
        }
    }
}

impl<S: RecordStore + 'static> Filesystem for CertFs<S> {
    fn lookup(&self, _req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEntry) {
        // Flat root: nothing is ever found under another directory.
        if parent.0 != INO_ROOT {
            reply.error(Errno::ENOENT);
            return;
        }
        let name_str = match name.to_str() {
            Some(s) => s,
            None => {
                reply.error(Errno::ENOENT);
                return;
            }
        };
        let path = format!("/{name_str}");
        match self.projection.getattr(&path) {
            None => reply.error(Errno::ENOENT),
            Some(kind) => {
                let ino = match self.inodes.write() {
                    Ok(mut table) => table.intern(&path),
                    Err(_) => {
                        reply.error(Errno::EIO);
                        return;
                    }
                };
                debug!(name = name_str, ino, "fuse lookup");
                reply.entry(&TTL, &make_attr(INodeNo(ino), kind), Generation(0));
            }
        }
    }

    fn getattr(&self, _req: &Request, ino: INodeNo, _fh: Option<FileHandle>, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        match self.projection.getattr(&path) {
            None => reply.error(Errno::ENOENT),
            Some(kind) => reply.attr(&TTL, &make_attr(ino, kind)),
        }
    }

    fn access(&self, _req: &Request, ino: INodeNo, _mask: AccessFlags, reply: ReplyEmpty) {
        // Everything that exists is world-readable; just verify
        // existence.
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        match self.projection.getattr(&path) {
            None => reply.error(Errno::ENOENT),
            Some(_) => reply.ok(),
        }
    }

    fn open(&self, _req: &Request, ino: INodeNo, _flags: OpenFlags, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        match self.projection.open(&path) {
            // Direct I/O: getattr reports size 0, so the kernel must
            // read until the projection returns short instead of
            // clamping reads to the reported size.
            Some(fh) => reply.opened(FileHandle(fh), FopenFlags::FOPEN_DIRECT_IO),
            None => reply.error(Errno::ENOENT),
        }
    }

    fn opendir(&self, _req: &Request, ino: INodeNo, _flags: OpenFlags, reply: ReplyOpen) {
        if ino.0 == INO_ROOT {
            reply.opened(FileHandle(0), FopenFlags::empty());
        } else {
            reply.error(Errno::ENOENT);
        }
    }

    fn read(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: u64,
        size: u32,
        _flags: OpenFlags,
        _lock_owner: Option<LockOwner>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        // A miss mid-read yields an empty slice — EOF, not an error.
        reply.data(&self.projection.read(&path, size, offset));
    }

    fn readdir(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: u64,
        mut reply: ReplyDirectory,
    ) {
        if ino.0 != INO_ROOT {
            reply.error(Errno::ENOENT);
            return;
        }

        let names = self.projection.readdir();
        let mut entries: Vec<(u64, FileType, String)> = Vec::with_capacity(names.len());
        for name in names {
            match name.as_str() {
                "." | ".." => entries.push((INO_ROOT, FileType::Directory, name)),
                _ => {
                    let ino = match self.inodes.write() {
                        Ok(mut table) => table.intern(&format!("/{name}")),
                        Err(_) => {
                            reply.error(Errno::EIO);
                            return;
                        }
                    };
                    entries.push((ino, FileType::RegularFile, name));
                }
            }
        }

        for (i, (child_ino, kind, name)) in entries.iter().enumerate() {
            if (i as u64) < offset {
                continue;
            }
            if reply.add(INodeNo(*child_ino), (i + 1) as u64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&self, _req: &Request, _ino: INodeNo, reply: ReplyStatfs) {
        // Entirely virtual and read-only; only block/name sizes carry
        // information.
        reply.statfs(0, 0, 0, 0, 0, 4096, 255, 0);
    }
}

/// A handle to a mounted certificate filesystem.
///
/// Dropping it unmounts: the `BackgroundSession` drop performs the
/// kernel-side unmount, and `fusermount3 -u` runs as a fallback in
/// case the kernel mount outlives the process.
pub struct MountHandle {
    session: Option<BackgroundSession>,
    mountpoint: PathBuf,
}

impl std::fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountHandle")
            .field("mountpoint", &self.mountpoint)
            .finish_non_exhaustive()
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        drop(self.session.take());

        let _ = std::process::Command::new("fusermount3")
            .args(["-u", self.mountpoint.to_string_lossy().as_ref()])
            .output();
    }
}

/// Mount the projection at `mountpoint` and return a [`MountHandle`].
///
/// Mount options are fixed: read-only, nosuid, nodev, noexec, noatime,
/// allow_other, auto_unmount.  `allow_other` requires
/// `user_allow_other` in `/etc/fuse.conf` when running unprivileged.
pub fn mount<S>(projection: Projection<S>, mountpoint: &Path) -> anyhow::Result<MountHandle>
where
    S: RecordStore + 'static,
{
    // Clean up any stale mount a previous crashed instance left
    // behind; fails harmlessly when nothing is mounted.
    let _ = std::process::Command::new("fusermount3")
        .args(["-uz", mountpoint.to_string_lossy().as_ref()])
        .output();

    std::fs::create_dir_all(mountpoint)
        .with_context(|| format!("create FUSE mountpoint {:?}", mountpoint))?;

    let mut config = Config::default();
    config.mount_options = vec![
        MountOption::RO,
        MountOption::NoSuid,
        MountOption::NoDev,
        MountOption::NoExec,
        MountOption::NoAtime,
        MountOption::AutoUnmount,
        MountOption::FSName("certfs".to_string()),
    ];
    config.acl = SessionACL::All;

    let session = fuser::spawn_mount2(CertFs::new(projection), mountpoint, &config)
        .with_context(|| format!("mount FUSE at {:?}", mountpoint))?;

    Ok(MountHandle {
        session: Some(session),
        mountpoint: mountpoint.to_path_buf(),
    })
}
