// FUSE adapter - bridges the kernel's inode-addressed callbacks to the
// path-addressed backend operations.
//
// Backends do not provide inode numbers, so the adapter keeps a
// bidirectional inode <-> path map and allocates numbers on first sight.
// Requests are handled serially on the session thread; the adapter never
// spawns threads of its own.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::RwLock;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileType as FuseFileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, FUSE_ROOT_ID,
};
use tracing::info;

use crate::backend::{Backend, FileAttr, FileKind, SessionConfig};

/// Default TTL for attributes and directory entries (1 second)
const ATTR_TTL: Duration = Duration::from_secs(1);
const ENTRY_TTL: Duration = Duration::from_secs(1);

pub struct FuseAdapter {
    /// The active backend; all operations route through it.
    backend: Box<dyn Backend>,

    /// Session configuration the backend asked for at mount time.
    session: SessionConfig,

    /// Inode to path mapping; the kernel speaks inodes, backends speak
    /// paths.
    inodes: RwLock<InodeMap>,
}

/// Manages the inode <-> path bidirectional mapping.
struct InodeMap {
    inode_to_path: HashMap<u64, String>,
    path_to_inode: HashMap<String, u64>,
    next_inode: u64,
}

impl InodeMap {
    fn new() -> Self {
        let mut map = Self {
            inode_to_path: HashMap::new(),
            path_to_inode: HashMap::new(),
            next_inode: FUSE_ROOT_ID + 1,
        };
        map.insert(FUSE_ROOT_ID, "/".to_string());
        map
    }

    fn insert(&mut self, inode: u64, path: String) {
        self.inode_to_path.insert(inode, path.clone());
        self.path_to_inode.insert(path, inode);
    }

    /// Inode for a path, allocating a fresh number on first sight.
    fn get_or_create(&mut self, path: &str) -> u64 {
        if let Some(&inode) = self.path_to_inode.get(path) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.insert(inode, path.to_string());
        inode
    }

    fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(|s| s.as_str())
    }

    fn forget_path(&mut self, path: &str) {
        if let Some(inode) = self.path_to_inode.remove(path) {
            self.inode_to_path.remove(&inode);
        }
    }

    /// Keep the inode stable across a rename.
    fn rename(&mut self, from: &str, to: &str) {
        self.forget_path(to);
        if let Some(inode) = self.path_to_inode.remove(from) {
            self.inode_to_path.remove(&inode);
            self.insert(inode, to.to_string());
        }
    }
}

impl FuseAdapter {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        let session = backend.session_config();
        Self { backend, session, inodes: RwLock::new(InodeMap::new()) }
    }

    fn path_of(&self, inode: u64) -> Result<String, libc::c_int> {
        let map = self.inodes.read().unwrap();
        map.get_path(inode).map(|p| p.to_string()).ok_or(libc::ENOENT)
    }

    fn child_path(parent: &str, name: &OsStr) -> Result<String, libc::c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        if parent == "/" {
            Ok(format!("/{name}"))
        } else {
            Ok(format!("{parent}/{name}"))
        }
    }

    fn to_fuse_attr(inode: u64, attr: &FileAttr) -> fuser::FileAttr {
        fuser::FileAttr {
            ino: inode,
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind: match attr.kind {
                FileKind::RegularFile => FuseFileType::RegularFile,
                FileKind::Directory => FuseFileType::Directory,
            },
            perm: attr.mode,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }

    /// Stat a child path and answer with a directory entry reply.
    fn reply_entry(&self, path: &str, reply: ReplyEntry) {
        match self.backend.getattr(path) {
            Ok(attr) => {
                let inode = self.inodes.write().unwrap().get_or_create(path);
                reply.entry(&ENTRY_TTL, &Self::to_fuse_attr(inode, &attr), 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }
}

impl Filesystem for FuseAdapter {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> Result<(), libc::c_int> {
        info!("filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!("filesystem shutting down");
        self.backend.close();
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match Self::child_path(&parent_path, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        self.reply_entry(&path, reply);
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.backend.getattr(&path) {
            Ok(attr) => reply.attr(&ATTR_TTL, &Self::to_fuse_attr(ino, &attr)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match Self::child_path(&parent_path, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        if let Err(e) = self.backend.mknod(&path) {
            return reply.error(e.to_errno());
        }

        self.reply_entry(&path, reply);
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match Self::child_path(&parent_path, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        if let Err(e) = self.backend.mkdir(&path) {
            return reply.error(e.to_errno());
        }

        self.reply_entry(&path, reply);
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match Self::child_path(&parent_path, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.backend.unlink(&path) {
            Ok(()) => {
                self.inodes.write().unwrap().forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match Self::child_path(&parent_path, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.backend.rmdir(&path) {
            Ok(()) => {
                self.inodes.write().unwrap().forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let newparent_path = match self.path_of(newparent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let from = match Self::child_path(&parent_path, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let to = match Self::child_path(&newparent_path, newname) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.backend.rename(&from, &to, flags) {
            Ok(()) => {
                self.inodes.write().unwrap().rename(&from, &to);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: ReplyOpen) {
        // No file handles are tracked; the flags carry the backend's
        // direct-I/O request to the kernel.
        let flags = if self.session.direct_io { fuser::consts::FOPEN_DIRECT_IO } else { 0 };
        reply.opened(0, flags);
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.backend.read(&path, size, offset.max(0) as u64) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.backend.write(&path, data, offset.max(0) as u64) {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        let entries = match self.backend.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.to_errno()),
        };

        let mut listing: Vec<(u64, FuseFileType, String)> = vec![
            (ino, FuseFileType::Directory, ".".to_string()),
            (ino, FuseFileType::Directory, "..".to_string()),
        ];

        for entry in entries {
            let child = if path == "/" {
                format!("/{}", entry.name)
            } else {
                format!("{}/{}", path, entry.name)
            };
            let child_ino = self.inodes.write().unwrap().get_or_create(&child);
            let kind = match entry.kind {
                FileKind::RegularFile => FuseFileType::RegularFile,
                FileKind::Directory => FuseFileType::Directory,
            };
            listing.push((child_ino, kind, entry.name));
        }

        for (i, (entry_ino, kind, name)) in listing.iter().enumerate().skip(offset.max(0) as usize)
        {
            let buffer_full = reply.add(*entry_ino, (i + 1) as i64, *kind, name);
            if buffer_full {
                break;
            }
        }

        reply.ok();
    }
}
