use std::path::{Path, PathBuf};

use mdbfs::backend::{self, Backend, FileKind};
use tempfile::TempDir;

fn seed_database(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("records");

    let db = sled::open(&path).unwrap();
    db.insert("k1", b"v1".to_vec()).unwrap();
    db.insert("k2", b"v2".to_vec()).unwrap();
    db.flush().unwrap();
    drop(db);

    path
}

fn open_backend(path: &Path) -> Box<dyn Backend> {
    let backend = backend::get("sled").unwrap();
    backend.open(path).unwrap();
    backend
}

fn listing(backend: &dyn Backend) -> Vec<String> {
    backend.readdir("/").unwrap().into_iter().map(|e| e.name).collect()
}

#[test]
fn test_root_lists_all_records_as_files() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    let entries = backend.readdir("/").unwrap();
    assert_eq!(
        entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        vec!["k1", "k2"]
    );
    assert!(entries.iter().all(|e| e.kind == FileKind::RegularFile));
}

#[test]
fn test_attributes() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    let root = backend.getattr("/").unwrap();
    assert_eq!(root.kind, FileKind::Directory);
    assert_eq!(root.mode, 0o755);
    assert_eq!(root.size, 0);

    let record = backend.getattr("/k1").unwrap();
    assert_eq!(record.kind, FileKind::RegularFile);
    assert_eq!(record.mode, 0o644);
    assert_eq!(record.size, 2);
}

#[test]
fn test_read_write_roundtrip() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    assert_eq!(backend.read("/k1", 4096, 0).unwrap(), b"v1");

    assert_eq!(backend.write("/k1", b"V1", 0).unwrap(), 2);
    assert_eq!(backend.read("/k1", 4096, 0).unwrap(), b"V1");
    assert_eq!(backend.getattr("/k1").unwrap().size, 2);
}

#[test]
fn test_offset_read_boundaries() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    assert_eq!(backend.read("/k1", 1, 1).unwrap(), b"1");
    assert!(backend.read("/k1", 4096, 2).unwrap().is_empty());
    assert!(backend.read("/k1", 4096, 50).unwrap().is_empty());
}

#[test]
fn test_offset_write_is_refused() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    assert_eq!(backend.write("/k1", b"x", 1).unwrap(), 0);
    assert_eq!(backend.read("/k1", 4096, 0).unwrap(), b"v1");
}

#[test]
fn test_unlink_removes_a_record() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    backend.unlink("/k2").unwrap();
    assert_eq!(listing(backend.as_ref()), vec!["k1"]);

    // Deleting it again is an engine failure.
    assert_eq!(backend.unlink("/k2").unwrap_err().to_errno(), libc::EINTR);
}

#[test]
fn test_mknod_creates_an_empty_record() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    backend.mknod("/k3").unwrap();
    assert_eq!(listing(backend.as_ref()), vec!["k1", "k2", "k3"]);
    assert_eq!(backend.getattr("/k3").unwrap().size, 0);
    assert!(backend.read("/k3", 4096, 0).unwrap().is_empty());
}

#[test]
fn test_rename_moves_the_value() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    backend.rename("/k1", "/k9", 0).unwrap();
    assert_eq!(listing(backend.as_ref()), vec!["k2", "k9"]);
    assert_eq!(backend.read("/k9", 4096, 0).unwrap(), b"v1");

    assert_eq!(backend.rename("/ghost", "/k5", 0).unwrap_err().to_errno(), libc::EINTR);
}

#[test]
fn test_only_the_root_is_a_directory() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    assert_eq!(backend.read("/", 4096, 0).unwrap_err().to_errno(), libc::EISDIR);
    assert_eq!(backend.write("/", b"x", 0).unwrap_err().to_errno(), libc::EISDIR);
    assert_eq!(backend.readdir("/k1").unwrap_err().to_errno(), libc::ENOENT);
}

#[test]
fn test_deep_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    assert_eq!(backend.getattr("/a/b").unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(backend.read("/a/b", 4096, 0).unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(backend.write("/a/b", b"x", 0).unwrap_err().to_errno(), libc::EINVAL);
    assert_eq!(backend.mknod("/a/b").unwrap_err().to_errno(), libc::EINVAL);
    assert_eq!(backend.unlink("/a/b").unwrap_err().to_errno(), libc::EINVAL);
    assert_eq!(backend.rename("/a/b", "/c", 0).unwrap_err().to_errno(), libc::EINVAL);
}

#[test]
fn test_mutating_the_root_is_invalid() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    assert_eq!(backend.mknod("/").unwrap_err().to_errno(), libc::EINVAL);
    assert_eq!(backend.unlink("/").unwrap_err().to_errno(), libc::EINVAL);
    assert_eq!(backend.rename("/", "/k1", 0).unwrap_err().to_errno(), libc::EINVAL);
}

#[test]
fn test_directories_are_not_in_the_operation_table() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&seed_database(&dir));

    assert_eq!(backend.mkdir("/d").unwrap_err().to_errno(), libc::ENOSYS);
    assert_eq!(backend.rmdir("/d").unwrap_err().to_errno(), libc::ENOSYS);
}

#[test]
fn test_open_missing_database_fails() {
    let dir = TempDir::new().unwrap();
    let backend = backend::get("sled").unwrap();
    assert!(backend.open(&dir.path().join("absent")).is_err());
}
