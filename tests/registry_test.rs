use mdbfs::backend;

#[test]
fn test_every_registered_name_resolves() {
    for name in ["sqlite", "sqlite3", "sled", "kv", "db"] {
        assert!(backend::get(name).is_some(), "{name} should resolve");
    }
}

#[test]
fn test_aliases_share_the_primary_identity() {
    assert_eq!(backend::get("sqlite3").unwrap().name(), "sqlite");
    assert_eq!(backend::get("kv").unwrap().name(), "sled");
    assert_eq!(backend::get("db").unwrap().name(), "sled");
}

#[test]
fn test_unknown_names_do_not_resolve() {
    for name in ["oracle", "postgres", "", "SQLite", "sqlite "] {
        assert!(backend::get(name).is_none(), "{name:?} should not resolve");
    }
}

#[test]
fn test_help_text_shape() {
    let help = backend::help_text();

    // One block per backend, aliases contribute nothing.
    assert_eq!(help.matches("sqlite - ").count(), 1);
    assert_eq!(help.matches("sled - ").count(), 1);

    assert!(help.contains("sqlite - backend for SQLite 3 database files\n\n"));
    assert!(help.contains("sled - backend for sled key-value database files\n\n"));

    // The key-value backend has no help of its own; the placeholder stands in.
    assert!(help.contains("There is no help for this backend.\n\n"));
}

#[test]
fn test_version_text_shape() {
    let version = backend::version_text();
    let lines: Vec<&str> = version.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Backend sqlite version "));
    assert!(lines[1].starts_with("Backend sled version "));
    assert!(version.ends_with('\n'));
}

#[test]
fn test_backend_versions_are_nonempty() {
    for name in ["sqlite", "sled"] {
        let backend = backend::get(name).unwrap();
        assert!(!backend.version().is_empty());
        assert!(!backend.description().is_empty());
    }
}

#[test]
fn test_session_config_requests_direct_io() {
    for name in ["sqlite", "sled"] {
        let backend = backend::get(name).unwrap();
        assert!(backend.session_config().direct_io);
    }
}

#[test]
fn test_close_before_open_only_warns() {
    for name in ["sqlite", "sled"] {
        let backend = backend::get(name).unwrap();
        backend.close();
    }
}
