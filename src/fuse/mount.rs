// Mount management: translate option strings and hand the adapter to the
// FUSE session loop.

use std::path::Path;

use anyhow::{bail, Context, Result};
use fuser::MountOption;
use tracing::{info, warn};

use super::FuseAdapter;
use crate::backend::Backend;

/// Translate `-o` option strings into FUSE mount options. Unknown options
/// are skipped with a warning. A filesystem name is always present.
pub fn parse_options(raw: &[String]) -> Vec<MountOption> {
    let mut options = Vec::new();

    for group in raw {
        for option in group.split(',').filter(|s| !s.is_empty()) {
            match option {
                "ro" => options.push(MountOption::RO),
                "rw" => options.push(MountOption::RW),
                "allow_other" => options.push(MountOption::AllowOther),
                "allow_root" => options.push(MountOption::AllowRoot),
                "auto_unmount" => options.push(MountOption::AutoUnmount),
                other => {
                    if let Some(name) = other.strip_prefix("fsname=") {
                        options.push(MountOption::FSName(name.to_string()));
                    } else {
                        warn!("ignoring unknown mount option {other:?}");
                    }
                }
            }
        }
    }

    if !options.iter().any(|o| matches!(o, MountOption::FSName(_))) {
        options.push(MountOption::FSName("mdbfs".to_string()));
    }

    options
}

/// Mount the backend at `mountpoint` and serve requests until the
/// filesystem is unmounted. Requests dispatch serially on this thread.
pub fn mount(backend: Box<dyn Backend>, mountpoint: &Path, options: &[MountOption]) -> Result<()> {
    if !mountpoint.is_dir() {
        bail!("mount point {} is not a directory", mountpoint.display());
    }

    let adapter = FuseAdapter::new(backend);

    info!("mounting filesystem at {}", mountpoint.display());

    fuser::mount2(adapter, mountpoint, options).context("filesystem session failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_known_flags() {
        let raw = vec!["ro,allow_other".to_string(), "auto_unmount".to_string()];
        let options = parse_options(&raw);

        assert!(options.contains(&MountOption::RO));
        assert!(options.contains(&MountOption::AllowOther));
        assert!(options.contains(&MountOption::AutoUnmount));
    }

    #[test]
    fn test_parse_options_default_fsname() {
        let options = parse_options(&[]);
        assert!(options.contains(&MountOption::FSName("mdbfs".to_string())));
    }

    #[test]
    fn test_parse_options_explicit_fsname_wins() {
        let options = parse_options(&["fsname=records".to_string()]);
        assert!(options.contains(&MountOption::FSName("records".to_string())));
        assert!(!options.contains(&MountOption::FSName("mdbfs".to_string())));
    }

    #[test]
    fn test_parse_options_skips_unknown() {
        let options = parse_options(&["ro,frobnicate".to_string()]);
        assert_eq!(options.len(), 2); // ro + default fsname
    }
}
