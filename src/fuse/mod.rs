// FUSE host glue: the inode adapter and the mount entry points.

pub mod adapter;
pub mod mount;

pub use adapter::FuseAdapter;
pub use mount::{mount, parse_options};
