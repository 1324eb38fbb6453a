//! I/O layer - file system abstraction shared by the index and the dependency resolver

pub mod file_system;

pub use file_system::{FileMetadata, FilePatterns, FileSystemTrait, RealFileSystem};
