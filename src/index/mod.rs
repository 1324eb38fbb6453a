//! Symbol index engine
//!
//! [`ProjectIndex`] is the entry point: it owns the in-memory
//! [`SymbolStore`], the persistent cache and the indexing pipeline for one
//! project root. [`IndexRegistry`] hands out one index per root.

pub mod cache;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod project_index;
pub mod query;
pub mod registry;
pub mod store;


pub use cache::{CacheEntry, CacheError, CacheStorage, FilesystemCacheStorage};
pub use diff::{ChangeDetection, ChangeSet, IncrementalDiff, ModificationMarker};
pub use error::IndexError;
pub use pipeline::{FileError, IndexTarget, IndexingPipeline, PipelineReport};
pub use progress::{ChannelObserver, IndexProgress, NoopObserver, ProgressEvent, ProgressObserver};
pub use project_index::{
    IncrementalResult, IndexFilesResult, ProjectIndex, ResolvedSymbol, UpdateOptions,
};
pub use query::{ContainerMatch, ExternalFilter, FileFilter, SymbolQuery};
pub use registry::IndexRegistry;
pub use store::{FileIndexRecord, IndexStats, SymbolStore};
