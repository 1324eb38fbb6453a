//! Incremental symbol index over language-server document symbols
//!
//! A [`ProjectIndex`](index::ProjectIndex) keeps the symbols of one project
//! root in memory, persists them per file, re-fetches only changed files and
//! resolves imports into project files and third-party dependencies.

pub mod config;
pub mod deps;
pub mod index;
pub mod io;
pub mod logging;
pub mod provider;
pub mod symbol;

#[cfg(test)]
mod test_utils;

pub use config::{IndexConfig, IndexConfigBuilder};
pub use index::{IndexError, IndexRegistry, ProjectIndex, SymbolQuery};
pub use provider::{ProviderError, SymbolProvider};
pub use symbol::SymbolEntry;
