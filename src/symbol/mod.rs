//! Symbol abstraction module
//!
//! Provides the normalized `SymbolEntry` shape (built on `lsp_types::SymbolKind`),
//! its document location, and kind parsing for filters.

pub mod kind;
pub mod location;
#[allow(clippy::module_inception)]
mod symbol;

pub use kind::{KindParseError, KindSet, kind_code, kind_name, parse_kind_name};
pub use location::{Position, Range, SymbolLocation, path_from_uri, uri_from_path};
pub use symbol::{SymbolEntry, SymbolWalk, count_symbols};
