use std::fmt;
use std::path::{Path, PathBuf};

use lsp_types::{Location as LspLocation, Position as LspPosition, Range as LspRange};
use serde::{Deserialize, Serialize};

/// Zero-based line/character position, as reported by language servers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Self {
        Self {
            start: Position {
                line: start_line,
                character: start_character,
            },
            end: Position {
                line: end_line,
                character: end_character,
            },
        }
    }

    /// Check if the given position falls inside this range (inclusive)
    pub fn contains(&self, position: &Position) -> bool {
        position >= &self.start && position <= &self.end
    }
}

/// Location of a symbol: document URI plus range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub uri: String,
    pub range: Range,
}

impl SymbolLocation {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }

    /// Location covering the start of a file
    pub fn file_start(path: &Path) -> Self {
        Self {
            uri: uri_from_path(path),
            range: Range::default(),
        }
    }

    /// Filesystem path of the document, if the URI uses the `file` scheme
    pub fn file_path(&self) -> Option<PathBuf> {
        path_from_uri(&self.uri)
    }
}

impl fmt::Display for SymbolLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_path = self
            .file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.uri.clone());
        // 1-based for humans
        write!(
            f,
            "{}:{}:{}",
            display_path,
            self.range.start.line + 1,
            self.range.start.character + 1
        )
    }
}

impl From<LspPosition> for Position {
    fn from(position: LspPosition) -> Self {
        Self {
            line: position.line,
            character: position.character,
        }
    }
}

impl From<LspRange> for Range {
    fn from(range: LspRange) -> Self {
        Self {
            start: range.start.into(),
            end: range.end.into(),
        }
    }
}

impl From<&LspLocation> for SymbolLocation {
    fn from(location: &LspLocation) -> Self {
        Self {
            uri: location.uri.to_string(),
            range: Range::from(location.range),
        }
    }
}

/// Build a `file://` URI for an absolute path
pub fn uri_from_path(path: &Path) -> String {
    let path_str = path.to_string_lossy().replace('\\', "/");
    let mut uri = String::with_capacity(path_str.len() + 8);
    uri.push_str("file://");
    if !path_str.starts_with('/') {
        uri.push('/');
    }
    for ch in path_str.chars() {
        match ch {
            ' ' => uri.push_str("%20"),
            '#' => uri.push_str("%23"),
            '%' => uri.push_str("%25"),
            '?' => uri.push_str("%3F"),
            _ => uri.push(ch),
        }
    }
    uri
}

/// Convert a `file://` URI back to a path; `None` for other schemes
pub fn path_from_uri(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix("file://")?;
    let bytes = rest.as_bytes();
    let mut raw = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let Some(hex) = rest.get(i + 1..i + 3)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            raw.push(byte);
            i += 3;
            continue;
        }
        raw.push(bytes[i]);
        i += 1;
    }
    let mut decoded = String::from_utf8_lossy(&raw).into_owned();
    // file:///C:/x on Windows
    if decoded.len() > 2 && decoded.as_bytes()[2] == b':' && decoded.starts_with('/') {
        decoded.remove(0);
    }
    Some(PathBuf::from(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_round_trip_with_spaces() {
        let path = Path::new("/home/user/my project/src/main.ts");
        let uri = uri_from_path(path);
        assert_eq!(uri, "file:///home/user/my%20project/src/main.ts");
        assert_eq!(path_from_uri(&uri), Some(path.to_path_buf()));
    }

    #[test]
    fn test_path_from_non_file_uri() {
        assert_eq!(path_from_uri("untitled:Untitled-1"), None);
    }

    #[test]
    fn test_range_contains() {
        let range = Range::new(3, 4, 5, 0);
        assert!(range.contains(&Position {
            line: 4,
            character: 100
        }));
        assert!(range.contains(&Position {
            line: 3,
            character: 4
        }));
        assert!(!range.contains(&Position {
            line: 3,
            character: 3
        }));
        assert!(!range.contains(&Position {
            line: 5,
            character: 1
        }));
    }

    #[test]
    fn test_location_display_is_one_based() {
        let location = SymbolLocation::new("file:///src/a.py", Range::new(9, 4, 9, 12));
        assert_eq!(location.to_string(), "/src/a.py:10:5");
    }
}
