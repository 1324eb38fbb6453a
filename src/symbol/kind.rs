//! Symbol kind names, codes and kind-set parsing
//!
//! The permissive parsing here (strings in any case, numeric codes, arrays,
//! JSON-encoded strings) belongs to the tool/CLI boundary. The query engine
//! only ever sees an already validated [`KindSet`].

use lsp_types::SymbolKind;
use serde_json::Value;
use thiserror::Error;

/// LSP SymbolKind enumeration: (kind, numeric code, canonical name)
const KIND_TABLE: [(SymbolKind, u32, &str); 26] = [
    (SymbolKind::FILE, 1, "File"),
    (SymbolKind::MODULE, 2, "Module"),
    (SymbolKind::NAMESPACE, 3, "Namespace"),
    (SymbolKind::PACKAGE, 4, "Package"),
    (SymbolKind::CLASS, 5, "Class"),
    (SymbolKind::METHOD, 6, "Method"),
    (SymbolKind::PROPERTY, 7, "Property"),
    (SymbolKind::FIELD, 8, "Field"),
    (SymbolKind::CONSTRUCTOR, 9, "Constructor"),
    (SymbolKind::ENUM, 10, "Enum"),
    (SymbolKind::INTERFACE, 11, "Interface"),
    (SymbolKind::FUNCTION, 12, "Function"),
    (SymbolKind::VARIABLE, 13, "Variable"),
    (SymbolKind::CONSTANT, 14, "Constant"),
    (SymbolKind::STRING, 15, "String"),
    (SymbolKind::NUMBER, 16, "Number"),
    (SymbolKind::BOOLEAN, 17, "Boolean"),
    (SymbolKind::ARRAY, 18, "Array"),
    (SymbolKind::OBJECT, 19, "Object"),
    (SymbolKind::KEY, 20, "Key"),
    (SymbolKind::NULL, 21, "Null"),
    (SymbolKind::ENUM_MEMBER, 22, "EnumMember"),
    (SymbolKind::STRUCT, 23, "Struct"),
    (SymbolKind::EVENT, 24, "Event"),
    (SymbolKind::OPERATOR, 25, "Operator"),
    (SymbolKind::TYPE_PARAMETER, 26, "TypeParameter"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KindParseError {
    #[error("Unknown symbol kind '{value}'. Valid kinds: {valid}")]
    UnknownName { value: String, valid: String },

    #[error("Symbol kind code {code} out of range. Valid codes are 1-26 ({valid})")]
    UnknownCode { code: i64, valid: String },

    #[error("Unsupported kind filter value {value}. Expected a kind name, a code or an array of them. Valid kinds: {valid}")]
    UnsupportedValue { value: String, valid: String },
}

fn valid_kinds() -> String {
    KIND_TABLE
        .iter()
        .map(|(_, _, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Canonical name of a kind ("Class", "EnumMember", ...)
pub fn kind_name(kind: SymbolKind) -> &'static str {
    KIND_TABLE
        .iter()
        .find(|(k, _, _)| *k == kind)
        .map(|(_, _, name)| *name)
        .unwrap_or("Unknown")
}

/// Numeric LSP code of a kind, 0 when not one of the 26 standard kinds
pub fn kind_code(kind: SymbolKind) -> u32 {
    KIND_TABLE
        .iter()
        .find(|(k, _, _)| *k == kind)
        .map(|(_, code, _)| *code)
        .unwrap_or(0)
}

/// Kind for a numeric LSP code
pub fn kind_from_code(code: i64) -> Result<SymbolKind, KindParseError> {
    KIND_TABLE
        .iter()
        .find(|(_, c, _)| i64::from(*c) == code)
        .map(|(kind, _, _)| *kind)
        .ok_or_else(|| KindParseError::UnknownCode {
            code,
            valid: valid_kinds(),
        })
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parse a kind name case-insensitively, or a numeric code given as text
pub fn parse_kind_name(value: &str) -> Result<SymbolKind, KindParseError> {
    let trimmed = value.trim();
    if let Ok(code) = trimmed.parse::<i64>() {
        return kind_from_code(code);
    }

    let wanted = normalize(trimmed);
    KIND_TABLE
        .iter()
        .find(|(_, _, name)| normalize(name) == wanted)
        .map(|(kind, _, _)| *kind)
        .ok_or_else(|| KindParseError::UnknownName {
            value: value.to_string(),
            valid: valid_kinds(),
        })
}

/// Validated set of symbol kinds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSet {
    kinds: Vec<SymbolKind>,
}

impl KindSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(kind: SymbolKind) -> Self {
        Self { kinds: vec![kind] }
    }

    pub fn insert(&mut self, kind: SymbolKind) {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
    }

    pub fn contains(&self, kind: SymbolKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolKind> + '_ {
        self.kinds.iter().copied()
    }

    /// Parse a comma separated list such as `"class, Function, 23"`
    pub fn parse_list(value: &str) -> Result<Self, KindParseError> {
        let mut set = Self::new();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            set.insert(parse_kind_name(part)?);
        }
        Ok(set)
    }

    /// Parse a loosely typed filter value coming from a tool call
    ///
    /// Accepts a kind name, a numeric code, an array of either, or a string
    /// holding JSON for any of those (e.g. `"[\"Class\", 12]"`).
    pub fn parse_value(value: &Value) -> Result<Self, KindParseError> {
        let mut set = Self::new();
        Self::collect_value(value, &mut set, true)?;
        Ok(set)
    }

    fn collect_value(value: &Value, set: &mut Self, top_level: bool) -> Result<(), KindParseError> {
        match value {
            Value::String(text) => {
                let trimmed = text.trim();
                if top_level && (trimmed.starts_with('[') || trimmed.starts_with('"')) {
                    if let Ok(decoded) = serde_json::from_str::<Value>(trimmed) {
                        return Self::collect_value(&decoded, set, false);
                    }
                }
                if trimmed.contains(',') {
                    for kind in Self::parse_list(trimmed)?.iter() {
                        set.insert(kind);
                    }
                    return Ok(());
                }
                set.insert(parse_kind_name(trimmed)?);
                Ok(())
            }
            Value::Number(number) => {
                let code = number.as_i64().ok_or_else(|| KindParseError::UnsupportedValue {
                    value: number.to_string(),
                    valid: valid_kinds(),
                })?;
                set.insert(kind_from_code(code)?);
                Ok(())
            }
            Value::Array(items) => {
                for item in items {
                    if item.is_array() {
                        return Err(KindParseError::UnsupportedValue {
                            value: item.to_string(),
                            valid: valid_kinds(),
                        });
                    }
                    Self::collect_value(item, set, false)?;
                }
                Ok(())
            }
            other => Err(KindParseError::UnsupportedValue {
                value: other.to_string(),
                valid: valid_kinds(),
            }),
        }
    }
}

impl FromIterator<SymbolKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = SymbolKind>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kind_name_is_case_insensitive() {
        for name in ["class", "CLASS", "Class", " cLaSs "] {
            assert_eq!(parse_kind_name(name).unwrap(), SymbolKind::CLASS);
        }
        assert_eq!(
            parse_kind_name("enum_member").unwrap(),
            SymbolKind::ENUM_MEMBER
        );
        assert_eq!(
            parse_kind_name("type-parameter").unwrap(),
            SymbolKind::TYPE_PARAMETER
        );
        assert_eq!(parse_kind_name("12").unwrap(), SymbolKind::FUNCTION);
    }

    #[test]
    fn test_unknown_kind_lists_valid_set() {
        let err = parse_kind_name("widget").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("widget"));
        assert!(message.contains("TypeParameter"));
        assert!(message.contains("Class"));
    }

    #[test]
    fn test_codes_and_names_are_consistent() {
        for code in 1..=26 {
            let kind = kind_from_code(code).unwrap();
            assert_eq!(i64::from(kind_code(kind)), code);
            assert_eq!(parse_kind_name(kind_name(kind)).unwrap(), kind);
        }
        assert!(kind_from_code(0).is_err());
        assert!(kind_from_code(27).is_err());
    }

    #[test]
    fn test_parse_value_shapes() {
        let from_string = KindSet::parse_value(&json!("Class")).unwrap();
        assert!(from_string.contains(SymbolKind::CLASS));

        let from_number = KindSet::parse_value(&json!(12)).unwrap();
        assert!(from_number.contains(SymbolKind::FUNCTION));

        let from_array = KindSet::parse_value(&json!(["class", 12, "CLASS"])).unwrap();
        assert_eq!(from_array.len(), 2);

        let from_encoded = KindSet::parse_value(&json!("[\"Interface\", 23]")).unwrap();
        assert!(from_encoded.contains(SymbolKind::INTERFACE));
        assert!(from_encoded.contains(SymbolKind::STRUCT));

        let from_list = KindSet::parse_value(&json!("method, field")).unwrap();
        assert_eq!(from_list.len(), 2);
    }

    #[test]
    fn test_parse_value_rejects_other_shapes() {
        assert!(KindSet::parse_value(&json!(true)).is_err());
        assert!(KindSet::parse_value(&json!({"kind": "class"})).is_err());
        assert!(KindSet::parse_value(&json!([["class"]])).is_err());
        assert!(KindSet::parse_value(&json!(1.5)).is_err());
    }
}
