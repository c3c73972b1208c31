use serde::{Deserialize, Serialize};
use std::fmt;

/// One primitive component of a query key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Str(value.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(value as i64)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(value as i64)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Null, Into::into)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => write!(f, "null"),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Composite cache identifier, e.g. `["leads", "detail", "L1"]`.
///
/// Keys form a hierarchy by prefix: invalidating `["leads"]` reaches every
/// leads query, `["leads", "list"]` only the list views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_parts(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Append a part (builder style)
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The empty key is a prefix of every key
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn first(&self) -> Option<&KeyPart> {
        self.0.first()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Build a `QueryKey` from anything convertible into `KeyPart`
#[macro_export]
macro_rules! query_key {
    () => {
        $crate::cache::QueryKey::new()
    };
    ($($part:expr),+ $(,)?) => {
        $crate::cache::QueryKey::from_parts(vec![$($crate::cache::KeyPart::from($part)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching() {
        let detail = crate::query_key!["leads", "detail", "L1"];
        assert!(detail.starts_with(&crate::query_key!["leads"]));
        assert!(detail.starts_with(&crate::query_key!["leads", "detail"]));
        assert!(detail.starts_with(&QueryKey::new()));
        assert!(!detail.starts_with(&crate::query_key!["leads", "list"]));
        assert!(!crate::query_key!["leads"].starts_with(&detail));
    }

    #[test]
    fn display_and_mixed_parts() {
        let key = crate::query_key!["meetings", 2024, true, None::<String>];
        assert_eq!(key.to_string(), "[meetings, 2024, true, null]");
        assert_eq!(key.len(), 4);
    }
}
