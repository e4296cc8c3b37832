//! Key-space helpers.
//!
//! Every key in the substrate is a `:`-joined sequence of parts. The first
//! part is a literal sigil for catalog rows (`@`, `#`, `%`, `$`) or a numeric
//! index id for per-field entries (`<id>:<field>:<pk>:<sub>`).

/// Separator between key parts.
pub(crate) const SEPARATOR: &str = ":";
/// Wildcard used in secondary-index patterns.
pub(crate) const WILDCARD: &str = "*";

/// `@:<id>` — integer index id → index name.
pub(crate) const INDEX_NAME_BY_ID: &str = "@";
/// `#:<name>` — index name → integer index id (as text).
pub(crate) const INDEX_ID_BY_NAME: &str = "#";
/// `%:<name>` — text-encoded index definition, for cold starts.
pub(crate) const DEFINITION_BY_NAME: &str = "%";
/// `$:<id>:<pk>` — text-encoded segment by primary value.
pub(crate) const SEGMENT_BY_PRIMARY: &str = "$";

/// Join parts with the key separator.
pub(crate) fn join(parts: &[&str]) -> String {
    parts.join(SEPARATOR)
}

/// A parsed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    parts: Vec<String>,
}

impl Key {
    /// Split a key into its component parts.
    #[must_use]
    pub fn parse(key: &str) -> Self {
        Self { parts: key.split(SEPARATOR).map(str::to_owned).collect() }
    }

    /// The numeric index id of a per-field entry key.
    #[must_use]
    pub fn index_id(&self) -> Option<&str> {
        (self.parts.len() >= 4).then(|| self.parts[0].as_str())
    }

    /// The field name at nesting depth `depth` (root is 0).
    #[must_use]
    pub fn field_name_at_index(&self, depth: usize) -> Option<&str> {
        // One leading id part, plus trailing primary-value and sub-key parts.
        let pos = depth + 1;
        (self.parts.len() >= pos + 3).then(|| self.parts[pos].as_str())
    }

    /// The primary value of a per-field entry key (second part from the
    /// right).
    #[must_use]
    pub fn segment_key(&self) -> Option<&str> {
        (self.parts.len() >= 4).then(|| self.parts[self.parts.len() - 2].as_str())
    }

    /// The sub-key of a per-field entry key (`"0"` for scalars, the element
    /// index for repeated values).
    #[must_use]
    pub fn field_value_index(&self) -> Option<&str> {
        (self.parts.len() >= 4).then(|| self.parts[self.parts.len() - 1].as_str())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join(SEPARATOR))
    }
}
