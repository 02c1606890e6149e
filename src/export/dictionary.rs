use std::collections::HashMap;
use std::io::{self, Write};

use crate::types::RecordField;

/// Run-scoped `(field, term) -> id` mapping.
///
/// Ids are dense, start at zero and are handed out in first-seen order; an assigned id never
/// changes for the rest of the run. Keys render as `field:term`.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    ids: HashMap<String, usize>,
}

impl TermDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(field: RecordField, term: &str) -> String {
        format!("{}:{term}", field.name())
    }

    #[must_use]
    pub fn get(&self, field: RecordField, term: &str) -> Option<usize> {
        self.ids.get(&Self::key(field, term)).copied()
    }

    /// Id of `(field, term)`, assigning the next free one on first sight.
    pub fn intern(&mut self, field: RecordField, term: &str) -> usize {
        let next = self.ids.len();
        *self.ids.entry(Self::key(field, term)).or_insert(next)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Entries sorted by key.
    #[must_use]
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> =
            self.ids.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_unstable();
        entries
    }

    /// Writes `key id` lines sorted by key.
    pub fn write_sorted<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (key, id) in self.sorted() {
            writeln!(out, "{key} {id}")?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut dict = TermDictionary::new();
        assert_eq!(dict.intern(RecordField::Text, "love"), 0);
        assert_eq!(dict.intern(RecordField::UserDescription, "love"), 1);
        assert_eq!(dict.intern(RecordField::Text, "love"), 0);
        assert_eq!(dict.get(RecordField::Text, "pgh"), None);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn dump_is_sorted_by_key() {
        let mut dict = TermDictionary::new();
        dict.intern(RecordField::Text, "zoo");
        dict.intern(RecordField::Text, "apple");
        dict.intern(RecordField::UserUrl, "example.com");
        let mut out = Vec::new();
        dict.write_sorted(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "text:apple 1\ntext:zoo 0\nuser_url:example.com 2\n"
        );
    }
}
