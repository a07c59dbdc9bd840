use std::collections::HashMap;

use crate::error::CompileError;

/// Ordered, deduplicated string table owned by one compiled block.
///
/// Entries are stored by their canonical (unquoted) value, so selectors,
/// global names, string constants and the file name share one key space.
#[derive(Debug, Default, Clone)]
pub struct LiteralPool {
    strings: Vec<String>,
    index: HashMap<String, u16>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `s`, inserting it if absent.
    pub fn insert(&mut self, s: &str) -> Result<u16, CompileError> {
        if let Some(&idx) = self.index.get(s) {
            return Ok(idx);
        }
        let idx = u16::try_from(self.strings.len())
            .map_err(|_| CompileError::TooManyLiterals(s.to_string()))?;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        Ok(idx)
    }

    pub fn lookup(&self, s: &str) -> Option<u16> {
        self.index.get(s).copied()
    }

    pub fn get(&self, idx: u16) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.strings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insertion_order_is_index_order() {
        let mut pool = LiteralPool::new();
        assert_eq!(pool.insert("<string>").unwrap(), 0);
        assert_eq!(pool.insert("at:put:").unwrap(), 1);
        assert_eq!(pool.insert("<string>").unwrap(), 0);
        assert_eq!(pool.lookup("at:put:"), Some(1));
        assert_eq!(pool.lookup("missing"), None);
        assert_eq!(pool.into_vec(), vec!["<string>", "at:put:"]);
    }

    proptest! {
        #[test]
        fn insert_is_idempotent(words in prop::collection::vec("[a-z:']{0,6}", 0..40)) {
            let mut pool = LiteralPool::new();
            for w in &words {
                let first = pool.insert(w).unwrap();
                let again = pool.insert(w).unwrap();
                prop_assert_eq!(first, again);
                prop_assert_eq!(pool.get(first), Some(w.as_str()));
            }
            let entries = pool.into_vec();
            let mut unique = entries.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), entries.len());
        }
    }
}
