//! Search index hook.
//!
//! The path store reindexes after every create or update and resets after
//! every delete. Index failures are logged by the caller and never undo the
//! storage change.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use crate::error::{ModelError, ModelResult};
use crate::notification::ObjectType;

/// Words never indexed.
pub const STOP_WORDS: &[&str] = &["a", "an", "and", "the", "of", "is", "in", "it", "or", "to"];

/// A document handed to the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indexable {
    pub id: String,
    pub object_type: ObjectType,
    pub path: String,
    /// Free text to tokenize.
    pub fields: Vec<String>,
}

pub trait SearchIndex: Send + Sync {
    /// Forget everything indexed for `id`.
    fn reset(&self, id: &str) -> ModelResult<()>;

    /// Replace the terms indexed for `doc.id`.
    fn index(&self, doc: &Indexable) -> ModelResult<()>;
}

/// An index that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSearch;

impl SearchIndex for NoSearch {
    fn reset(&self, _id: &str) -> ModelResult<()> {
        Ok(())
    }

    fn index(&self, _doc: &Indexable) -> ModelResult<()> {
        Ok(())
    }
}

/// Lowercase, split on `_` and whitespace, drop stop words and one-letter
/// terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
struct Terms {
    by_term: HashMap<String, BTreeSet<String>>,
    by_doc: HashMap<String, BTreeSet<String>>,
}

/// In-memory inverted term index.
#[derive(Debug, Default)]
pub struct TermIndex {
    inner: RwLock<Terms>,
}

impl TermIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every document containing `term`.
    pub fn find(&self, term: &str) -> Vec<String> {
        let term = term.to_lowercase();
        self.inner
            .read()
            .map(|t| {
                t.by_term
                    .get(&term)
                    .map(|ids| ids.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn term_count(&self) -> usize {
        self.inner.read().map(|t| t.by_term.len()).unwrap_or(0)
    }
}

fn remove_doc(terms: &mut Terms, id: &str) {
    let Some(old) = terms.by_doc.remove(id) else {
        return;
    };
    for term in old {
        if let Some(ids) = terms.by_term.get_mut(&term) {
            ids.remove(id);
            if ids.is_empty() {
                terms.by_term.remove(&term);
            }
        }
    }
}

impl SearchIndex for TermIndex {
    fn reset(&self, id: &str) -> ModelResult<()> {
        let mut terms = self
            .inner
            .write()
            .map_err(|_| ModelError::Delivery("search index lock poisoned".into()))?;
        remove_doc(&mut terms, id);
        Ok(())
    }

    fn index(&self, doc: &Indexable) -> ModelResult<()> {
        let mut terms = self
            .inner
            .write()
            .map_err(|_| ModelError::Delivery("search index lock poisoned".into()))?;
        remove_doc(&mut terms, &doc.id);
        let words: BTreeSet<String> = doc.fields.iter().flat_map(|f| tokenize(f)).collect();
        for word in &words {
            terms
                .by_term
                .entry(word.clone())
                .or_default()
                .insert(doc.id.clone());
        }
        terms.by_doc.insert(doc.id.clone(), words);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> Indexable {
        Indexable {
            id: id.into(),
            object_type: ObjectType::Resource,
            path: format!("/{id}"),
            fields: vec![text.into()],
        }
    }

    #[test]
    fn tokenizer_rules() {
        assert_eq!(
            tokenize("The_Annual report of 2024 x"),
            vec!["annual", "report", "2024"]
        );
    }

    #[test]
    fn reindex_replaces_terms() {
        let index = TermIndex::new();
        index.index(&doc("r1", "alpha beta")).unwrap();
        index.index(&doc("r2", "beta")).unwrap();
        assert_eq!(index.find("BETA"), vec!["r1", "r2"]);

        index.index(&doc("r1", "gamma")).unwrap();
        assert_eq!(index.find("beta"), vec!["r2"]);
        assert!(index.find("alpha").is_empty());
        assert_eq!(index.find("gamma"), vec!["r1"]);
    }

    #[test]
    fn reset_forgets_document() {
        let index = TermIndex::new();
        index.index(&doc("r1", "alpha")).unwrap();
        index.reset("r1").unwrap();
        assert!(index.find("alpha").is_empty());
        assert_eq!(index.term_count(), 0);
        index.reset("never-indexed").unwrap();
    }
}
