//! Words already presented during this connection.
//!
//! Used to bias fresh fetches away from repeats. Grows monotonically and is
//! dropped with the connection.

use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct SeenWordsLedger {
    seen: HashSet<String>,
    order: Vec<String>,
}

/// Ledger key: trimmed, lowercased.
pub fn word_key(word: &str) -> String {
    word.trim().to_lowercase()
}

impl SeenWordsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add words; already-seen ones are skipped. Returns how many were new.
    pub fn record<'a, I>(&mut self, words: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = 0;
        for w in words {
            let key = word_key(w);
            if key.is_empty() {
                continue;
            }
            if self.seen.insert(key.clone()) {
                self.order.push(key);
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Seen words in first-seen order (the exclusion list sent to the generator).
    pub fn words(&self) -> &[String] {
        &self.order
    }
}
