
// imports
use crate::config::files_handling;
use crate::errors::Result;

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::path::Path;

pub const PROGRESS_EVERY: usize = 1_000_000;

/// The corpus tokens that survived the frequency cutoff, in lexicographic order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary(BTreeSet<String>);

impl Vocabulary {

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Vocabulary(iter.into_iter().collect())
    }
}

/// Corpus lines are pre-tokenized: tokens are separated by single spaces and
/// multi-word units are joined by underscores.
pub fn tokenize(sequence: &str) -> Vec<&str> {
    sequence.trim().split(' ').collect()
}

/// One stop-word per line, empty lines ignored.
pub fn load_stopwords(file_path: &Path) -> Result<HashSet<String>> {
    let mut stopwords = HashSet::new();
    for line in files_handling::read_lines(file_path)? {
        let line = line?;
        let word = line.trim();
        if !word.is_empty() {
            stopwords.insert(word.to_string());
        }
    }
    Ok(stopwords)
}

pub struct VocabularyBuilder {
    stopwords: HashSet<String>,
    minimum_frequency: usize,
    vocabulary_size: Option<usize>,
}

impl VocabularyBuilder {

    pub fn new(stopwords: HashSet<String>, minimum_frequency: usize, vocabulary_size: Option<usize>) -> Self {
        Self { stopwords, minimum_frequency, vocabulary_size }
    }

    // stop-words, numbers and anything carrying the `__` pair-key marker never enter the vocabulary
    fn keep(&self, token: &str) -> bool {
        !token.is_empty()
            && !self.stopwords.contains(token)
            && !token.contains("__")
            && !token.chars().all(char::is_numeric)
    }

    fn accumulate(&self, line: &str, token2count: &mut HashMap<String, usize>) {

        // accumulate occurrences of words - how many times each token appears in the corpus
        for tok in tokenize(line) {
            if !self.keep(tok) {
                continue;
            }
            match token2count.get_mut(tok) {
                Some(val) => *val += 1,
                None => { token2count.insert(tok.to_owned(), 1); }
            }
        }
    }

    fn build_vocab(token2count: HashMap<String, usize>, minimum_frequency: usize, vocabulary_size: Option<usize>) -> Vocabulary {

        // tokens are sorted by their string, and the cutoff is the lexicographic position
        // of the first token reaching `minimum_frequency`. Everything from there on is kept,
        // up to `vocabulary_size` tokens. When no token reaches it the vocabulary is empty,
        // the last token is not kept as a fallback.
        let total = token2count.len();
        let mut tup = token2count.into_iter().collect::<Vec<(String, usize)>>();
        tup.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let start = match tup.iter().position(|(_, freq)| *freq >= minimum_frequency) {
            Some(start) => start,
            None => tup.len()
        };
        let end = match vocabulary_size {
            Some(size) => tup.len().min(start.saturating_add(size)),
            None => tup.len()
        };

        info!("keeping {} tokens out of {} (cutoff at position {})", end - start, total, start);
        tup.drain(start..end).map(|(tok, _)| tok).collect()
    }

    /// Scans `lines` once and returns the surviving tokens.
    pub fn build<I>(&self, lines: I) -> Result<Vocabulary>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut token2count: HashMap<String, usize> = HashMap::new();
        for (k, line) in lines.into_iter().enumerate() {
            if k > 0 && k % PROGRESS_EVERY == 0 {
                info!("vocabulary: read {} lines, {} distinct tokens", k, token2count.len());
            }
            self.accumulate(&line?, &mut token2count);
        }
        Ok(VocabularyBuilder::build_vocab(token2count, self.minimum_frequency, self.vocabulary_size))
    }

    pub fn run(&self, corpus_file: &Path) -> Result<Vocabulary> {
        let lines = files_handling::read_lines(corpus_file)?;
        self.build(lines)
    }

}
