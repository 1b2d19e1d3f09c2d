
// imports
use crate::config::files_handling;
use crate::context::LineRecord;
use crate::errors::{Error, Result};
use crate::vocab::{Vocabulary, PROGRESS_EVERY};

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub type Contexts = BTreeMap<String, u64>;

/// left token -> right token -> context token -> number of occurrences.
///
/// Every (left, right) branch holds at least one context with a count of at least one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextCounts(BTreeMap<String, BTreeMap<String, Contexts>>);

impl ContextCounts {

    /// Folds the contexts of one corpus line in, one count per occurrence.
    pub fn add_record(&mut self, record: &LineRecord) {
        for (left, rights) in record.iter() {
            for (right, context) in rights {
                if context.is_empty() {
                    continue;
                }
                let counts = self.0
                    .entry(left.to_owned()).or_default()
                    .entry(right.to_owned()).or_default();
                for token in context {
                    match counts.get_mut(token) {
                        Some(val) => *val += 1,
                        None => { counts.insert(token.to_owned(), 1); }
                    }
                }
            }
        }
    }

    pub fn get(&self, left: &str, right: &str) -> Option<&Contexts> {
        self.0.get(left)?.get(right)
    }

    /// Every (left, right) pair with its contexts.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, &Contexts)> {
        self.0.iter().flat_map(|(left, rights)| {
            rights.iter().map(move |(right, contexts)| (left.as_str(), right.as_str(), contexts))
        })
    }

    pub fn n_left(&self) -> usize {
        self.0.len()
    }

    pub fn n_pairs(&self) -> usize {
        self.0.values().map(|rights| rights.len()).sum()
    }

    pub fn n_triples(&self) -> usize {
        self.0.values().flat_map(|rights| rights.values()).map(|contexts| contexts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}


/// Appends one record to the line-record store, one JSON object per line.
pub fn write_record<W: Write + ?Sized>(writer: &mut W, record: &LineRecord) -> Result<()> {
    serde_json::to_writer(&mut *writer, record).map_err(|e| Error::Io(e.into()))?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Reads the line-record store back in order. A line that does not parse stops the read.
pub fn read_records(file_path: &Path) -> Result<impl Iterator<Item = Result<LineRecord>>> {
    let path = file_path.to_path_buf();
    let lines = files_handling::read_lines(file_path)?;
    Ok(lines.enumerate().filter_map(move |(n, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(Error::Io(e))),
        };
        if line.trim().is_empty() {
            return None;
        }
        Some(serde_json::from_str::<LineRecord>(&line).map_err(|e| Error::corrupt(&path, Some(n + 1), e)))
    }))
}

pub struct ContextAggregator {}

impl ContextAggregator {

    pub fn aggregate<I>(records: I) -> Result<ContextCounts>
    where
        I: IntoIterator<Item = Result<LineRecord>>,
    {
        let mut counts = ContextCounts::default();
        for (k, record) in records.into_iter().enumerate() {
            if k > 0 && k % PROGRESS_EVERY == 0 {
                info!("aggregate: folded {} records, {} pairs so far", k, counts.n_pairs());
            }
            counts.add_record(&record?);
        }
        Ok(counts)
    }

    pub fn run(line_record_store: &Path) -> Result<ContextCounts> {
        ContextAggregator::aggregate(read_records(line_record_store)?)
    }

}


/// Keeps only context tokens in `vocab`, then drops the (left, right) branches and the
/// left branches that were emptied by it.
pub fn filter_vocab(counts: &ContextCounts, vocab: &Vocabulary) -> ContextCounts {

    // 1st: contexts outside of the vocabulary
    let filtered: BTreeMap<String, BTreeMap<String, Contexts>> = counts.0.iter().map(|(left, rights)| {
        let rights = rights.iter().map(|(right, contexts)| {
            let kept = contexts.iter()
                .filter(|(token, _)| vocab.contains(token))
                .map(|(token, count)| (token.to_owned(), *count))
                .collect::<Contexts>();
            (right.to_owned(), kept)
        }).collect::<BTreeMap<String, Contexts>>();
        (left.to_owned(), rights)
    }).collect();

    // 2nd: empty pairs
    let filtered = filtered.into_iter().map(|(left, rights)| {
        (left, rights.into_iter().filter(|(_, contexts)| !contexts.is_empty()).collect::<BTreeMap<String, Contexts>>())
    }).collect::<BTreeMap<String, BTreeMap<String, Contexts>>>();

    // 3rd: empty left tokens
    let filtered = filtered.into_iter().filter(|(_, rights)| !rights.is_empty()).collect();

    ContextCounts(filtered)
}
