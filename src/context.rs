
// imports
use crate::errors::{Error, Result};
use crate::pairs::{normalize, PairIndex};
use crate::vocab::{tokenize, PROGRESS_EVERY};

use log::info;
use rayon::{prelude::*, ThreadPool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::io;
use std::str::FromStr;

/// Where the context of a matched pair is taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// the tokens strictly between the two pair members
    BridgeBetween,
    /// the tokens following the second pair member
    WindowAfter,
}

impl Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMode::BridgeBetween => write!(f, "bridge_between"),
            ExtractionMode::WindowAfter => write!(f, "window_after"),
        }
    }
}

impl FromStr for ExtractionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bridge_between" => Ok(ExtractionMode::BridgeBetween),
            "window_after" => Ok(ExtractionMode::WindowAfter),
            other => Err(Error::Config(format!("unknown extraction_mode {}", other))),
        }
    }
}

/// The contexts found in one corpus line: left token -> right token -> context tokens.
/// Tokens are kept in their corpus form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineRecord(pub BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl LineRecord {

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Vec<String>>)> {
        self.0.iter()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub lines: usize,
    pub records: usize,
}

pub struct ContextExtractor<'a> {
    pair_index: &'a PairIndex,
    window_size: usize,
    mode: ExtractionMode,
}

impl<'a> ContextExtractor<'a> {

    pub fn new(pair_index: &'a PairIndex, window_size: usize, mode: ExtractionMode) -> Self {
        Self { pair_index, window_size, mode }
    }

    pub fn extract_line(&self, line: &str) -> LineRecord {
        self.extract(&tokenize(line))
    }

    pub fn extract(&self, tokens: &[&str]) -> LineRecord {

        let normalized: Vec<_> = tokens.iter().map(|tok| normalize(tok)).collect();
        let mut record: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();

        for i in 0..tokens.len() {

            let Some(partners) = self.pair_index.partners(&normalized[i]) else { continue };
            let contexts = match self.mode {
                ExtractionMode::BridgeBetween => self.bridges(i, tokens, &normalized, |right| partners.contains(right)),
                ExtractionMode::WindowAfter => self.windows_after(i, tokens, &normalized, |right| partners.contains(right)),
            };
            if contexts.is_empty() {
                continue;
            }

            match self.mode {
                // a later occurrence of the same left token replaces the earlier one
                ExtractionMode::BridgeBetween => { record.insert(tokens[i].to_string(), contexts); }
                // every occurrence counts
                ExtractionMode::WindowAfter => {
                    let merged = record.entry(tokens[i].to_string()).or_default();
                    for (right, context) in contexts {
                        merged.entry(right).or_default().extend(context);
                    }
                }
            }
        }

        LineRecord(record)
    }

    fn bridges<F>(&self, i: usize, tokens: &[&str], normalized: &[std::borrow::Cow<str>], admits: F) -> BTreeMap<String, Vec<String>>
    where
        F: Fn(&str) -> bool,
    {
        // adjacent tokens have nothing between them, the scan starts at i + 2
        let mut contexts: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let last = i.saturating_add(self.window_size).min(tokens.len().saturating_sub(1));

        for j in i + 2..=last {
            if !admits(&*normalized[j]) || contexts.contains_key(tokens[j]) {
                continue;
            }
            let bridge: Vec<String> = tokens[i + 1..j]
                .iter()
                .filter(|tok| tok.chars().count() > 1)
                .map(|tok| tok.to_string())
                .collect();
            if bridge.len() < 2 {
                continue;
            }
            contexts.insert(tokens[j].to_string(), bridge);
        }
        contexts
    }

    fn windows_after<F>(&self, i: usize, tokens: &[&str], normalized: &[std::borrow::Cow<str>], admits: F) -> BTreeMap<String, Vec<String>>
    where
        F: Fn(&str) -> bool,
    {
        let mut contexts: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let n = tokens.len();
        let last = i.saturating_add(self.window_size).min(n.saturating_sub(1));

        for j in i + 1..=last {
            if !admits(&*normalized[j]) {
                continue;
            }
            let end = j.saturating_add(self.window_size).min(n - 1);
            let window: Vec<String> = tokens[j + 1..=end.max(j)]
                .iter()
                .filter(|tok| !tok.is_empty())
                .map(|tok| tok.to_string())
                .collect();
            if window.is_empty() {
                continue;
            }
            contexts.entry(tokens[j].to_string()).or_default().extend(window);
        }
        contexts
    }

    /// Extracts every line of `lines`, `chunk_size` lines at a time on `pool`, and hands the
    /// non-empty records to `sink` in corpus order.
    pub fn scan<I, F>(&self, lines: I, pool: &ThreadPool, chunk_size: usize, mut sink: F) -> Result<ScanStats>
    where
        I: IntoIterator<Item = io::Result<String>>,
        F: FnMut(LineRecord) -> Result<()>,
    {
        let mut stats = ScanStats::default();
        let mut lines = lines.into_iter();
        let mut chunk: Vec<String> = Vec::with_capacity(chunk_size);

        loop {
            chunk.clear();
            for line in lines.by_ref().take(chunk_size) {
                chunk.push(line?);
            }
            if chunk.is_empty() {
                break;
            }

            let records: Vec<LineRecord> = pool.install(|| {
                chunk.par_iter().map(|line| self.extract_line(line)).collect()
            });

            for record in records {
                stats.lines += 1;
                if stats.lines % PROGRESS_EVERY == 0 {
                    info!("contexts: scanned {} lines, {} with pairs", stats.lines, stats.records);
                }
                if !record.is_empty() {
                    stats.records += 1;
                    sink(record)?;
                }
            }
        }

        Ok(stats)
    }

}
