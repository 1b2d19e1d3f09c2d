
// imports
use crate::aggregate::{ContextCounts, Contexts};
use crate::embedding::EmbeddingLookup;
use crate::pairs::normalize;

use ndarray::Array1;
use std::cell::Cell;
use std::collections::BTreeMap;

/// Separator between the two tokens of a pair in the vector file keys.
pub const PAIR_SEPARATOR: &str = "__";

pub fn pair_key(left: &str, right: &str) -> String {
    [left, right].join(PAIR_SEPARATOR)
}

/// Turns the contexts of every pair into one vector.
///
/// The vector of a pair is `sum(count * embedding) / n`, where the sum runs over the context
/// tokens seen at least `minimum_frequency_context` times that the embedding knows, and `n` is
/// the number of such tokens (not the sum of their counts). Pairs without any are left out.
pub struct RelativeVectorReducer<'a, E: EmbeddingLookup> {
    lookup: &'a E,
    minimum_frequency_context: u64,
    misses: Cell<usize>,
    omitted: Cell<usize>,
}

impl<'a, E: EmbeddingLookup> RelativeVectorReducer<'a, E> {

    pub fn new(lookup: &'a E, minimum_frequency_context: u64) -> Self {
        Self { lookup, minimum_frequency_context, misses: Cell::new(0), omitted: Cell::new(0) }
    }

    pub fn dimension(&self) -> usize {
        self.lookup.dimension()
    }

    /// Context tokens the embedding did not know, so far.
    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    /// Pairs left out for lack of qualifying context, so far.
    pub fn omitted(&self) -> usize {
        self.omitted.get()
    }

    pub fn reduce_pair(&self, contexts: &Contexts) -> Option<Array1<f32>> {

        let mut vector_pair: Array1<f32> = Array1::zeros(self.dimension());
        let mut cont_pair: usize = 0;

        for (token_co, freq) in contexts {
            if *freq < self.minimum_frequency_context {
                continue;
            }
            let Some(token_co_vector) = self.lookup.lookup(&normalize(token_co)) else {
                self.misses.set(self.misses.get() + 1);
                continue;
            };
            vector_pair.scaled_add(*freq as f32, &token_co_vector);
            cont_pair += 1;
        }

        if cont_pair == 0 {
            self.omitted.set(self.omitted.get() + 1);
            return None;
        }
        Some(vector_pair / cont_pair as f32)
    }

    /// Streams `(left, right, vector)` for every pair that gets a vector, in key order.
    pub fn reduce<'c>(&'c self, counts: &'c ContextCounts) -> impl Iterator<Item = (String, String, Array1<f32>)> + 'c {
        counts.pairs().filter_map(move |(left, right, contexts)| {
            self.reduce_pair(contexts).map(|vector| (left.to_string(), right.to_string(), vector))
        })
    }

    pub fn reduce_all(&self, counts: &ContextCounts) -> BTreeMap<(String, String), Array1<f32>> {
        self.reduce(counts).map(|(left, right, vector)| ((left, right), vector)).collect()
    }

}
