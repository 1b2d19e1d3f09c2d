
use crate::errors::{Error, Result};
use crate::word2vec;

use log::info;
use ndarray::{Array2, ArrayView1, CowArray, Ix1};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// A pretrained word embedding: one vector of a fixed dimension per known token.
pub trait EmbeddingLookup {

    fn dimension(&self) -> usize;

    /// The vector of `token`, or `None` when the model does not know it.
    fn lookup(&self, token: &str) -> Option<CowArray<'_, f32, Ix1>>;
}

/// Vectors kept in one matrix, rows in file order, with a token to row index.
#[derive(Clone, Debug)]
pub struct KeyedVectors {
    keys: Vec<String>,
    t2i: HashMap<String, usize>,
    vectors: Array2<f32>,
}

impl KeyedVectors {

    pub fn new(keys: Vec<String>, vectors: Array2<f32>) -> Result<KeyedVectors> {
        if keys.len() != vectors.dim().0 {
            return Err(Error::DimensionMismatch { key: "<rows>".to_string(), expected: keys.len(), found: vectors.dim().0 });
        }
        // a repeated key keeps its first vector
        let mut t2i: HashMap<String, usize> = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            t2i.entry(key.to_owned()).or_insert(i);
        }
        Ok(KeyedVectors { keys, t2i, vectors })
    }

    /// Loads a word2vec binary file when the path ends in `.bin`, a text file otherwise.
    pub fn load(file_path: &Path) -> Result<KeyedVectors> {
        let timer = Instant::now();
        let (keys, vectors) = match file_path.extension() {
            Some(ext) if ext == "bin" => word2vec::read_binary(file_path)?,
            _ => word2vec::read_text(file_path)?,
        };
        info!("loaded {} vectors of dimension {} from {}, took {} seconds",
            keys.len(), vectors.dim().1, file_path.display(), timer.elapsed().as_secs());
        KeyedVectors::new(keys, vectors)
    }

    pub fn get(&self, key: &str) -> Option<ArrayView1<'_, f32>> {
        self.t2i.get(key).map(|i| self.vectors.row(*i))
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.t2i.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl EmbeddingLookup for KeyedVectors {

    fn dimension(&self) -> usize {
        self.vectors.dim().1
    }

    fn lookup(&self, token: &str) -> Option<CowArray<'_, f32, Ix1>> {
        self.get(token).map(CowArray::from)
    }
}


#[cfg(test)]
mod tests {

    use super::{EmbeddingLookup, KeyedVectors};
    use crate::errors::Error;
    use ndarray::{array, Array2};
    use std::fs;

    #[test]
    fn lookup_by_token() {
        let keys = vec!["cat".to_string(), "new york".to_string(), "cat".to_string()];
        let vectors = array![[1.0, 0.0], [0.0, 1.0], [5.0, 5.0]];
        let kv = KeyedVectors::new(keys, vectors).unwrap();
        assert_eq!(kv.dimension(), 2);
        assert_eq!(kv.lookup("new york").unwrap(), array![0.0f32, 1.0]);
        assert_eq!(kv.lookup("cat").unwrap(), array![1.0f32, 0.0]);
        assert!(kv.lookup("new_york").is_none());
        assert_eq!(kv.len(), 3);
        assert!(!kv.is_empty());
    }

    #[test]
    fn rows_must_match_keys() {
        let result = KeyedVectors::new(vec!["cat".to_string()], Array2::zeros((2, 3)));
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn loads_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.vec");
        fs::write(&path, "2 3\nquietly 1 0 0\nsat_on 0 1 0\n").unwrap();
        let kv = KeyedVectors::load(&path).unwrap();
        assert_eq!(kv.keys(), &["quietly".to_string(), "sat_on".to_string()]);
        assert_eq!(kv.get("sat_on").unwrap(), array![0.0f32, 1.0, 0.0]);
        assert_eq!(kv.index_of("quietly"), Some(0));
    }
}
