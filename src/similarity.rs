
use crate::embedding::KeyedVectors;
use crate::errors::{Error, Result};
use crate::relative::pair_key;

use ndarray::prelude::*;

/// Cosine similarity between relation vectors.
pub struct Similarity {
    kv: KeyedVectors,
    w: Array2<f32>,
}

impl Similarity {

    pub fn new(kv: KeyedVectors) -> Similarity {

        // normalize w so each row has an l2 norm of 1, zero rows stay zero
        let mut w = kv.vectors().clone();
        for mut row in w.axis_iter_mut(Axis(0)) {
            let norm = row.mapv(|a| a.powi(2)).sum().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|a| a / norm);
            }
        }

        Self { kv, w }
    }

    /// Accepts either a `left__right` key or the two tokens of the pair.
    pub fn extract_vec_from_pair(&self, left: &str, right: Option<&str>) -> Result<Array1<f32>> {
        let key = match right {
            Some(right) => pair_key(left, right),
            None => left.to_string(),
        };
        match self.kv.index_of(&key) {
            Some(i) => Ok(self.w.row(i).to_owned()),
            None => Err(Error::UnknownToken(key)),
        }
    }

    /// The `k` keys with the highest cosine similarity to `vec`, leaving out `exclude`.
    pub fn find_k_most_similar(&self, vec: &Array1<f32>, k: usize, exclude: Option<&str>) -> Vec<(String, f32)> {

        let norm = vec.mapv(|a| a.powi(2)).sum().sqrt();
        let scores = if norm > 0.0 { self.w.dot(vec) / norm } else { self.w.dot(vec) };
        let mut indexed_scores: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();

        // sort by most similar in descending order
        indexed_scores.sort_by(|(_i, s), (_j, t)| t.total_cmp(s));

        indexed_scores
            .into_iter()
            .map(|(index, score)| (self.kv.keys()[index].to_string(), score))
            .filter(|(key, _)| Some(key.as_str()) != exclude)
            .take(k)
            .collect()
    }

}


#[cfg(test)]
mod tests {

    use super::Similarity;
    use crate::embedding::KeyedVectors;
    use crate::errors::Error;
    use ndarray::array;

    fn similarity() -> Similarity {
        let keys = vec!["cat__dog".to_string(), "owl__mouse".to_string(), "sun__moon".to_string()];
        let w = array![[1.0, 0.0], [2.0, 0.2], [0.0, -3.0]];
        Similarity::new(KeyedVectors::new(keys, w).unwrap())
    }

    #[test]
    fn nearest_pairs() {
        let sim = similarity();
        let vec = sim.extract_vec_from_pair("cat", Some("dog")).unwrap();
        let nearest = sim.find_k_most_similar(&vec, 2, Some("cat__dog"));
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].0, "owl__mouse");
        assert_eq!(nearest[1].0, "sun__moon");
        assert!(nearest[0].1 > 0.9 && nearest[0].1 <= 1.0);
        assert!(nearest[1].1.abs() < 1e-6);
    }

    #[test]
    fn unknown_pair() {
        let sim = similarity();
        assert!(sim.extract_vec_from_pair("owl__mouse", None).is_ok());
        assert!(matches!(sim.extract_vec_from_pair("cat", Some("owl")), Err(Error::UnknownToken(_))));
    }
}
