
use crate::config::files_handling;
use crate::errors::{Error, Result};

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Corpus tokens join multi-word units with `_`, pair datasets with a space.
/// Every comparison between the two goes through this.
pub fn normalize(token: &str) -> Cow<'_, str> {
    if token.contains('_') {
        Cow::Owned(token.replace('_', " "))
    } else {
        Cow::Borrowed(token)
    }
}

/// Left token to the set of right tokens it is paired with. Every pair is stored in both
/// directions, keys and partners are lowercase and space-joined.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct PairIndex(HashMap<String, HashSet<String>>);

impl PairIndex {

    pub fn build<I, A, B>(raw_pairs: I) -> PairIndex
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut index: HashMap<String, HashSet<String>> = HashMap::new();
        for (a, b) in raw_pairs {
            let a = normalize(&a.as_ref().to_lowercase()).into_owned();
            let b = normalize(&b.as_ref().to_lowercase()).into_owned();
            index.entry(b.clone()).or_default().insert(a.clone());
            index.entry(a).or_default().insert(b);
        }
        PairIndex(index)
    }

    pub fn partners(&self, left: &str) -> Option<&HashSet<String>> {
        self.0.get(left)
    }

    pub fn admits(&self, left: &str, right: &str) -> bool {
        self.0.get(left).map_or(false, |partners| partners.contains(right))
    }

    /// Number of distinct left tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Vec<String>>> for PairIndex {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        PairIndex(map.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect())
    }
}

impl From<PairIndex> for BTreeMap<String, Vec<String>> {
    fn from(index: PairIndex) -> Self {
        index.0.into_iter().map(|(k, v)| {
            let mut partners = v.into_iter().collect::<Vec<String>>();
            partners.sort();
            (k, partners)
        }).collect()
    }
}

/// Reads word pairs from a dataset file.
///
/// `.jsonl` files are analogy questions (`{"stem": [a, b], "choice": [[a, b], ...]}`),
/// every pair in the stem and the choices is taken. Anything else is read as one
/// tab-separated pair per line. Lines of any other shape are skipped.
pub fn read_pair_file(file_path: &Path) -> Result<Vec<(String, String)>> {
    let analogy = file_path.extension().map_or(false, |ext| ext == "jsonl");
    let mut pairs = Vec::new();

    for (n, line) in files_handling::read_lines(file_path)?.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if analogy {
            let json: Value = serde_json::from_str(&line).map_err(|e| Error::corrupt(file_path, Some(n + 1), e))?;
            pairs.extend(json.get("stem").and_then(as_pair));
            if let Some(Value::Array(choices)) = json.get("choice") {
                pairs.extend(choices.iter().filter_map(as_pair));
            }
        } else {
            let mut fields = line.split('\t');
            if let (Some(a), Some(b)) = (fields.next(), fields.next()) {
                pairs.push((a.trim().to_string(), b.trim().to_string()));
            }
        }
    }

    info!("read {} pairs from {}", pairs.len(), file_path.display());
    Ok(pairs)
}

fn as_pair(value: &Value) -> Option<(String, String)> {
    match value.as_array()?.as_slice() {
        [a, b] => Some((a.as_str()?.to_string(), b.as_str()?.to_string())),
        _ => None,
    }
}
