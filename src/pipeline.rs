
// imports
use crate::aggregate::{filter_vocab, write_record, ContextAggregator, ContextCounts};
use crate::checkpoint::Checkpoint;
use crate::config::files_handling::{self, read_input, save_output, write_atomically};
use crate::config::{Config, Params};
use crate::context::{ContextExtractor, ScanStats};
use crate::embedding::{EmbeddingLookup, KeyedVectors};
use crate::errors::Result;
use crate::pairs::{read_pair_file, PairIndex};
use crate::relative::{pair_key, RelativeVectorReducer};
use crate::vocab::{load_stopwords, Vocabulary, VocabularyBuilder};
use crate::word2vec;

use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// Everything a run needs, set up once at program start.
pub struct PipelineContext {
    params: Params,
    stopwords: HashSet<String>,
    pool: ThreadPool,
}

/// The checkpoints of one parameter set, upstream fingerprints chained into downstream ones.
struct Checkpoints {
    vocab: Checkpoint,
    pairs: Checkpoint,
    records: Checkpoint,
    aggregated: Checkpoint,
    filtered: Checkpoint,
    relative_txt: Checkpoint,
    relative_bin: Checkpoint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub relative_txt: PathBuf,
    pub relative_bin: Option<PathBuf>,
    /// `None` when the vector file was reused from an earlier run
    pub written: Option<usize>,
}

pub fn initialize(config: &Config) -> Result<PipelineContext> {

    let params = config.get_params();
    info!("{}", params);

    fs::create_dir_all(&params.output_dir)?;
    let stopwords = match &params.stopwords_file {
        Some(file) => load_stopwords(file)?,
        None => HashSet::new(),
    };
    let pool = ThreadPoolBuilder::new().num_threads(params.num_threads).build()?;

    Ok(PipelineContext { params, stopwords, pool })
}

impl PipelineContext {

    fn checkpoints(&self) -> Checkpoints {

        let p = &self.params;
        let dir = &p.output_dir;

        // the list itself, sorted: a different list under the same file name is a different vocabulary
        let mut stopwords: Vec<&String> = self.stopwords.iter().collect();
        stopwords.sort_unstable();

        let vocab = Checkpoint::new(dir.join("vocab.json"), "vocabulary", json!({
            "corpus_file": p.corpus_file,
            "minimum_frequency": p.minimum_frequency,
            "vocabulary_size": p.vocabulary_size,
            "stopwords_file": p.stopwords_file,
            "stopwords": stopwords,
        }));
        let pairs = Checkpoint::new(dir.join("pair_vocab.json"), "pair index", json!({
            "pair_files": p.pair_files,
        }));
        let records = Checkpoint::new(p.line_record_store(), "line records", json!({
            "corpus_file": p.corpus_file,
            "window_size": p.window_size,
            "extraction_mode": p.extraction_mode,
            "pairs": pairs.fingerprint(),
        }));
        let aggregated = Checkpoint::new(dir.join("pairs_context_org.json"), "aggregation", json!({
            "records": records.fingerprint(),
        }));
        let filtered = Checkpoint::new(dir.join("pairs_context.json"), "vocabulary filter", json!({
            "aggregated": aggregated.fingerprint(),
            "vocab": vocab.fingerprint(),
        }));
        let relative_txt = Checkpoint::new(p.relative_txt(), "relative vectors", json!({
            "filtered": filtered.fingerprint(),
            "embedding_file": p.embedding_file,
            "minimum_frequency_context": p.minimum_frequency_context,
        }));
        let relative_bin = Checkpoint::new(p.relative_bin(), "binary relative vectors", json!({
            "relative_txt": relative_txt.fingerprint(),
        }));

        Checkpoints { vocab, pairs, records, aggregated, filtered, relative_txt, relative_bin }
    }

    fn vocabulary(&self, cps: &Checkpoints) -> Result<Vocabulary> {
        if cps.vocab.reusable(self.params.overwrite_cache)? {
            return read_input(cps.vocab.path());
        }
        let timer = Instant::now();
        let builder = VocabularyBuilder::new(self.stopwords.clone(), self.params.minimum_frequency, self.params.vocabulary_size);
        let vocab = builder.run(&self.params.corpus_file)?;
        save_output(cps.vocab.path(), &vocab)?;
        cps.vocab.commit()?;
        info!("built vocabulary of {} tokens, took {} seconds", vocab.len(), timer.elapsed().as_secs());
        Ok(vocab)
    }

    fn pair_index(&self, cps: &Checkpoints) -> Result<PairIndex> {
        if cps.pairs.reusable(self.params.overwrite_cache)? {
            return read_input(cps.pairs.path());
        }
        let mut raw_pairs = Vec::new();
        for file in &self.params.pair_files {
            raw_pairs.extend(read_pair_file(file)?);
        }
        let index = PairIndex::build(raw_pairs);
        save_output(cps.pairs.path(), &index)?;
        cps.pairs.commit()?;
        info!("built pair index over {} tokens", index.len());
        Ok(index)
    }

    fn line_records(&self, cps: &Checkpoints) -> Result<()> {
        if cps.records.reusable(self.params.overwrite_cache)? {
            return Ok(());
        }
        let pair_index = self.pair_index(cps)?;

        let timer = Instant::now();
        info!("extracting contexts (this can take a few hours depending on the size of the corpus)");
        let extractor = ContextExtractor::new(&pair_index, self.params.window_size, self.params.extraction_mode);
        let lines = files_handling::read_lines(&self.params.corpus_file)?;
        let mut stats = ScanStats::default();
        write_atomically(cps.records.path(), |w| {
            stats = extractor.scan(lines, &self.pool, self.params.chunk_size, |record| write_record(&mut *w, &record))?;
            Ok(())
        })?;
        cps.records.commit()?;

        info!("scanned {} lines, {} with pairs, took {} seconds", stats.lines, stats.records, timer.elapsed().as_secs());
        Ok(())
    }

    fn aggregated_counts(&self, cps: &Checkpoints) -> Result<ContextCounts> {
        if cps.aggregated.reusable(self.params.overwrite_cache)? {
            return read_input(cps.aggregated.path());
        }
        self.line_records(cps)?;

        let timer = Instant::now();
        info!("aggregate over cache");
        let counts = ContextAggregator::run(cps.records.path())?;
        save_output(cps.aggregated.path(), &counts)?;
        cps.aggregated.commit()?;
        info!("aggregated {} pairs, {} contexts, took {} seconds", counts.n_pairs(), counts.n_triples(), timer.elapsed().as_secs());
        Ok(counts)
    }

    fn filtered_counts(&self, cps: &Checkpoints) -> Result<ContextCounts> {
        if cps.filtered.reusable(self.params.overwrite_cache)? {
            return read_input(cps.filtered.path());
        }
        let counts = self.aggregated_counts(cps)?;
        let vocab = self.vocabulary(cps)?;

        info!("filtering vocab");
        let filtered = filter_vocab(&counts, &vocab);
        save_output(cps.filtered.path(), &filtered)?;
        cps.filtered.commit()?;
        info!("kept {} of {} pairs after filtering", filtered.n_pairs(), counts.n_pairs());
        Ok(filtered)
    }

    fn relative_vectors<E, F>(&self, cps: &Checkpoints, load_embedding: F) -> Result<Option<usize>>
    where
        E: EmbeddingLookup,
        F: FnOnce() -> Result<E>,
    {
        if cps.relative_txt.reusable(self.params.overwrite_cache)? {
            return Ok(None);
        }
        let counts = self.filtered_counts(cps)?;

        info!("loading embeddings");
        let embedding = load_embedding()?;

        let timer = Instant::now();
        info!("computing relative-init vectors: {}", cps.relative_txt.path().display());
        let reducer = RelativeVectorReducer::new(&embedding, self.params.minimum_frequency_context as u64);
        let entries = reducer.reduce(&counts).map(|(left, right, vector)| (pair_key(&left, &right), vector));
        let written = word2vec::write_text(cps.relative_txt.path(), embedding.dimension(), entries)?;
        cps.relative_txt.commit()?;

        info!("{} pairs without qualifying context, {} context tokens unknown to the embedding",
            reducer.omitted(), reducer.misses());
        info!("wrote {} relative vectors, took {} seconds", written, timer.elapsed().as_secs());
        Ok(Some(written))
    }

    fn binary(&self, cps: &Checkpoints) -> Result<()> {
        if cps.relative_bin.reusable(self.params.overwrite_cache)? {
            return Ok(());
        }
        info!("producing binary file");
        word2vec::text_to_binary(cps.relative_txt.path(), cps.relative_bin.path())?;
        cps.relative_bin.commit()?;
        Ok(())
    }

    /// Runs every stage, reusing the checkpoints built with the same parameters.
    pub fn run(&self) -> Result<RunSummary> {
        let embedding_file = self.params.embedding_file.clone();
        self.run_with(|| KeyedVectors::load(&embedding_file))
    }

    /// Like `run`, with the embedding supplied by `load_embedding`. It is only called when
    /// the vectors have to be computed.
    pub fn run_with<E, F>(&self, load_embedding: F) -> Result<RunSummary>
    where
        E: EmbeddingLookup,
        F: FnOnce() -> Result<E>,
    {
        let timer = Instant::now();
        let cps = self.checkpoints();

        let written = self.relative_vectors(&cps, load_embedding)?;
        if self.params.binary {
            self.binary(&cps)?;
        }

        info!("finished, took {} seconds", timer.elapsed().as_secs());
        Ok(RunSummary {
            relative_txt: cps.relative_txt.path().to_path_buf(),
            relative_bin: if self.params.binary { Some(cps.relative_bin.path().to_path_buf()) } else { None },
            written,
        })
    }

}


#[cfg(test)]
mod tests {

    use super::{initialize, RunSummary};
    use crate::aggregate::ContextCounts;
    use crate::config::files_handling::read_input;
    use crate::config::Config;
    use crate::errors::Error;
    use crate::vocab::Vocabulary;
    use crate::word2vec;
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;

    fn setup(dir: &Path) -> Value {
        let corpus = dir.join("corpus.txt");
        fs::write(&corpus, "the cat sat_on the_mat quietly today\na cat sat_on the_mat today\nno pairs on this line\n").unwrap();
        let pairs = dir.join("vocab.txt");
        fs::write(&pairs, "Cat\tToday\n").unwrap();
        let stopwords = dir.join("stopwords_en.txt");
        fs::write(&stopwords, "the\na\n").unwrap();
        let embedding = dir.join("embedding.txt");
        fs::write(&embedding, "3 3\nsat on 1 0 0\nthe mat 0 1 0\nquietly 0 0 1\n").unwrap();

        json!({
            "corpus_file": corpus,
            "output_dir": dir.join("cache"),
            "pair_files": [pairs],
            "stopwords_file": stopwords,
            "embedding_file": embedding,
            "model": "test",
            "window_size": 6,
            "minimum_frequency": 1,
            "num_threads": 2,
            "chunk_size": 2
        })
    }

    fn run(json: &Value) -> Result<RunSummary, Error> {
        let config = Config::from_json(json)?;
        initialize(&config)?.run()
    }

    fn read_vectors(path: &Path) -> Vec<(String, Vec<f32>)> {
        let (keys, vectors) = word2vec::read_text(path).unwrap();
        keys.into_iter().zip(vectors.rows().into_iter().map(|row| row.to_vec())).collect()
    }

    fn assert_close(found: &[f32], expected: &[f32]) {
        assert_eq!(found.len(), expected.len());
        for (f, e) in found.iter().zip(expected) {
            assert!((f - e).abs() < 1e-6, "{:?} != {:?}", found, expected);
        }
    }

    #[test]
    fn staged_run_and_checkpoint_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let json = setup(dir.path());
        let cache = dir.path().join("cache");

        let summary = run(&json).unwrap();
        assert_eq!(summary.written, Some(1));
        assert_eq!(summary.relative_txt, cache.join("relative_init.test.txt"));

        // (2 * sat_on + 2 * the_mat + quietly) / 3
        let vectors = read_vectors(&summary.relative_txt);
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].0, "cat__today");
        assert_close(&vectors[0].1, &[2.0 / 3.0, 2.0 / 3.0, 1.0 / 3.0]);
        let header = fs::read_to_string(&summary.relative_txt).unwrap().lines().next().unwrap().to_string();
        assert_eq!(header, "1 3");

        let (bin_keys, bin_vectors) = word2vec::read_binary(summary.relative_bin.as_ref().unwrap()).unwrap();
        assert_eq!(bin_keys, vec!["cat__today"]);
        assert_close(bin_vectors.row(0).as_slice().unwrap(), &vectors[0].1);

        // intermediate artifacts
        let vocab: Vocabulary = read_input(&cache.join("vocab.json")).unwrap();
        assert!(vocab.contains("sat_on") && !vocab.contains("the"));
        let counts: ContextCounts = read_input(&cache.join("pairs_context.json")).unwrap();
        assert_eq!(counts.get("cat", "today").unwrap()["sat_on"], 2);
        let records = fs::read_to_string(cache.join("pairs_context_cache.jsonl")).unwrap();
        assert_eq!(records.lines().count(), 2);
        assert!(cache.join("pairs_context_org.json.meta.json").exists());

        // everything is reused: the corpus is not needed anymore
        fs::remove_file(dir.path().join("corpus.txt")).unwrap();
        let again = run(&json).unwrap();
        assert_eq!(again.written, None);

        // a reducer parameter only recomputes the vectors, from the filtered checkpoint
        let mut stricter = json.clone();
        stricter["minimum_frequency_context"] = json!(2);
        let summary = run(&stricter).unwrap();
        assert_eq!(summary.written, Some(1));
        assert_close(&read_vectors(&summary.relative_txt)[0].1, &[1.0, 1.0, 0.0]);
        let (_, bin_vectors) = word2vec::read_binary(summary.relative_bin.as_ref().unwrap()).unwrap();
        assert_close(bin_vectors.row(0).as_slice().unwrap(), &[1.0, 1.0, 0.0]);

        // a scan parameter invalidates the line records, which need the corpus
        let mut narrower = stricter.clone();
        narrower["window_size"] = json!(5);
        match run(&narrower) {
            Err(Error::MissingFile(path, _)) => assert_eq!(path, dir.path().join("corpus.txt")),
            other => panic!("expected the corpus to be missing, got {:?}", other),
        }
    }

    #[test]
    fn new_stopwords_rebuild_the_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let json = setup(dir.path());
        let cache = dir.path().join("cache");
        run(&json).unwrap();

        // same file, same number of words, different list
        fs::write(dir.path().join("stopwords_en.txt"), "the\nquietly\n").unwrap();
        let summary = run(&json).unwrap();
        assert_eq!(summary.written, Some(1));

        let vocab: Vocabulary = read_input(&cache.join("vocab.json")).unwrap();
        assert!(!vocab.contains("quietly"));
        assert!(vocab.contains("a"));
        // (2 * sat_on + 2 * the_mat) / 2
        assert_close(&read_vectors(&summary.relative_txt)[0].1, &[1.0, 1.0, 0.0]);
    }

    #[test]
    fn corrupted_records_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let json = setup(dir.path());
        run(&json).unwrap();

        // break the line-record store and force everything after it to be rebuilt
        let cache = dir.path().join("cache");
        fs::write(cache.join("pairs_context_cache.jsonl"), "{\"cat\": {\"today\": [\"sat_on\", \"the_mat\"]}}\nnot json\n").unwrap();
        fs::remove_file(cache.join("pairs_context_org.json")).unwrap();
        fs::remove_file(cache.join("pairs_context.json")).unwrap();
        fs::remove_file(cache.join("relative_init.test.txt")).unwrap();

        match run(&json) {
            Err(Error::CorruptCache { line, .. }) => assert_eq!(line, Some(2)),
            other => panic!("expected a corrupt cache, got {:?}", other),
        }
    }

    #[test]
    fn window_after_mode_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut json = setup(dir.path());
        json["extraction_mode"] = json!("window_after");
        json["window_size"] = json!(2);
        json["binary"] = json!(false);
        json["compress_cache"] = json!(true);

        // "cat" finds "today" only in the second line (three positions away), nothing follows it
        let summary = run(&json).unwrap();
        assert_eq!(summary.written, Some(0));
        assert_eq!(summary.relative_bin, None);
        assert!(dir.path().join("cache/pairs_context_cache.jsonl.gz").exists());
        assert_eq!(fs::read_to_string(&summary.relative_txt).unwrap(), "0 3\n");
    }
}
