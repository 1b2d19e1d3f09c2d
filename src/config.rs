
use crate::context::ExtractionMode;
use crate::errors::{Error, Result};

use serde_json::Value;
use std::{fmt::Display, fs, path::PathBuf};

#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub corpus_file: PathBuf,
    pub output_dir: PathBuf,
    pub pair_files: Vec<PathBuf>,
    pub embedding_file: PathBuf,
    pub stopwords_file: Option<PathBuf>,
    pub model: String,
    pub window_size: usize,
    pub minimum_frequency: usize,
    pub vocabulary_size: Option<usize>,
    pub minimum_frequency_context: usize,
    pub extraction_mode: ExtractionMode,
    pub num_threads: usize,
    pub chunk_size: usize,
    pub compress_cache: bool,
    pub overwrite_cache: bool,
    pub binary: bool,
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using parameters:
        corpus_file: {}
        output_dir: {}
        pair_files: {:?}
        embedding_file: {}
        stopwords_file: {:?}
        model: {}
        window_size: {}
        minimum_frequency: {}
        vocabulary_size: {:?}
        minimum_frequency_context: {}
        extraction_mode: {}
        num_threads: {}
        chunk_size: {}
        compress_cache: {}
        overwrite_cache: {}
        binary: {}",
        self.corpus_file.display(), self.output_dir.display(), self.pair_files, self.embedding_file.display(),
        self.stopwords_file, self.model, self.window_size, self.minimum_frequency, self.vocabulary_size,
        self.minimum_frequency_context, self.extraction_mode, self.num_threads, self.chunk_size,
        self.compress_cache, self.overwrite_cache, self.binary)
    }
}

impl Params {

    pub fn relative_txt(&self) -> PathBuf {
        self.output_dir.join(format!("relative_init.{}.txt", self.model))
    }

    pub fn relative_bin(&self) -> PathBuf {
        self.output_dir.join(format!("relative_init.{}.bin", self.model))
    }

    pub fn line_record_store(&self) -> PathBuf {
        let name = if self.compress_cache { "pairs_context_cache.jsonl.gz" } else { "pairs_context_cache.jsonl" };
        self.output_dir.join(name)
    }
}

pub struct Config {
    params: Params
}

impl Config {

    pub fn get_params(&self) -> Params {
        self.params.clone()
    }

    pub fn new(args: &[String]) -> Result<Config> {

        if args.len() != 2 {
            return Err(Error::Config("input should be a path to json file only".to_string()));
        }

        // parse input json
        let f = fs::File::open(&args[1]).map_err(|e| Error::missing(&args[1], e))?;
        let json: Value = serde_json::from_reader(f)
            .map_err(|e| Error::Config(format!("could not parse parameters file {}: {}", &args[1], e)))?;
        Config::from_json(&json)
    }

    pub fn from_json(json: &Value) -> Result<Config> {

        // validate inputs and output in json
        let corpus_file = required_str(json, "corpus_file")?;
        let output_dir = required_str(json, "output_dir")?;
        let embedding_file = required_str(json, "embedding_file")?;
        let pair_files = match json.get("pair_files") {
            Some(Value::Array(files)) if !files.is_empty() => files
                .iter()
                .map(|file| file.as_str().map(PathBuf::from).ok_or_else(|| invalid("pair_files", "a list of paths")))
                .collect::<Result<Vec<PathBuf>>>()?,
            Some(Value::String(file)) => vec![PathBuf::from(file)],
            _ => return Err(invalid("pair_files", "a non empty list of paths")),
        };

        // handle default vs input parameters
        let stopwords_file = match json.get("stopwords_file") {
            Some(Value::Null) | None => None,
            Some(file) => Some(PathBuf::from(file.as_str().ok_or_else(|| invalid("stopwords_file", "a path"))?)),
        };
        let model = match json.get("model") {
            Some(model) => model.as_str().ok_or_else(|| invalid("model", "a string"))?.to_owned(),
            None => "fasttext".to_string()
        };
        let extraction_mode = match json.get("extraction_mode") {
            Some(mode) => mode.as_str().ok_or_else(|| invalid("extraction_mode", "a string"))?.parse()?,
            None => ExtractionMode::BridgeBetween
        };
        let vocabulary_size = match json.get("vocabulary_size") {
            Some(Value::Null) | None => None,
            Some(_) => Some(optional_usize(json, "vocabulary_size", 0)?)
        };

        let params = Params {
            corpus_file: PathBuf::from(corpus_file),
            output_dir: PathBuf::from(output_dir),
            pair_files,
            embedding_file: PathBuf::from(embedding_file),
            stopwords_file,
            model,
            window_size: positive_usize(json, "window_size", 10)?,
            minimum_frequency: optional_usize(json, "minimum_frequency", 5)?,
            vocabulary_size,
            minimum_frequency_context: optional_usize(json, "minimum_frequency_context", 1)?,
            extraction_mode,
            num_threads: positive_usize(json, "num_threads", 4)?,
            chunk_size: positive_usize(json, "chunk_size", 100_000)?,
            compress_cache: optional_bool(json, "compress_cache", false)?,
            overwrite_cache: optional_bool(json, "overwrite_cache", false)?,
            binary: optional_bool(json, "binary", true)?,
        };

        Ok(Self { params })
    }

}

fn invalid(key: &str, expected: &str) -> Error {
    Error::Config(format!("{} should be {}", key, expected))
}

fn required_str<'a>(json: &'a Value, key: &str) -> Result<&'a str> {
    match json.get(key) {
        Some(value) => value.as_str().ok_or_else(|| invalid(key, "a string")),
        None => Err(Error::Config(format!("{} was not supplied through json", key)))
    }
}

fn optional_usize(json: &Value, key: &str, default: usize) -> Result<usize> {
    match json.get(key) {
        Some(value) => value.as_u64().map(|v| v as usize).ok_or_else(|| invalid(key, "a non negative integer")),
        None => Ok(default)
    }
}

fn positive_usize(json: &Value, key: &str, default: usize) -> Result<usize> {
    match optional_usize(json, key, default)? {
        0 => Err(invalid(key, "a positive integer")),
        value => Ok(value)
    }
}

fn optional_bool(json: &Value, key: &str, default: bool) -> Result<bool> {
    match json.get(key) {
        Some(value) => value.as_bool().ok_or_else(|| invalid(key, "a boolean")),
        None => Ok(default)
    }
}


pub mod files_handling {

    // reading and writing of the pipeline artifacts. Everything that is written goes
    // through a temporary file in the destination directory and is renamed into place,
    // so a checkpoint on disk is always complete.

    use crate::errors::{Error, Result};

    use flate2::read::MultiGzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde::{de::DeserializeOwned, Serialize};
    use std::fs::{self, File};
    use std::io::{self, BufRead, BufReader, BufWriter, Lines, Write};
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn is_gz(path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == "gz")
    }

    /// Opens `path` for buffered reading, decompressing `.gz` files on the fly.
    pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
        let f = File::open(path).map_err(|e| Error::missing(path, e))?;
        if is_gz(path) {
            Ok(Box::new(BufReader::new(MultiGzDecoder::new(f))))
        } else {
            Ok(Box::new(BufReader::new(f)))
        }
    }

    pub fn read_lines(path: &Path) -> Result<Lines<Box<dyn BufRead>>> {
        Ok(open_reader(path)?.lines())
    }

    /// Runs `write` against a temporary file next to `path`, then renames it over `path`.
    /// Output to a `.gz` path is gzip compressed.
    pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let parent_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir)?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let buffered = BufWriter::new(temp_file.as_file_mut());
            if is_gz(path) {
                let mut writer = GzEncoder::new(buffered, Compression::default());
                write(&mut writer)?;
                writer.finish()?.flush()?;
            } else {
                let mut writer = buffered;
                write(&mut writer)?;
                writer.flush()?;
            }
        }
        temp_file.persist(path)?;
        Ok(())
    }

    pub fn read_input<R: ReadFile>(file_path: &Path) -> Result<R> {
        R::read_file(file_path)
    }

    pub fn save_output<S: SaveFile>(file_path: &Path, item: &S) -> Result<()> {
        item.save_file(file_path)
    }

    pub trait ReadFile: Sized {
        fn read_file(file_path: &Path) -> Result<Self>;
    }

    pub trait SaveFile {
        fn save_file(&self, file_path: &Path) -> Result<()>;
    }

    // every checkpoint of the pipeline is a single JSON document
    impl<T: DeserializeOwned> ReadFile for T {
        fn read_file(file_path: &Path) -> Result<Self> {
            let f = open_reader(file_path)?;
            serde_json::from_reader(f).map_err(|e| {
                if e.is_io() {
                    Error::Io(io::Error::from(e))
                } else {
                    Error::corrupt(file_path, None, e)
                }
            })
        }
    }

    impl<T: Serialize> SaveFile for T {
        fn save_file(&self, file_path: &Path) -> Result<()> {
            write_atomically(file_path, |f| {
                serde_json::to_writer(&mut *f, self).map_err(|e| Error::Io(io::Error::from(e)))
            })
        }
    }

    #[cfg(test)]
    mod tests {

        use super::*;
        use std::collections::BTreeMap;
        use std::io::Read;

        #[test]
        fn json_round_trip_through_temp_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested/vocab.json");
            let vocab = vec!["apple".to_string(), "pear".to_string()];
            save_output(&path, &vocab).unwrap();
            let loaded: Vec<String> = read_input(&path).unwrap();
            assert_eq!(loaded, vocab);
            // only the renamed file is left behind
            assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
        }

        #[test]
        fn unparsable_checkpoint_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("pairs_context.json");
            fs::write(&path, "{\"cat\": {\"today\": ").unwrap();
            match read_input::<BTreeMap<String, BTreeMap<String, usize>>>(&path) {
                Err(Error::CorruptCache { .. }) => (),
                other => panic!("expected corrupt cache, got {:?}", other),
            }
        }

        #[test]
        fn missing_checkpoint_names_path() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nope.json");
            match read_input::<Vec<String>>(&path) {
                Err(Error::MissingFile(missing, _)) => assert_eq!(missing, path),
                other => panic!("expected missing file, got {:?}", other),
            }
        }

        #[test]
        fn gz_paths_are_compressed() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("records.jsonl.gz");
            write_atomically(&path, |f| {
                f.write_all(b"first\nsecond\n")?;
                Ok(())
            })
            .unwrap();

            let mut raw = Vec::new();
            File::open(&path).unwrap().read_to_end(&mut raw).unwrap();
            assert_eq!(&raw[..2], &[0x1f, 0x8b]);

            let lines = read_lines(&path).unwrap().collect::<io::Result<Vec<String>>>().unwrap();
            assert_eq!(lines, vec!["first", "second"]);
        }
    }
}


#[cfg(test)]
mod tests {

    use super::Config;
    use crate::context::ExtractionMode;
    use crate::errors::Error;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn defaults_are_filled_in() {
        let json = json!({
            "corpus_file": "cache/wiki.txt",
            "output_dir": "cache",
            "pair_files": ["cache/vocab.txt"],
            "embedding_file": "cache/crawl.vec"
        });
        let params = Config::from_json(&json).unwrap().get_params();
        assert_eq!(params.window_size, 10);
        assert_eq!(params.minimum_frequency, 5);
        assert_eq!(params.minimum_frequency_context, 1);
        assert_eq!(params.vocabulary_size, None);
        assert_eq!(params.extraction_mode, ExtractionMode::BridgeBetween);
        assert_eq!(params.model, "fasttext");
        assert!(params.binary);
        assert_eq!(params.relative_txt(), PathBuf::from("cache/relative_init.fasttext.txt"));
        assert_eq!(params.line_record_store(), PathBuf::from("cache/pairs_context_cache.jsonl"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let json = json!({
            "corpus_file": "wiki.txt.gz",
            "output_dir": "out",
            "pair_files": "pairs.tsv",
            "embedding_file": "glove.txt",
            "model": "glove",
            "window_size": 6,
            "vocabulary_size": 1000,
            "extraction_mode": "window_after",
            "compress_cache": true
        });
        let params = Config::from_json(&json).unwrap().get_params();
        assert_eq!(params.window_size, 6);
        assert_eq!(params.vocabulary_size, Some(1000));
        assert_eq!(params.pair_files, vec![PathBuf::from("pairs.tsv")]);
        assert_eq!(params.extraction_mode, ExtractionMode::WindowAfter);
        assert_eq!(params.relative_bin(), PathBuf::from("out/relative_init.glove.bin"));
        assert_eq!(params.line_record_store(), PathBuf::from("out/pairs_context_cache.jsonl.gz"));
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = json!({
            "corpus_file": "wiki.txt",
            "output_dir": "out",
            "pair_files": ["pairs.tsv"],
            "embedding_file": "glove.txt",
        });

        let mut zero_window = base.clone();
        zero_window["window_size"] = json!(0);
        assert!(matches!(Config::from_json(&zero_window), Err(Error::Config(_))));

        let mut bad_mode = base.clone();
        bad_mode["extraction_mode"] = json!("sideways");
        assert!(matches!(Config::from_json(&bad_mode), Err(Error::Config(_))));

        let mut no_corpus = base.clone();
        no_corpus.as_object_mut().unwrap().remove("corpus_file");
        assert!(matches!(Config::from_json(&no_corpus), Err(Error::Config(_))));
    }

    #[test]
    fn wrong_argument_count() {
        assert!(matches!(Config::new(&["relative_init".to_string()]), Err(Error::Config(_))));
    }

    #[test]
    fn unparsable_parameters_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "{\"corpus_file\": ").unwrap();
        let args = vec!["relative_init".to_string(), path.display().to_string()];
        match Config::new(&args) {
            Err(Error::Config(message)) => assert!(message.contains("params.json")),
            other => panic!("expected a config error, got {:?}", other.map(|c| c.get_params())),
        }
    }
}
