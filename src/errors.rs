//
// Errors
//
use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::result;

/// Type alias for pipeline errors
pub type Result<X> = result::Result<X, Error>;

/// Everything that can abort a pipeline run.
///
/// Embedding lookup misses and pairs without qualifying context are not
/// errors, they are skipped where they happen.
#[derive(Debug)]
pub enum Error {
    MissingFile(PathBuf, io::Error),
    Io(io::Error),
    CorruptCache {
        path: PathBuf,
        line: Option<usize>,
        source: serde_json::Error,
    },
    MalformedVectors {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    DimensionMismatch {
        key: String,
        expected: usize,
        found: usize,
    },
    Config(String),
    UnknownToken(String),
}

impl Error {
    /// Wraps the failure to open a required input, keeping its path.
    pub fn missing<P: Into<PathBuf>>(path: P, err: io::Error) -> Error {
        Error::MissingFile(path.into(), err)
    }

    pub fn corrupt<P: Into<PathBuf>>(path: P, line: Option<usize>, source: serde_json::Error) -> Error {
        Error::CorruptCache { path: path.into(), line, source }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::MissingFile(ref path, ref err) => write!(
                f,
                "The file {} must already exist at this point but there was a problem opening it. \
                Wrong path? Maybe missed a step? The OS error was: {}",
                path.display(),
                err
            ),
            Error::Io(ref err) => write!(f, "IO error: {}", err),
            Error::CorruptCache { ref path, line: Some(line), ref source } => {
                write!(f, "Corrupted cache {} at line {}: {}", path.display(), line, source)
            }
            Error::CorruptCache { ref path, line: None, ref source } => {
                write!(f, "Corrupted cache {}: {}", path.display(), source)
            }
            Error::MalformedVectors { ref path, line, ref reason } => {
                write!(f, "Malformed vector file {} at line {}: {}", path.display(), line, reason)
            }
            Error::DimensionMismatch { ref key, expected, found } => write!(
                f,
                "Dimension mismatch for {}: expected {} components, found {}",
                key, expected, found
            ),
            Error::Config(ref info) => write!(f, "Invalid parameters: {}", info),
            Error::UnknownToken(ref token) => write!(f, "{} is not in the vector file", token),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::MissingFile(_, ref err) => Some(err),
            Error::Io(ref err) => Some(err),
            Error::CorruptCache { ref source, .. } => Some(source),
            _ => None,
        }
    }
}

//
// Convert everything else into Error
//
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::Config(format!("could not build thread pool: {}", err))
    }
}
