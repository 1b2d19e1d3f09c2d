//! Parameter-fingerprinted checkpoints.
//!
//! Every stage artifact gets a sidecar `<artifact>.meta.json` recording the stage and the
//! parameters that produced it. A later run only reuses the artifact when the sidecar matches
//! its own parameters, so a changed threshold never silently picks up a stale cache.

use crate::config::files_handling::{read_input, save_output};
use crate::errors::Result;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub stage: String,
    pub params: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Fresh,
    Stale,
    Missing,
}

#[derive(Clone, Debug)]
pub struct Checkpoint {
    path: PathBuf,
    fingerprint: Fingerprint,
}

impl Checkpoint {

    pub fn new<P: Into<PathBuf>>(path: P, stage: &str, params: Value) -> Checkpoint {
        Checkpoint {
            path: path.into(),
            fingerprint: Fingerprint { stage: stage.to_string(), params },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn meta_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".meta.json");
        self.path.with_file_name(name)
    }

    pub fn status(&self) -> Result<Status> {
        if !self.path.exists() {
            return Ok(Status::Missing);
        }
        let meta_path = self.meta_path();
        if !meta_path.exists() {
            return Ok(Status::Stale);
        }
        let recorded: Fingerprint = read_input(&meta_path)?;
        if recorded == self.fingerprint {
            Ok(Status::Fresh)
        } else {
            Ok(Status::Stale)
        }
    }

    /// True when the artifact can be loaded instead of recomputed.
    /// Anything else invalidates the sidecar so a half-finished rewrite is never trusted.
    pub fn reusable(&self, overwrite: bool) -> Result<bool> {
        let status = if overwrite { Status::Stale } else { self.status()? };
        match status {
            Status::Fresh => {
                info!("reusing {} checkpoint at {}", self.fingerprint.stage, self.path.display());
                Ok(true)
            }
            Status::Stale => {
                if overwrite {
                    info!("overwriting {} checkpoint at {}", self.fingerprint.stage, self.path.display());
                } else {
                    warn!("{} checkpoint at {} was built with other parameters, recomputing",
                        self.fingerprint.stage, self.path.display());
                }
                self.invalidate()?;
                Ok(false)
            }
            Status::Missing => {
                info!("no {} checkpoint at {}, computing", self.fingerprint.stage, self.path.display());
                self.invalidate()?;
                Ok(false)
            }
        }
    }

    pub fn invalidate(&self) -> Result<()> {
        match fs::remove_file(self.meta_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Records the fingerprint once the artifact itself is in place.
    pub fn commit(&self) -> Result<()> {
        save_output(&self.meta_path(), &self.fingerprint)
    }
}
