//! Best-score persistence.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

/// Where the best score lives between sessions.
///
/// The session reads it once per connect attempt and writes it only when the
/// current score strictly exceeds the stored value.
pub trait ScoreStore: Send + Sync + 'static {
    fn max_score(&self) -> anyhow::Result<u32>;
    fn set_max_score(&self, score: u32) -> anyhow::Result<()>;
}

impl<T: ScoreStore> ScoreStore for Arc<T> {
    fn max_score(&self) -> anyhow::Result<u32> {
        (**self).max_score()
    }

    fn set_max_score(&self, score: u32) -> anyhow::Result<()> {
        (**self).set_max_score(score)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    max: u32,
    writes: Vec<u32>,
}

/// In-memory store that remembers every write. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max(max: u32) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.max = max;
        }
        store
    }

    /// Every value passed to `set_max_score`, oldest first.
    pub fn writes(&self) -> Vec<u32> {
        self.inner
            .lock()
            .map(|inner| inner.writes.clone())
            .unwrap_or_default()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn max_score(&self) -> anyhow::Result<u32> {
        let inner = self.inner.lock().map_err(|_| anyhow!("score store poisoned"))?;
        Ok(inner.max)
    }

    fn set_max_score(&self, score: u32) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().map_err(|_| anyhow!("score store poisoned"))?;
        inner.max = score;
        inner.writes.push(score);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScoreFile {
    max_score: u32,
}

/// `{"max_score": N}` in a small JSON file. A missing file reads as 0.
#[derive(Debug, Clone)]
pub struct JsonFileScoreStore {
    path: PathBuf,
}

impl JsonFileScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScoreStore for JsonFileScoreStore {
    fn max_score(&self) -> anyhow::Result<u32> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        let file: ScoreFile = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(file.max_score)
    }

    fn set_max_score(&self, score: u32) -> anyhow::Result<()> {
        let body = serde_json::to_vec(&ScoreFile { max_score: score })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
