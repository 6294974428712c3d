//! On-disk synthesis cache: avoids re-running an external synthesis
//! toolchain against text it has already compiled.
//!
//! Grounded on `quartus_server.cc`'s cache: an append-only `index.txt`
//! of `\0`-separated `(text, file)` pairs under the cache directory,
//! replayed into an in-memory map at startup, plus one bitstream file
//! per cache entry named by insertion order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no synthesis command configured")]
    NoCommand,
    #[error("synthesis command exited with status {0}")]
    NonZeroExit(i32),
    #[error("synthesis was cancelled")]
    Cancelled,
}

const INDEX_FILE: &str = "index.txt";

struct Index {
    entries: HashMap<String, PathBuf>,
}

/// A content-addressed cache of compiled bitstreams, keyed by the exact
/// text handed to the synthesis command.
pub struct SynthesisCache {
    cache_dir: PathBuf,
    command: Option<String>,
    index: Mutex<Index>,
    current: Mutex<Option<Child>>,
}

impl SynthesisCache {
    /// Creates the cache directory and `index.txt` if absent, then
    /// replays the index into memory.
    pub fn open(cache_dir: PathBuf, command: Option<String>) -> Result<Self, SynthesisError> {
        std::fs::create_dir_all(&cache_dir)?;
        let index_path = cache_dir.join(INDEX_FILE);
        if !index_path.exists() {
            std::fs::write(&index_path, b"")?;
        }

        let raw = std::fs::read(&index_path)?;
        let mut entries = HashMap::new();
        let mut fields = raw.split(|&b| b == 0).map(|s| String::from_utf8_lossy(s).into_owned());
        while let (Some(text), Some(file)) = (fields.next(), fields.next()) {
            if text.is_empty() && file.is_empty() {
                continue;
            }
            entries.insert(text, cache_dir.join(file));
        }

        Ok(SynthesisCache {
            cache_dir,
            command,
            index: Mutex::new(Index { entries }),
            current: Mutex::new(None),
        })
    }

    pub fn lookup(&self, text: &str) -> Option<PathBuf> {
        self.index.lock().entries.get(text).cloned()
    }

    /// Returns the bitstream path for `text`, synthesizing it via the
    /// configured command on a cache miss.
    pub async fn compile(&self, text: &str) -> Result<PathBuf, SynthesisError> {
        if let Some(path) = self.lookup(text) {
            return Ok(path);
        }

        let command = self.command.as_ref().ok_or(SynthesisError::NoCommand)?;
        let next_id = self.index.lock().entries.len();
        let file_name = format!("bitstream_{next_id}.rbf");
        let output_path = self.cache_dir.join(&file_name);
        let input_path = self.cache_dir.join(format!(".input_{next_id}.v"));
        tokio::fs::write(&input_path, text.as_bytes()).await?;

        let rendered = command
            .replace("{input}", input_path.to_string_lossy().as_ref())
            .replace("{output}", output_path.to_string_lossy().as_ref());

        let child = Command::new("sh")
            .arg("-c")
            .arg(&rendered)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        *self.current.lock() = Some(child);

        // `tokio::process::Child::wait` borrows `&mut self`; pull it out
        // from behind the lock rather than holding a non-`Send` guard
        // across the `.await` below.
        let mut child = self.current.lock().take().ok_or(SynthesisError::Cancelled)?;
        let status = child.wait().await?;
        let _ = tokio::fs::remove_file(&input_path).await;

        if !status.success() {
            return Err(SynthesisError::NonZeroExit(status.code().unwrap_or(-1)));
        }

        let mut index = self.index.lock();
        index.entries.insert(text.to_string(), output_path.clone());
        append_index_entry(&self.cache_dir.join(INDEX_FILE), text, &file_name)?;

        Ok(output_path)
    }

    /// Kills the in-flight synthesis process, if any. Unified across
    /// every backend rather than branching on toolchain-specific kill
    /// commands.
    pub fn cancel(&self) {
        if let Some(mut child) = self.current.lock().take() {
            let _ = child.start_kill();
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

fn append_index_entry(index_path: &Path, text: &str, file: &str) -> Result<(), SynthesisError> {
    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().append(true).open(index_path)?;
    f.write_all(text.as_bytes())?;
    f.write_all(&[0])?;
    f.write_all(file.as_bytes())?;
    f.write_all(&[0])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_empty_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SynthesisCache::open(dir.path().to_path_buf(), None).unwrap();
        assert!(cache.lookup("anything").is_none());
    }

    #[test]
    fn replays_index_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let cache = SynthesisCache::open(path.clone(), None).unwrap();
        drop(cache);

        append_index_entry(&path.join(INDEX_FILE), "module foo;", "bitstream_0.rbf").unwrap();
        let reopened = SynthesisCache::open(path, None).unwrap();
        assert_eq!(
            reopened.lookup("module foo;").unwrap().file_name().unwrap(),
            "bitstream_0.rbf"
        );
    }

    #[tokio::test]
    async fn compile_fails_without_command() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SynthesisCache::open(dir.path().to_path_buf(), None).unwrap();
        let err = cache.compile("module foo;").await.unwrap_err();
        assert!(matches!(err, SynthesisError::NoCommand));
    }

    #[tokio::test]
    async fn compile_runs_configured_command_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SynthesisCache::open(
            dir.path().to_path_buf(),
            Some("touch {output}".to_string()),
        )
        .unwrap();
        let path = cache.compile("module foo;").await.unwrap();
        assert!(path.exists());
        let cached = cache.compile("module foo;").await.unwrap();
        assert_eq!(path, cached);
    }
}
