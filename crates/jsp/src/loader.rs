//! Access to web-application resources by resolved relative path.

use crate::error::{Result, TranslationError};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::PathBuf;

/// Opens resources named by `/`-rooted web-application paths.
///
/// Every `open` returns a fresh stream; a second pass over the same content
/// opens the resource again.
pub trait ResourceLoader {
    /// Physical identity of `path`, used for cycle detection.
    fn real_path(&self, path: &str) -> String;

    fn is_directory(&self, path: &str) -> bool;

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;
}

/// Read at most `limit` bytes from the start of `path`.
pub(crate) fn read_prefix(loader: &dyn ResourceLoader, path: &str, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    loader
        .open(path)
        .and_then(|stream| stream.take(limit as u64).read_to_end(&mut buf))
        .map_err(|source| not_found(path, source))?;
    Ok(buf)
}

pub(crate) fn read_all(loader: &dyn ResourceLoader, path: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    loader
        .open(path)
        .and_then(|mut stream| stream.read_to_end(&mut buf))
        .map_err(|source| not_found(path, source))?;
    Ok(buf)
}

fn not_found(path: &str, source: io::Error) -> TranslationError {
    TranslationError::ResourceNotFound {
        path: path.to_string(),
        source,
    }
}

/// Resources under a document root on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsResourceLoader {
    root: PathBuf,
}

impl FsResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl ResourceLoader for FsResourceLoader {
    fn real_path(&self, path: &str) -> String {
        self.locate(path).to_string_lossy().into_owned()
    }

    fn is_directory(&self, path: &str) -> bool {
        fs::metadata(self.locate(path)).is_ok_and(|meta| meta.is_dir())
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(self.locate(path))?))
    }
}

/// Resources held in memory, keyed by web-application path.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceLoader {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.files.insert(path.to_string(), content.into());
    }

    pub fn with(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn real_path(&self, path: &str) -> String {
        format!("memory:{path}")
    }

    fn is_directory(&self, path: &str) -> bool {
        if self.files.contains_key(path) {
            return false;
        }
        let dir = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        self.files.keys().any(|key| key.starts_with(&dir))
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        match self.files.get(path) {
            Some(content) => Ok(Box::new(Cursor::new(content.as_slice()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no resource at {path}"),
            )),
        }
    }
}
