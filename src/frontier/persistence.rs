//! On-disk form of the frontier
//!
//! Each set is a UTF-8 file with one URL per line. Files are replaced through a
//! sibling temp file and a rename so a crash mid-write leaves the previous
//! checkpoint intact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Locations of the two frontier files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierFiles {
    /// Pending (and claimed) URLs
    pub queue: PathBuf,

    /// Completed URLs
    pub crawled: PathBuf,
}

impl FrontierFiles {
    pub fn new(queue: impl Into<PathBuf>, crawled: impl Into<PathBuf>) -> Self {
        Self {
            queue: queue.into(),
            crawled: crawled.into(),
        }
    }

    /// Returns true if either file exists
    pub fn exist(&self) -> bool {
        self.queue.exists() || self.crawled.exists()
    }

    /// Deletes both files, ignoring ones that are already gone
    pub fn remove(&self) -> io::Result<()> {
        for path in [&self.queue, &self.crawled] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Reads a URL list; a missing file is an empty list
pub fn load_url_list(path: &Path) -> io::Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Replaces `path` with the given URLs, one per line
pub fn write_url_list<'a, I>(path: &Path, urls: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut file = io::BufWriter::new(fs::File::create(&tmp)?);
        for url in urls {
            file.write_all(url.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    }

    fs::rename(&tmp, path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
