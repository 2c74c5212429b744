//! Input file lists: directory walks and persisted list files.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors raised while building a file list.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The directory walk failed at its root.
    #[error("failed to walk {path}: {source}")]
    Walk {
        /// Directory being walked.
        path: PathBuf,
        /// Walk failure.
        #[source]
        source: walkdir::Error,
    },
    /// The list file could not be read.
    #[error("failed to read file list {path}: {source}")]
    Io {
        /// List file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Slice of a list file, used to split one list across batch jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListWindow {
    /// Zero-based index of the first entry to keep.
    pub start: usize,
    /// Maximum number of entries to keep; `None` keeps the rest.
    pub count: Option<usize>,
}

/// Regular files below `root`, sorted by path. Symbolic links are not followed.
///
/// Unreadable entries below the root are logged and skipped.
pub fn walk_directory(root: &Path) -> Result<Vec<PathBuf>, CrawlError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                return Err(CrawlError::Walk {
                    path: root.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Paths from a list file, one per line, with blank lines and `#` comments ignored.
pub fn read_file_list(path: &Path, window: ListWindow) -> Result<Vec<PathBuf>, CrawlError> {
    let text = std::fs::read_to_string(path).map_err(|source| CrawlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .skip(window.start)
        .take(window.count.unwrap_or(usize::MAX))
        .map(PathBuf::from)
        .collect();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn walk_returns_sorted_regular_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir(dir.path().join("b512")).expect("mkdir");
        std::fs::write(dir.path().join("b512/core.nc"), b"x").expect("write");
        std::fs::write(dir.path().join("a.na"), b"x").expect("write");
        std::fs::write(dir.path().join("z.pp"), b"x").expect("write");

        let files = walk_directory(dir.path()).expect("walk");
        let names: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(dir.path()).expect("prefix").to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a.na"), PathBuf::from("b512/core.nc"), PathBuf::from("z.pp")]
        );
    }

    #[test]
    fn walk_fails_for_missing_root() {
        assert!(matches!(
            walk_directory(Path::new("/no/such/archive")),
            Err(CrawlError::Walk { .. })
        ));
    }

    #[test]
    fn list_file_honours_comments_and_window() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "# batch 1\n/data/a.nc\n\n/data/b.nc\n  /data/c.nc  \n/data/d.nc"
        )
        .expect("write");

        let all = read_file_list(file.path(), ListWindow::default()).expect("list");
        assert_eq!(all.len(), 4);
        assert_eq!(all[2], PathBuf::from("/data/c.nc"));

        let window = ListWindow {
            start: 1,
            count: Some(2),
        };
        let slice = read_file_list(file.path(), window).expect("list");
        assert_eq!(slice, vec![PathBuf::from("/data/b.nc"), PathBuf::from("/data/c.nc")]);

        let past_end = ListWindow {
            start: 10,
            count: None,
        };
        assert!(read_file_list(file.path(), past_end).expect("list").is_empty());
    }
}
